//! ECS systems

pub mod physics_sync;

pub use physics_sync::{PhysicsSyncBridge, PhysicsSyncStats};
