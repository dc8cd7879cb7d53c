//! ECS Components module
//!
//! Spatial components shared with the rest of the engine and the physics
//! components written by the sync bridge.

pub mod transform;
pub mod physics;

pub use transform::{TransformComponent, Parent, WorldTransform, resolve_world_transform};
pub use physics::{PhysicsVelocity, PhysicsForce, PhysicsImpulse, CollisionEvents};
