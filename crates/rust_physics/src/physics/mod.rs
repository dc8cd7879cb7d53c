//! Physics module
//!
//! Backend-agnostic rigid body simulation. The data model in [`types`] is
//! shared by every engine adapter in [`backend`]; [`PhysicsSystem`] drives
//! the active adapter with a fixed timestep and can swap it at runtime.

pub mod types;
pub mod error;
pub mod collision_layers;
pub mod collision;
pub mod debug_render;
pub mod backend;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;

pub use types::{
    EntityId, INVALID_ENTITY, PhysicsTransform, PhysicsSyncResult,
    MotionType, RigidBody,
    ShapeConfig, CompoundChild, ColliderConfig,
    ConstraintType, ConstraintConfig, CharacterControllerConfig,
    ContactPoint, CollisionInfo, Ray, RaycastResult,
    PhysicsConfig,
};
pub use error::PhysicsError;
pub use collision_layers::CollisionLayers;
pub use debug_render::{PhysicsDebugRenderer, DebugDrawBuffer, DebugPrimitive};
pub use backend::{PhysicsBackend, BackendCapabilities, PhysicsEngineType, create_backend};
pub use system::PhysicsSystem;
