//! Physics value types
//!
//! Pure data shared by the façade, the backends and the host world. None of
//! these types own native engine resources.

pub mod transform;
pub mod body;
pub mod shape;
pub mod constraint;
pub mod collision;
pub mod config;

pub use transform::{EntityId, INVALID_ENTITY, PhysicsTransform, PhysicsSyncResult};
pub use body::{MotionType, RigidBody};
pub use shape::{ShapeConfig, CompoundChild, ColliderConfig};
pub use constraint::{ConstraintType, ConstraintConfig, CharacterControllerConfig};
pub use collision::{ContactPoint, CollisionInfo, Ray, RaycastResult};
pub use config::PhysicsConfig;
