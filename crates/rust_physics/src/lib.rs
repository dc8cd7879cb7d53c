//! # Rust Physics
//!
//! Pluggable rigid body physics for the engine.
//!
//! ## Features
//!
//! - **Backend Abstraction**: rapier3d or the built-in reference solver behind one trait
//! - **Fixed Timestep**: accumulator driven stepping with a substep clamp
//! - **Hot Swapping**: switch engines at runtime with rollback on failure
//! - **ECS Bridge**: host world components kept in sync every frame
//! - **Debug Drawing**: wire geometry through a small renderer trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_physics::prelude::*;
//!
//! fn main() -> Result<(), PhysicsError> {
//!     let mut physics = PhysicsSystem::new(PhysicsEngineType::default(), PhysicsConfig::default())?;
//!     physics.create_static_box(1, Vec3::zeros(), Vec3::new(5.0, 0.5, 5.0));
//!     physics.create_dynamic_box(2, Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.5, 0.5, 0.5), 1.0);
//!
//!     for _ in 0..120 {
//!         physics.update(1.0 / 60.0);
//!     }
//!     println!("box at {:?}", physics.body_transform(2).position);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod physics;
pub mod ecs;

/// Common imports for physics users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        foundation::math::{Vec3, Quat, Mat4},
        physics::{
            PhysicsSystem, PhysicsBackend, PhysicsEngineType, BackendCapabilities, PhysicsError,
            PhysicsConfig, PhysicsTransform, RigidBody, MotionType, ShapeConfig, ColliderConfig,
            ConstraintConfig, ConstraintType, CharacterControllerConfig, CollisionInfo,
            Ray, RaycastResult, EntityId, INVALID_ENTITY, CollisionLayers,
            PhysicsDebugRenderer, DebugDrawBuffer,
        },
        ecs::{
            World, Entity, Component, WorldEvent,
            components::{
                TransformComponent, Parent, WorldTransform, PhysicsVelocity, PhysicsForce,
                PhysicsImpulse, CollisionEvents,
            },
            resources::PhysicsWorldConfig,
            systems::PhysicsSyncBridge,
        },
    };
}
