//! Physics backend system
//!
//! Provides a pluggable backend abstraction over rigid-body engines. Each
//! backend owns its native world and every native resource derived from the
//! generic data model, and translates between the two.

pub mod shape_builder;
pub mod reference;
#[cfg(feature = "rapier")]
pub mod rapier;

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use super::debug_render::PhysicsDebugRenderer;
use super::error::PhysicsError;
use super::types::{
    CharacterControllerConfig, ColliderConfig, CollisionInfo, ConstraintConfig, EntityId,
    PhysicsConfig, PhysicsSyncResult, PhysicsTransform, Ray, RaycastResult, RigidBody,
};

bitflags::bitflags! {
    /// Features a backend actually simulates
    ///
    /// Every backend accepts every call; a missing flag means the call is a
    /// documented no-op or an approximation on that backend.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BackendCapabilities: u32 {
        /// Rigid body dynamics
        const RIGID_BODIES = 1 << 0;
        /// Per-step contact reporting
        const COLLISION_EVENTS = 1 << 1;
        /// Ray queries
        const RAYCASTS = 1 << 2;
        /// Every constraint type is simulated
        const CONSTRAINTS = 1 << 3;
        /// Continuous collision detection
        const CONTINUOUS_COLLISION = 1 << 4;
        /// Kinematic character controllers
        const CHARACTERS = 1 << 5;
        /// Debug geometry output
        const DEBUG_DRAW = 1 << 6;
        /// Exact narrow phase for every shape pair
        const EXACT_SHAPES = 1 << 7;
    }
}

/// Engines the factory can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicsEngineType {
    /// rapier3d
    Rapier,
    /// Built-in sequential impulse solver
    Reference,
}

impl Default for PhysicsEngineType {
    fn default() -> Self {
        if cfg!(feature = "rapier") {
            Self::Rapier
        } else {
            Self::Reference
        }
    }
}

impl PhysicsEngineType {
    /// Name reported by the backend's `engine_name`
    pub fn name(self) -> &'static str {
        match self {
            Self::Rapier => "Rapier",
            Self::Reference => "Reference",
        }
    }

    /// Engines compiled into this build
    pub fn available() -> Vec<Self> {
        let mut engines = Vec::new();
        if cfg!(feature = "rapier") {
            engines.push(Self::Rapier);
        }
        engines.push(Self::Reference);
        engines
    }
}

impl std::fmt::Display for PhysicsEngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PhysicsEngineType {
    type Err = PhysicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rapier" => Ok(Self::Rapier),
            "reference" => Ok(Self::Reference),
            other => Err(PhysicsError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// Strategy interface every physics engine adapter implements
///
/// Calls on an uninitialized backend, or naming an entity without a body,
/// are silent no-ops returning safe defaults.
pub trait PhysicsBackend: Send {
    /// Create the native world. Calling it again while initialized only warns
    fn initialize(&mut self, config: &PhysicsConfig) -> Result<(), PhysicsError>;

    /// Remove every body and release the native world. Safe to repeat
    fn shutdown(&mut self);

    /// Whether the native world exists
    fn is_initialized(&self) -> bool;

    /// Set world gravity
    fn set_gravity(&mut self, gravity: Vec3);

    /// Current world gravity
    fn gravity(&self) -> Vec3;

    /// Advance the world by exactly `delta_time` seconds
    fn step_simulation(&mut self, delta_time: f32);

    /// Create the entity's body, or update it in place when it exists
    fn sync_body_to_backend(
        &mut self,
        entity: EntityId,
        transform: &PhysicsTransform,
        body: &RigidBody,
        collider: &ColliderConfig,
    ) -> Result<(), PhysicsError>;

    /// Simulated pose and velocities, zero/identity for unknown entities
    fn sync_body_from_backend(&self, entity: EntityId) -> PhysicsSyncResult;

    /// Detach and release the entity's body
    fn remove_body(&mut self, entity: EntityId);

    /// Whether the entity has a body
    fn has_body(&self, entity: EntityId) -> bool;

    /// Number of bodies in the world
    fn body_count(&self) -> usize;

    /// Overwrite velocities, returns false for unknown entities
    fn set_velocity(&mut self, entity: EntityId, linear: Vec3, angular: Vec3) -> bool;

    /// Continuous force and torque over the next step
    fn apply_force(&mut self, entity: EntityId, force: Vec3, torque: Vec3);

    /// Instantaneous impulse at a world point, or the centre of mass when `point` is zero
    fn apply_impulse(&mut self, entity: EntityId, impulse: Vec3, point: Vec3);

    /// Whether the body is asleep
    fn is_sleeping(&self, _entity: EntityId) -> bool {
        false
    }

    /// Contacts found during the most recent step
    fn collision_events(&self) -> &[CollisionInfo];

    /// Closest hit along the ray
    fn raycast(&self, ray: &Ray) -> Option<RaycastResult>;

    /// Every hit along the ray sorted by distance
    fn raycast_all(&self, ray: &Ray) -> Vec<RaycastResult>;

    /// Link two bodies, `b` may be `INVALID_ENTITY` to pin `a` to the world
    fn add_constraint(&mut self, a: EntityId, b: EntityId, config: &ConstraintConfig) -> bool;

    /// Remove the constraint between two bodies
    fn remove_constraint(&mut self, a: EntityId, b: EntityId) -> bool;

    /// Create a kinematic character
    fn add_character(&mut self, _entity: EntityId, _position: Vec3, _config: &CharacterControllerConfig) -> bool {
        false
    }

    /// Move a character, returns its new position
    fn move_character(&mut self, _entity: EntityId, _displacement: Vec3, _delta_time: f32) -> Vec3 {
        Vec3::zeros()
    }

    /// Character position
    fn character_position(&self, _entity: EntityId) -> Vec3 {
        Vec3::zeros()
    }

    /// Whether the character stood on walkable ground after its last move
    fn is_character_grounded(&self, _entity: EntityId) -> bool {
        false
    }

    /// Remove a character
    fn remove_character(&mut self, _entity: EntityId) {}

    /// Whether the entity has a character
    fn has_character(&self, _entity: EntityId) -> bool {
        false
    }

    /// Emit debug geometry
    fn debug_draw(&mut self, _renderer: &mut dyn PhysicsDebugRenderer) {}

    /// Engine name
    fn engine_name(&self) -> &'static str;

    /// Features this backend simulates
    fn capabilities(&self) -> BackendCapabilities;
}

/// Create an uninitialized backend for the requested engine
pub fn create_backend(engine: PhysicsEngineType) -> Result<Box<dyn PhysicsBackend>, PhysicsError> {
    match engine {
        #[cfg(feature = "rapier")]
        PhysicsEngineType::Rapier => Ok(Box::new(rapier::RapierBackend::new())),
        #[cfg(not(feature = "rapier"))]
        PhysicsEngineType::Rapier => Err(PhysicsError::UnsupportedEngine(
            "Rapier (crate built without the `rapier` feature)".into(),
        )),
        PhysicsEngineType::Reference => Ok(Box::new(reference::ReferenceBackend::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_engine_names() {
        for engine in PhysicsEngineType::available() {
            let backend = create_backend(engine).unwrap();
            assert_eq!(backend.engine_name(), engine.name());
            assert!(!backend.is_initialized());
        }
    }

    #[test]
    fn test_engine_type_parsing() {
        assert_eq!("rapier".parse::<PhysicsEngineType>().unwrap(), PhysicsEngineType::Rapier);
        assert_eq!("Reference".parse::<PhysicsEngineType>().unwrap(), PhysicsEngineType::Reference);
        assert!("havok".parse::<PhysicsEngineType>().is_err());
    }

    #[test]
    fn test_default_engine_is_available() {
        assert!(PhysicsEngineType::available().contains(&PhysicsEngineType::default()));
    }
}
