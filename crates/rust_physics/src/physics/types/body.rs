//! Rigid body configuration

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Vec3};
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::error::PhysicsError;
use super::transform::EntityId;

/// How the solver treats a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotionType {
    /// Never moves, infinite mass
    Static,
    /// Moved by the host, pushes dynamic bodies, never sleeps
    Kinematic,
    /// Fully simulated
    #[default]
    Dynamic,
}

/// Bulk dynamic properties of a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBody {
    /// Motion type
    pub motion_type: MotionType,
    /// Mass in kg, only meaningful for dynamic bodies
    pub mass: f32,
    /// Linear velocity damping
    pub linear_damping: f32,
    /// Angular velocity damping
    pub angular_damping: f32,
    /// Default surface friction
    pub friction: f32,
    /// Default surface restitution (bounciness)
    pub restitution: f32,
    /// Initial linear velocity
    pub linear_velocity: Vec3,
    /// Initial angular velocity
    pub angular_velocity: Vec3,
    /// Continuous collision detection
    pub enable_ccd: bool,
    /// Per-step motion above which CCD kicks in
    pub ccd_motion_threshold: f32,
    /// Layer bits this body occupies
    pub collision_layer: u32,
    /// Layer bits this body collides with
    pub collision_mask: u32,
    /// Whether the body may be put to sleep
    pub allow_sleep: bool,
    /// Whether world gravity applies
    pub use_gravity: bool,
    /// Multiplier on world gravity
    pub gravity_scale: f32,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            motion_type: MotionType::Dynamic,
            mass: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.05,
            friction: 0.5,
            restitution: 0.0,
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            enable_ccd: false,
            ccd_motion_threshold: 0.01,
            collision_layer: CollisionLayers::DEFAULT,
            collision_mask: CollisionLayers::ALL,
            allow_sleep: true,
            use_gravity: true,
            gravity_scale: 1.0,
        }
    }
}

impl RigidBody {
    /// Dynamic body with the given mass
    pub fn dynamic(mass: f32) -> Self {
        Self {
            mass,
            ..Default::default()
        }
    }

    /// Static body
    pub fn fixed() -> Self {
        Self {
            motion_type: MotionType::Static,
            ..Default::default()
        }
    }

    /// Kinematic body
    pub fn kinematic() -> Self {
        Self {
            motion_type: MotionType::Kinematic,
            ..Default::default()
        }
    }

    /// Builder pattern: Set friction and restitution
    pub fn with_material(mut self, friction: f32, restitution: f32) -> Self {
        self.friction = friction;
        self.restitution = restitution;
        self
    }

    /// Builder pattern: Set damping
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Builder pattern: Set initial velocities
    pub fn with_velocity(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    /// Builder pattern: Set collision layer and mask
    pub fn with_layers(mut self, layer: u32, mask: u32) -> Self {
        self.collision_layer = layer;
        self.collision_mask = mask;
        self
    }

    /// Builder pattern: Enable continuous collision detection
    pub fn with_ccd(mut self, enabled: bool) -> Self {
        self.enable_ccd = enabled;
        self
    }

    /// Builder pattern: Set gravity usage and scale
    pub fn with_gravity(mut self, use_gravity: bool, gravity_scale: f32) -> Self {
        self.use_gravity = use_gravity;
        self.gravity_scale = gravity_scale;
        self
    }

    /// Mass the solver should use: 0 (infinite) unless dynamic
    pub fn effective_mass(&self) -> f32 {
        match self.motion_type {
            MotionType::Dynamic => self.mass,
            MotionType::Static | MotionType::Kinematic => 0.0,
        }
    }

    /// Inverse of [`Self::effective_mass`], 0 for immovable bodies
    pub fn inverse_mass(&self) -> f32 {
        let mass = self.effective_mass();
        if mass > 0.0 {
            1.0 / mass
        } else {
            0.0
        }
    }

    /// Multiplier applied to world gravity
    pub fn gravity_factor(&self) -> f32 {
        if self.use_gravity {
            self.gravity_scale
        } else {
            0.0
        }
    }

    /// Whether the body is simulated by the solver
    pub fn is_dynamic(&self) -> bool {
        self.motion_type == MotionType::Dynamic
    }

    /// Check that the configuration can be turned into a native body
    pub fn validate(&self, entity: EntityId) -> Result<(), PhysicsError> {
        let invalid = |reason: &str| PhysicsError::InvalidBody {
            entity,
            reason: reason.to_string(),
        };

        if self.is_dynamic() && !(self.mass > 0.0 && self.mass.is_finite()) {
            return Err(invalid("dynamic body requires a finite mass > 0"));
        }

        let scalars = [
            self.linear_damping,
            self.angular_damping,
            self.friction,
            self.restitution,
            self.gravity_scale,
            self.ccd_motion_threshold,
        ];
        if scalars.iter().any(|v| !v.is_finite()) {
            return Err(invalid("non-finite material, damping or gravity value"));
        }
        if self.linear_damping < 0.0 || self.angular_damping < 0.0 {
            return Err(invalid("damping must not be negative"));
        }
        if !utils::is_finite_vec3(&self.linear_velocity) || !utils::is_finite_vec3(&self.angular_velocity) {
            return Err(invalid("non-finite initial velocity"));
        }

        Ok(())
    }
}
