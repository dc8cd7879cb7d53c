//! World-level simulation settings

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::math::Vec3;

/// Settings supplied when a backend is initialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// World gravity (m/s²)
    pub gravity: Vec3,
    /// Seconds simulated per step
    pub fixed_timestep: f32,
    /// Most steps taken in one `update` call
    pub max_substeps: u32,
    /// Collision iterations per step
    pub collision_steps: u32,
    /// Velocity solver iterations per step
    pub solver_iterations: u32,
    /// Allow resting bodies to sleep
    pub enable_sleeping: bool,
    /// Speed below which a body counts as resting
    pub sleep_threshold: f32,
    /// Draw physics shapes through the debug renderer
    pub show_debug_physics: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            collision_steps: 1,
            solver_iterations: 8,
            enable_sleeping: true,
            sleep_threshold: 0.05,
            show_debug_physics: false,
        }
    }
}

impl Config for PhysicsConfig {}

impl PhysicsConfig {
    /// Builder pattern: Set gravity
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Builder pattern: Set fixed timestep and substep limit
    pub fn with_timestep(mut self, fixed_timestep: f32, max_substeps: u32) -> Self {
        self.fixed_timestep = fixed_timestep;
        self.max_substeps = max_substeps;
        self
    }

    /// Builder pattern: Enable or disable sleeping
    pub fn with_sleeping(mut self, enabled: bool) -> Self {
        self.enable_sleeping = enabled;
        self
    }

    /// Builder pattern: Toggle debug drawing
    pub fn with_debug_physics(mut self, enabled: bool) -> Self {
        self.show_debug_physics = enabled;
        self
    }

    /// Longest span of time one `update` call can consume
    pub fn max_frame_time(&self) -> f32 {
        self.fixed_timestep * self.max_substeps as f32
    }

    /// Reject settings the fixed-step loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep > 0.0 && self.fixed_timestep.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "fixed_timestep must be finite and > 0, got {}",
                self.fixed_timestep
            )));
        }
        if self.max_substeps == 0 {
            return Err(ConfigError::Invalid("max_substeps must be at least 1".into()));
        }
        if !self.gravity.iter().all(|g| g.is_finite()) {
            return Err(ConfigError::Invalid("gravity must be finite".into()));
        }
        Ok(())
    }
}
