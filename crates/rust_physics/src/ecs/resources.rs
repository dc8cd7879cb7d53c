//! World resources

use crate::foundation::math::Vec3;
use crate::physics::types::PhysicsConfig;

/// Runtime-editable physics settings stored in the world
///
/// The sync bridge reads it every frame, so edits take effect on the next
/// simulation phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsWorldConfig {
    /// World gravity
    pub gravity: Vec3,
    /// Fixed simulation step (seconds)
    pub fixed_timestep: f32,
    /// Maximum fixed steps per frame
    pub max_substeps: u32,
    /// Whether resting bodies may sleep
    pub enable_sleeping: bool,
    /// Draw backend debug geometry
    pub show_debug_physics: bool,
}

impl Default for PhysicsWorldConfig {
    fn default() -> Self {
        Self::from(&PhysicsConfig::default())
    }
}

impl From<&PhysicsConfig> for PhysicsWorldConfig {
    fn from(config: &PhysicsConfig) -> Self {
        Self {
            gravity: config.gravity,
            fixed_timestep: config.fixed_timestep,
            max_substeps: config.max_substeps,
            enable_sleeping: config.enable_sleeping,
            show_debug_physics: config.show_debug_physics,
        }
    }
}

impl PhysicsWorldConfig {
    /// Copy these settings over a full config
    pub fn apply_to(&self, config: &mut PhysicsConfig) {
        config.gravity = self.gravity;
        config.fixed_timestep = self.fixed_timestep;
        config.max_substeps = self.max_substeps;
        config.enable_sleeping = self.enable_sleeping;
        config.show_debug_physics = self.show_debug_physics;
    }

    /// Whether applying these settings needs a backend restart
    ///
    /// Gravity and the debug toggle are live; stepping and sleep settings are
    /// fixed when a backend is initialized.
    pub fn requires_restart(&self, config: &PhysicsConfig) -> bool {
        (self.fixed_timestep - config.fixed_timestep).abs() > f32::EPSILON
            || self.max_substeps != config.max_substeps
            || self.enable_sleeping != config.enable_sleeping
    }
}
