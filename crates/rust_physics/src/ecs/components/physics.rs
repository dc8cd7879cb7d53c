//! Physics components
//!
//! Written by the sync bridge (`PhysicsVelocity`, `CollisionEvents`) or
//! consumed by it (`PhysicsForce`, `PhysicsImpulse`). Body and collider
//! configuration are the physics types themselves.

use crate::ecs::Component;
use crate::foundation::math::Vec3;
use crate::physics::types::{CollisionInfo, EntityId};

/// Simulated velocities of a dynamic body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsVelocity {
    /// Linear velocity (m/s)
    pub linear: Vec3,
    /// Angular velocity (rad/s)
    pub angular: Vec3,
}

impl Component for PhysicsVelocity {}

impl Default for PhysicsVelocity {
    fn default() -> Self {
        Self {
            linear: Vec3::zeros(),
            angular: Vec3::zeros(),
        }
    }
}

/// Continuous force applied on the next simulation phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsForce {
    /// Force through the centre of mass (N)
    pub force: Vec3,
    /// Torque (N·m)
    pub torque: Vec3,
    /// Remove the component once applied
    pub clear_after_apply: bool,
}

impl Component for PhysicsForce {}

impl PhysicsForce {
    /// Force applied every frame until removed
    pub fn constant(force: Vec3) -> Self {
        Self {
            force,
            torque: Vec3::zeros(),
            clear_after_apply: false,
        }
    }

    /// Force applied for a single frame
    pub fn once(force: Vec3) -> Self {
        Self {
            clear_after_apply: true,
            ..Self::constant(force)
        }
    }

    /// Builder pattern: Set torque
    pub fn with_torque(mut self, torque: Vec3) -> Self {
        self.torque = torque;
        self
    }
}

/// One-shot impulse, always removed after it is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsImpulse {
    /// Impulse (N·s)
    pub impulse: Vec3,
    /// World space application point, zero for the centre of mass
    pub point: Vec3,
}

impl Component for PhysicsImpulse {}

impl PhysicsImpulse {
    /// Impulse through the centre of mass
    pub fn new(impulse: Vec3) -> Self {
        Self {
            impulse,
            point: Vec3::zeros(),
        }
    }

    /// Impulse at a world point
    pub fn at_point(impulse: Vec3, point: Vec3) -> Self {
        Self { impulse, point }
    }
}

/// Subscription to collision events
///
/// Entities carrying this component receive every contact they took part in
/// during the last simulation phase. The list is replaced each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionEvents {
    /// Contacts of the last frame
    pub events: Vec<CollisionInfo>,
}

impl Component for CollisionEvents {}

impl CollisionEvents {
    /// Whether anything was hit last frame
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entities touched last frame, from this entity's point of view
    pub fn others(&self, this: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.events.iter().filter(move |e| e.involves(this)).map(move |e| e.other(this))
    }
}
