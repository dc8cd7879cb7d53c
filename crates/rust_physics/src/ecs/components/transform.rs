//! Transform components for the ECS system
//!
//! `TransformComponent` is the local pose authored by game code. Physics
//! never writes it; simulated poses land in `WorldTransform`.

use crate::ecs::{Component, Entity, World};
use crate::foundation::math::{utils, Mat4, Quat, Vec3};
use crate::physics::types::PhysicsTransform;

/// Parent chains deeper than this are treated as cyclic
const MAX_HIERARCHY_DEPTH: usize = 64;

/// ECS Transform component
///
/// Local translation, rotation and scale relative to the [`Parent`], or to
/// the world for root entities. Y-up right-handed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    /// Position relative to the parent
    pub position: Vec3,

    /// Rotation relative to the parent
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Component for TransformComponent {}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create from position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Builder pattern: Set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder pattern: Set rotation from quaternion
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Set rotation from Euler angles (radians)
    pub fn with_rotation_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = Quat::from_euler_angles(x, y, z);
        self
    }

    /// Builder pattern: Set scale (non-uniform)
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Convert to transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        self.to_physics().to_matrix()
    }

    /// Same pose in the physics data model
    pub fn to_physics(&self) -> PhysicsTransform {
        PhysicsTransform::new(self.position, self.rotation).with_scale(self.scale)
    }
}

/// Hierarchy link to a parent entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

impl Component for Parent {}

/// Resolved world space pose
///
/// Rotation is kept as Euler angles (radians, roll/pitch/yaw) to match the
/// rest of the engine's editable transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    /// World position
    pub position: Vec3,
    /// World rotation as Euler angles
    pub rotation: Vec3,
    /// Accumulated scale
    pub scale: Vec3,
    /// Full TRS matrix
    pub matrix: Mat4,
}

impl Component for WorldTransform {}

impl Default for WorldTransform {
    fn default() -> Self {
        Self::from_physics(&PhysicsTransform::default())
    }
}

impl WorldTransform {
    /// Build from a physics pose
    pub fn from_physics(transform: &PhysicsTransform) -> Self {
        Self {
            position: transform.position,
            rotation: utils::quat_to_euler(&transform.rotation),
            scale: transform.scale,
            matrix: transform.to_matrix(),
        }
    }

    /// Overwrite position and rotation, keeping the scale
    pub fn set_pose(&mut self, position: Vec3, rotation: &Quat) {
        *self = Self::from_physics(&PhysicsTransform::new(position, *rotation).with_scale(self.scale));
    }

    /// Rotation as a quaternion
    pub fn rotation_quat(&self) -> Quat {
        utils::euler_to_quat(&self.rotation)
    }

    /// Convert to the physics data model
    pub fn to_physics(&self) -> PhysicsTransform {
        PhysicsTransform::new(self.position, self.rotation_quat()).with_scale(self.scale)
    }
}

/// Compose the entity's local transform with every ancestor's
///
/// Missing transforms count as identity. A chain that loops back on itself
/// is cut after `MAX_HIERARCHY_DEPTH` links.
pub fn resolve_world_transform(world: &World, entity: Entity) -> PhysicsTransform {
    let mut result = world
        .get::<TransformComponent>(entity)
        .map_or_else(PhysicsTransform::default, TransformComponent::to_physics);

    let mut current = entity;
    for _ in 0..MAX_HIERARCHY_DEPTH {
        let Some(&Parent(parent)) = world.get::<Parent>(current) else {
            return result;
        };
        if !world.is_alive(parent) {
            return result;
        }
        if let Some(local) = world.get::<TransformComponent>(parent) {
            result = local.to_physics().combine(&result);
        }
        current = parent;
    }

    log::warn!("[PhysicsSync] Parent chain of entity {} is cyclic or too deep", entity.id());
    result
}
