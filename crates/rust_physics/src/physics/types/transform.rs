//! Entity handles and rigid transforms

use serde::{Deserialize, Serialize};

use crate::foundation::math::{constants::EPSILON, utils, Iso3, Mat3, Mat4, Quat, Vec3};

/// Opaque entity handle owned by the host world
pub type EntityId = u64;

/// The "no entity" handle
pub const INVALID_ENTITY: EntityId = 0;

/// Position, rotation and scale of a physics body
///
/// Scale is carried for the host's benefit only. Backends simulate rigid
/// shapes and never read it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsTransform {
    /// World space position
    pub position: Vec3,

    /// World space rotation (always normalized)
    pub rotation: Quat,

    /// Informational scale
    pub scale: Vec3,
}

impl Default for PhysicsTransform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl PhysicsTransform {
    /// Create a transform with unit scale
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder pattern: Set scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Rigid part of the transform as an isometry
    pub fn to_isometry(&self) -> Iso3 {
        utils::isometry(&self.position, &self.rotation)
    }

    /// Convert to a transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose a TRS matrix
    ///
    /// A degenerate scale axis (shorter than epsilon) is treated as unit
    /// length for the rotation extraction so the result never contains NaN.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let scale = Vec3::new(
            Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude(),
            Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude(),
            Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude(),
        );
        let safe = scale.map(|s| if s > EPSILON { s } else { 1.0 });

        let rotation_matrix = Mat3::new(
            matrix.m11 / safe.x, matrix.m12 / safe.y, matrix.m13 / safe.z,
            matrix.m21 / safe.x, matrix.m22 / safe.y, matrix.m23 / safe.z,
            matrix.m31 / safe.x, matrix.m32 / safe.y, matrix.m33 / safe.z,
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Parent-relative composition: `self` is the parent, `child` is local
    pub fn combine(&self, child: &Self) -> Self {
        Self {
            position: self.position + self.rotation * self.scale.component_mul(&child.position),
            rotation: self.rotation * child.rotation,
            scale: self.scale.component_mul(&child.scale),
        }
    }
}

/// State read back from a backend after stepping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsSyncResult {
    /// World space position
    pub position: Vec3,
    /// World space rotation
    pub rotation: Quat,
    /// Linear velocity (m/s)
    pub linear_velocity: Vec3,
    /// Angular velocity (rad/s)
    pub angular_velocity: Vec3,
}

impl Default for PhysicsSyncResult {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
        }
    }
}
