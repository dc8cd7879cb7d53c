//! Math utilities and types
//!
//! Provides the fundamental math types shared by the physics data model,
//! the backends and the host world.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Isometry (rotation + translation) type
pub type Iso3 = nalgebra::Isometry3<f32>;

/// Mathematical constants
pub mod constants {
    /// Small value used for float comparisons
    pub const EPSILON: f32 = 1e-6;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;
}

/// Math utility functions
pub mod utils {
    use super::{Iso3, Quat, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * super::constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * super::constants::RAD_TO_DEG
    }

    /// Quaternion to Euler angles (roll, pitch, yaw), radians
    pub fn quat_to_euler(rotation: &Quat) -> Vec3 {
        let (roll, pitch, yaw) = rotation.euler_angles();
        Vec3::new(roll, pitch, yaw)
    }

    /// Euler angles (roll, pitch, yaw), radians, to quaternion
    pub fn euler_to_quat(euler: &Vec3) -> Quat {
        Quat::from_euler_angles(euler.x, euler.y, euler.z)
    }

    /// True when every component is finite
    pub fn is_finite_vec3(v: &Vec3) -> bool {
        v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
    }

    /// Build an isometry from a position and rotation
    pub fn isometry(position: &Vec3, rotation: &Quat) -> Iso3 {
        Iso3::from_parts(nalgebra::Translation3::from(*position), *rotation)
    }

    /// Any unit vector perpendicular to `v`
    pub fn any_orthogonal(v: &Vec3) -> Vec3 {
        let candidate = if v.x.abs() < 0.57 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        v.cross(&candidate).normalize()
    }
}
