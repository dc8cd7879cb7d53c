//! Collision shape descriptions
//!
//! [`ShapeConfig`] is an owned tree: a compound holds its children by value,
//! so a shape description can never reference itself.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Quat, Vec3};
use crate::physics::error::PhysicsError;
use super::body::RigidBody;

/// Default half extent of the fallback box
pub const DEFAULT_HALF_EXTENT: f32 = 0.5;

/// Default sphere radius
pub const DEFAULT_SPHERE_RADIUS: f32 = 0.5;

/// Geometry of a collider in the body's local space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeConfig {
    /// Oriented box
    Box {
        /// Half size along each local axis
        half_extents: Vec3,
    },
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Capsule along local Y
    Capsule {
        /// Radius of the hemispheres and the cylinder
        radius: f32,
        /// Length of the axis segment between the hemisphere centres
        height: f32,
    },
    /// Cylinder along local Y
    Cylinder {
        /// Radius
        radius: f32,
        /// Full height
        height: f32,
    },
    /// Convex hull of a point cloud
    ConvexHull {
        /// Hull points
        vertices: Vec<Vec3>,
    },
    /// Static triangle mesh
    Mesh {
        /// Vertex positions
        vertices: Vec<Vec3>,
        /// Triangle list, three indices per triangle
        indices: Vec<u32>,
    },
    /// Several shapes rigidly attached to one body
    Compound {
        /// Child shapes with their local poses
        children: Vec<CompoundChild>,
    },
}

/// A child of a compound shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundChild {
    /// Child geometry
    pub shape: ShapeConfig,
    /// Position relative to the compound origin
    pub position: Vec3,
    /// Rotation relative to the compound origin
    pub rotation: Quat,
}

impl CompoundChild {
    /// Create a child at a local pose
    pub fn new(shape: ShapeConfig, position: Vec3, rotation: Quat) -> Self {
        Self { shape, position, rotation }
    }
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self::fallback()
    }
}

impl ShapeConfig {
    /// The unit box used whenever a description cannot be built
    pub fn fallback() -> Self {
        Self::Box {
            half_extents: Vec3::repeat(DEFAULT_HALF_EXTENT),
        }
    }

    /// Box from half extents
    pub fn cuboid(hx: f32, hy: f32, hz: f32) -> Self {
        Self::Box {
            half_extents: Vec3::new(hx, hy, hz),
        }
    }

    /// Sphere from radius
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Capsule from radius and segment length
    pub fn capsule(radius: f32, height: f32) -> Self {
        Self::Capsule { radius, height }
    }

    /// Cylinder from radius and height
    pub fn cylinder(radius: f32, height: f32) -> Self {
        Self::Cylinder { radius, height }
    }

    /// Short name used in log messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Box { .. } => "Box",
            Self::Sphere { .. } => "Sphere",
            Self::Capsule { .. } => "Capsule",
            Self::Cylinder { .. } => "Cylinder",
            Self::ConvexHull { .. } => "ConvexHull",
            Self::Mesh { .. } => "Mesh",
            Self::Compound { .. } => "Compound",
        }
    }

    /// Check the description can be built without falling back
    pub fn validate(&self) -> Result<(), PhysicsError> {
        let positive = |name: &str, v: f32| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(PhysicsError::InvalidShape(format!(
                    "{} {name} must be finite and > 0, got {v}",
                    self.type_name()
                )))
            }
        };

        match self {
            Self::Box { half_extents } => {
                positive("half extent x", half_extents.x)?;
                positive("half extent y", half_extents.y)?;
                positive("half extent z", half_extents.z)
            }
            Self::Sphere { radius } => positive("radius", *radius),
            Self::Capsule { radius, height } => {
                positive("radius", *radius)?;
                if *height >= 0.0 && height.is_finite() {
                    Ok(())
                } else {
                    Err(PhysicsError::InvalidShape(format!("Capsule height must be finite and >= 0, got {height}")))
                }
            }
            Self::Cylinder { radius, height } => {
                positive("radius", *radius)?;
                positive("height", *height)
            }
            Self::ConvexHull { vertices } => {
                if vertices.is_empty() {
                    return Err(PhysicsError::InvalidShape("ConvexHull has no vertices".into()));
                }
                if !vertices.iter().all(utils::is_finite_vec3) {
                    return Err(PhysicsError::InvalidShape("ConvexHull has non-finite vertices".into()));
                }
                Ok(())
            }
            Self::Mesh { vertices, indices } => {
                if vertices.is_empty() || indices.is_empty() {
                    return Err(PhysicsError::InvalidShape("Mesh requires vertices and indices".into()));
                }
                if indices.len() % 3 != 0 {
                    return Err(PhysicsError::InvalidShape(format!(
                        "Mesh index count {} is not a multiple of 3",
                        indices.len()
                    )));
                }
                if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                    return Err(PhysicsError::InvalidShape(format!(
                        "Mesh index {bad} out of range for {} vertices",
                        vertices.len()
                    )));
                }
                Ok(())
            }
            Self::Compound { children } => {
                if children.is_empty() {
                    return Err(PhysicsError::InvalidShape("Compound has no children".into()));
                }
                children.iter().try_for_each(|child| child.shape.validate())
            }
        }
    }

    /// Radius of a sphere around the local origin enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Box { half_extents } => half_extents.magnitude(),
            Self::Sphere { radius } => *radius,
            Self::Capsule { radius, height } => height * 0.5 + radius,
            Self::Cylinder { radius, height } => radius.hypot(height * 0.5),
            Self::ConvexHull { vertices } | Self::Mesh { vertices, .. } => vertices
                .iter()
                .map(|v| v.magnitude())
                .fold(0.0, f32::max),
            Self::Compound { children } => children
                .iter()
                .map(|c| c.position.magnitude() + c.shape.bounding_radius())
                .fold(0.0, f32::max),
        }
    }
}

/// Surface aspect of a body: geometry, local pose and material overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderConfig {
    /// Geometry
    pub shape: ShapeConfig,
    /// Offset from the body origin
    pub offset: Vec3,
    /// Rotation relative to the body
    pub rotation: Quat,
    /// Report overlaps without a physical response
    pub is_trigger: bool,
    /// Friction override, the body's value when `None`
    pub friction: Option<f32>,
    /// Restitution override, the body's value when `None`
    pub restitution: Option<f32>,
}

impl Default for ColliderConfig {
    fn default() -> Self {
        Self {
            shape: ShapeConfig::default(),
            offset: Vec3::zeros(),
            rotation: Quat::identity(),
            is_trigger: false,
            friction: None,
            restitution: None,
        }
    }
}

impl ColliderConfig {
    /// Collider with the given shape centred on the body
    pub fn new(shape: ShapeConfig) -> Self {
        Self {
            shape,
            ..Default::default()
        }
    }

    /// Builder pattern: Set local pose
    pub fn with_offset(mut self, offset: Vec3, rotation: Quat) -> Self {
        self.offset = offset;
        self.rotation = rotation;
        self
    }

    /// Builder pattern: Make this collider a trigger volume
    pub fn as_trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Builder pattern: Override surface material
    pub fn with_material(mut self, friction: f32, restitution: f32) -> Self {
        self.friction = Some(friction);
        self.restitution = Some(restitution);
        self
    }

    /// Friction after applying the override
    pub fn effective_friction(&self, body: &RigidBody) -> f32 {
        self.friction.unwrap_or(body.friction)
    }

    /// Restitution after applying the override
    pub fn effective_restitution(&self, body: &RigidBody) -> f32 {
        self.restitution.unwrap_or(body.restitution)
    }

    /// Check the geometry and local pose
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !utils::is_finite_vec3(&self.offset) {
            return Err(PhysicsError::InvalidShape("collider offset is not finite".into()));
        }
        self.shape.validate()
    }
}
