//! Collision mesh representations
//!
//! Provides mesh-based collision shapes with model-space templates
//! and world-space transformations for testing.

use crate::foundation::math::{Iso3, Point3, Vec3};
use crate::physics::types::Ray;
use super::primitives::{BoundingSphere, Triangle};

/// A collision mesh template stored in MODEL SPACE (local coordinates)
#[derive(Debug, Clone)]
pub struct CollisionMeshTemplate {
    /// Triangles in MODEL SPACE (local coordinates, never modified)
    pub local_triangles: Vec<Triangle>,
    /// Local bounding sphere radius (model space)
    pub local_bounding_radius: f32,
}

impl CollisionMeshTemplate {
    /// Creates a new collision mesh template from MODEL SPACE vertices and triangles
    ///
    /// Triangles referencing a vertex that does not exist are skipped.
    pub fn from_triangles(vertices: &[Vec3], triangles: &[[u32; 3]]) -> Self {
        let local_triangles: Vec<Triangle> = triangles
            .iter()
            .filter_map(|&[a, b, c]| {
                Some(Triangle::new(
                    *vertices.get(a as usize)?,
                    *vertices.get(b as usize)?,
                    *vertices.get(c as usize)?,
                ))
            })
            .collect();

        // Local bounding sphere radius from the furthest vertex
        let max_distance_sq = local_triangles
            .iter()
            .flat_map(Triangle::vertices)
            .map(|v| v.magnitude_squared())
            .fold(0.0f32, f32::max);

        Self {
            local_triangles,
            local_bounding_radius: max_distance_sq.sqrt(),
        }
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.local_triangles.len()
    }

    /// Transform this template to world space
    pub fn to_world_space(&self, pose: &Iso3) -> WorldSpaceCollisionMesh {
        let transform = |v: Vec3| pose.transform_point(&Point3::from(v)).coords;
        let triangles = self
            .local_triangles
            .iter()
            .map(|tri| Triangle::new(transform(tri.v0), transform(tri.v1), transform(tri.v2)))
            .collect();

        WorldSpaceCollisionMesh {
            triangles,
            center: pose.translation.vector,
            bounding_radius: self.local_bounding_radius,
        }
    }
}

/// World-space collision mesh (temporary, created on-demand for collision tests)
#[derive(Debug, Clone)]
pub struct WorldSpaceCollisionMesh {
    /// Triangles in world space
    pub triangles: Vec<Triangle>,
    /// Center position in world space
    pub center: Vec3,
    /// Bounding sphere radius in world space
    pub bounding_radius: f32,
}

impl WorldSpaceCollisionMesh {
    /// Bounding sphere of the whole mesh
    pub fn bounds(&self) -> BoundingSphere {
        BoundingSphere::new(self.center, self.bounding_radius)
    }

    /// Test ray intersection against all triangles in the mesh
    /// Returns closest hit (t, hit_point, normal) if any triangle is hit
    ///
    /// The normal faces against the ray so back faces report a usable normal.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, Vec3, Vec3)> {
        self.bounds().intersect_ray(ray)?;

        let mut closest_hit: Option<(f32, Vec3, Vec3)> = None;
        let mut closest_t = f32::MAX;

        for triangle in &self.triangles {
            if let Some((t, _u, _v)) = triangle.intersect_ray(ray) {
                if t < closest_t {
                    closest_t = t;
                    let mut normal = triangle.normal();
                    if normal.dot(&ray.direction) > 0.0 {
                        normal = -normal;
                    }
                    closest_hit = Some((t, ray.point_at(t), normal));
                }
            }
        }

        closest_hit
    }

    /// Triangles that may touch the given sphere
    pub fn candidates<'a>(&'a self, sphere: &'a BoundingSphere) -> impl Iterator<Item = &'a Triangle> + 'a {
        let hit = self.bounds().intersects(sphere);
        self.triangles.iter().filter(move |tri| {
            hit && {
                let closest = tri.closest_point(sphere.center);
                (closest - sphere.center).magnitude_squared() <= sphere.radius * sphere.radius
            }
        })
    }
}
