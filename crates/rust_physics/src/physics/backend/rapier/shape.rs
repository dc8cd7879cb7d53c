//! rapier3d shapes for the shared shape builder

use std::sync::Arc;

use rapier3d::geometry::SharedShape;
use rapier3d::math::Point;

use crate::foundation::math::{utils, Iso3, Vec3};
use crate::physics::backend::shape_builder::{MeshData, ShapeFactory};

/// Builds [`SharedShape`]s
///
/// rapier forbids composite shapes inside a compound, so the shared builder
/// flattens nested compounds and splits meshes into triangles.
pub struct RapierShapeFactory;

fn to_points(points: &[Vec3]) -> Vec<Point<f32>> {
    points.iter().map(|p| Point::from(*p)).collect()
}

impl ShapeFactory for RapierShapeFactory {
    type Shape = SharedShape;

    fn engine_tag(&self) -> &'static str {
        "Rapier"
    }

    fn cuboid(&mut self, half_extents: Vec3) -> SharedShape {
        SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z)
    }

    fn ball(&mut self, radius: f32) -> SharedShape {
        SharedShape::ball(radius)
    }

    fn capsule(&mut self, radius: f32, half_height: f32) -> SharedShape {
        SharedShape::capsule_y(half_height, radius)
    }

    fn cylinder(&mut self, radius: f32, half_height: f32) -> SharedShape {
        SharedShape::cylinder(half_height, radius)
    }

    fn triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) -> SharedShape {
        SharedShape::triangle(a.into(), b.into(), c.into())
    }

    fn convex_hull(&mut self, points: &[Vec3]) -> Option<SharedShape> {
        if points.len() < 4 || !points.iter().all(utils::is_finite_vec3) {
            return None;
        }
        SharedShape::convex_hull(&to_points(points))
    }

    fn triangle_mesh(&mut self, mesh: &Arc<MeshData>) -> Option<SharedShape> {
        if mesh.triangles.is_empty() {
            return None;
        }
        let count = mesh.vertices.len() as u32;
        if mesh.triangles.iter().flatten().any(|&i| i >= count) {
            return None;
        }
        Some(SharedShape::trimesh(to_points(&mesh.vertices), mesh.triangles.clone()))
    }

    fn compound(&mut self, children: Vec<(Iso3, SharedShape)>) -> Option<SharedShape> {
        if children.is_empty() {
            return None;
        }
        Some(SharedShape::compound(children))
    }

    fn supports_nested_composites(&self) -> bool {
        false
    }
}
