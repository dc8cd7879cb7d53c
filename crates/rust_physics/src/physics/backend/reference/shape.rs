//! Native shapes of the reference solver
//!
//! Every shape is reduced to world-space leaves the narrow phase understands:
//! spheres, oriented boxes and triangle meshes. Capsules become a chain of
//! spheres, cylinders and convex hulls use their local bounding box.

use std::sync::Arc;

use crate::foundation::math::{utils, Iso3, Quat, Vec3};
use crate::physics::backend::shape_builder::{MeshData, ShapeFactory};
use crate::physics::collision::{contact, BoundingSphere, CollisionMeshTemplate, Contact, OrientedBox, WorldSpaceCollisionMesh};
use crate::physics::debug_render::PhysicsDebugRenderer;
use crate::physics::types::{PhysicsTransform, Ray};

/// Most spheres used to approximate one capsule
const MAX_CAPSULE_SPHERES: usize = 16;

/// Shape in the body's local space
#[derive(Debug, Clone)]
pub enum ReferenceShape {
    /// Sphere
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Box
    Box {
        /// Half extents
        half_extents: Vec3,
    },
    /// Capsule along local Y
    Capsule {
        /// Radius
        radius: f32,
        /// Half length of the axis segment
        half_height: f32,
    },
    /// Cylinder along local Y
    Cylinder {
        /// Radius
        radius: f32,
        /// Half height
        half_height: f32,
    },
    /// Convex hull reduced to its bounding box
    Hull {
        /// Box centre
        center: Vec3,
        /// Box half extents
        half_extents: Vec3,
    },
    /// Triangle mesh
    Mesh(Arc<CollisionMeshTemplate>),
    /// Posed children
    Compound(Vec<(Iso3, ReferenceShape)>),
}

/// A world-space piece of a body's shape
#[derive(Debug, Clone)]
pub enum Leaf {
    /// Sphere
    Sphere(BoundingSphere),
    /// Oriented box
    Box(OrientedBox),
    /// Triangle mesh
    Mesh(WorldSpaceCollisionMesh),
}

impl ReferenceShape {
    /// Append the world-space leaves of this shape placed at `pose`
    pub fn leaves(&self, pose: &Iso3, out: &mut Vec<Leaf>) {
        let center = pose.translation.vector;
        let rotation = pose.rotation;
        match self {
            Self::Sphere { radius } => out.push(Leaf::Sphere(BoundingSphere::new(center, *radius))),
            Self::Box { half_extents } => out.push(Leaf::Box(OrientedBox::new(center, rotation, *half_extents))),
            Self::Capsule { radius, half_height } => {
                let axis = rotation * Vec3::y();
                for offset in capsule_offsets(*radius, *half_height) {
                    out.push(Leaf::Sphere(BoundingSphere::new(center + axis * offset, *radius)));
                }
            }
            Self::Cylinder { radius, half_height } => out.push(Leaf::Box(OrientedBox::new(
                center,
                rotation,
                Vec3::new(*radius, *half_height, *radius),
            ))),
            Self::Hull { center: local_center, half_extents } => out.push(Leaf::Box(OrientedBox::new(
                pose.transform_point(&(*local_center).into()).coords,
                rotation,
                *half_extents,
            ))),
            Self::Mesh(template) => out.push(Leaf::Mesh(template.to_world_space(pose))),
            Self::Compound(children) => {
                for (child_pose, child) in children {
                    child.leaves(&(pose * child_pose), out);
                }
            }
        }
    }

    /// Radius of a sphere around the local origin enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Sphere { radius } => *radius,
            Self::Box { half_extents } => half_extents.magnitude(),
            Self::Capsule { radius, half_height } => half_height + radius,
            Self::Cylinder { radius, half_height } => radius.hypot(*half_height),
            Self::Hull { center, half_extents } => center.magnitude() + half_extents.magnitude(),
            Self::Mesh(template) => template.local_bounding_radius,
            Self::Compound(children) => children
                .iter()
                .map(|(pose, child)| pose.translation.vector.magnitude() + child.bounding_radius())
                .fold(0.0, f32::max),
        }
    }

    /// Principal moments of inertia for a body of the given mass
    pub fn principal_inertia(&self, mass: f32) -> Vec3 {
        let box_inertia = |h: Vec3| {
            Vec3::new(
                mass / 3.0 * (h.y * h.y + h.z * h.z),
                mass / 3.0 * (h.x * h.x + h.z * h.z),
                mass / 3.0 * (h.x * h.x + h.y * h.y),
            )
        };
        match self {
            Self::Sphere { radius } => Vec3::repeat(0.4 * mass * radius * radius),
            Self::Box { half_extents } | Self::Hull { half_extents, .. } => box_inertia(*half_extents),
            Self::Cylinder { radius, half_height } => {
                let h = 2.0 * half_height;
                let side = mass * (3.0 * radius * radius + h * h) / 12.0;
                Vec3::new(side, 0.5 * mass * radius * radius, side)
            }
            Self::Capsule { radius, half_height } => {
                let h = 2.0 * half_height + 2.0 * radius;
                let side = mass * (3.0 * radius * radius + h * h) / 12.0;
                Vec3::new(side, 0.5 * mass * radius * radius, side)
            }
            Self::Mesh(_) | Self::Compound(_) => {
                let r = self.bounding_radius().max(1e-3);
                Vec3::repeat(0.4 * mass * r * r)
            }
        }
    }
}

/// Offsets of the approximating spheres along a capsule axis
fn capsule_offsets(radius: f32, half_height: f32) -> Vec<f32> {
    if half_height <= 1e-6 {
        return vec![0.0];
    }
    let spacing = (radius * 0.5).max(1e-3);
    let count = (((2.0 * half_height) / spacing).ceil() as usize + 1).clamp(2, MAX_CAPSULE_SPHERES);
    (0..count)
        .map(|i| -half_height + 2.0 * half_height * i as f32 / (count - 1) as f32)
        .collect()
}

impl Leaf {
    /// Bounding sphere of the leaf
    pub fn bounds(&self) -> BoundingSphere {
        match self {
            Self::Sphere(s) => *s,
            Self::Box(b) => BoundingSphere::new(b.center, b.bounding_radius()),
            Self::Mesh(m) => m.bounds(),
        }
    }

    /// Contacts with the normal pointing from `self` towards `other`
    pub fn contacts(&self, other: &Self) -> Vec<Contact> {
        if !self.bounds().intersects(&other.bounds()) {
            return Vec::new();
        }
        match (self, other) {
            (Self::Sphere(a), Self::Sphere(b)) => contact::sphere_sphere(a, b).into_iter().collect(),
            (Self::Sphere(s), Self::Box(b)) => contact::sphere_box(s, b).into_iter().collect(),
            (Self::Box(b), Self::Sphere(s)) => contact::sphere_box(s, b).map(Contact::flipped).into_iter().collect(),
            (Self::Box(a), Self::Box(b)) => contact::box_box(a, b),
            (Self::Sphere(s), Self::Mesh(m)) => m
                .candidates(s)
                .filter_map(|tri| contact::sphere_triangle(s, tri))
                .collect(),
            (Self::Mesh(_), Self::Sphere(_)) | (Self::Mesh(_), Self::Box(_)) => {
                other.contacts(self).into_iter().map(Contact::flipped).collect()
            }
            (Self::Box(b), Self::Mesh(m)) => {
                let bounds = BoundingSphere::new(b.center, b.bounding_radius());
                m.candidates(&bounds)
                    .flat_map(|tri| contact::box_triangle(b, tri))
                    .collect()
            }
            // Mesh pairs are not resolved by this solver
            (Self::Mesh(_), Self::Mesh(_)) => Vec::new(),
        }
    }

    /// Ray hit as (distance, point, normal)
    pub fn raycast(&self, ray: &Ray) -> Option<(f32, Vec3, Vec3)> {
        match self {
            Self::Sphere(s) => s.intersect_ray(ray),
            Self::Box(b) => b.intersect_ray(ray),
            Self::Mesh(m) => m.intersect_ray(ray),
        }
    }

    /// Draw the leaf outline
    pub fn debug_draw(&self, renderer: &mut dyn PhysicsDebugRenderer, color: Vec3) {
        match self {
            Self::Sphere(s) => renderer.draw_wire_sphere(s.center, s.radius, color),
            Self::Box(b) => renderer.draw_wire_box(&PhysicsTransform::new(b.center, b.rotation), b.half_extents, color),
            Self::Mesh(m) => {
                for tri in &m.triangles {
                    renderer.draw_line(tri.v0, tri.v1, color);
                    renderer.draw_line(tri.v1, tri.v2, color);
                    renderer.draw_line(tri.v2, tri.v0, color);
                }
            }
        }
    }
}

/// Builds [`ReferenceShape`]s for the shared shape builder
pub struct ReferenceShapeFactory;

impl ShapeFactory for ReferenceShapeFactory {
    type Shape = ReferenceShape;

    fn engine_tag(&self) -> &'static str {
        "Reference"
    }

    fn cuboid(&mut self, half_extents: Vec3) -> ReferenceShape {
        ReferenceShape::Box { half_extents }
    }

    fn ball(&mut self, radius: f32) -> ReferenceShape {
        ReferenceShape::Sphere { radius }
    }

    fn capsule(&mut self, radius: f32, half_height: f32) -> ReferenceShape {
        ReferenceShape::Capsule { radius, half_height }
    }

    fn cylinder(&mut self, radius: f32, half_height: f32) -> ReferenceShape {
        ReferenceShape::Cylinder { radius, half_height }
    }

    fn triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) -> ReferenceShape {
        ReferenceShape::Mesh(Arc::new(CollisionMeshTemplate::from_triangles(&[a, b, c], &[[0, 1, 2]])))
    }

    fn convex_hull(&mut self, points: &[Vec3]) -> Option<ReferenceShape> {
        if points.len() < 4 || !points.iter().all(utils::is_finite_vec3) {
            return None;
        }
        let (min, max) = points.iter().fold(
            (Vec3::repeat(f32::MAX), Vec3::repeat(f32::MIN)),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        let half_extents = (max - min) * 0.5;
        if half_extents.min() <= 1e-6 {
            return None;
        }
        Some(ReferenceShape::Hull {
            center: (min + max) * 0.5,
            half_extents,
        })
    }

    fn triangle_mesh(&mut self, mesh: &Arc<MeshData>) -> Option<ReferenceShape> {
        let template = CollisionMeshTemplate::from_triangles(&mesh.vertices, &mesh.triangles);
        (template.triangle_count() > 0).then(|| ReferenceShape::Mesh(Arc::new(template)))
    }

    fn compound(&mut self, children: Vec<(Iso3, ReferenceShape)>) -> Option<ReferenceShape> {
        (!children.is_empty()).then_some(ReferenceShape::Compound(children))
    }
}

/// Leaves of a body whose collider sits at `offset`/`rotation` from the body pose
pub fn world_leaves(shape: &ReferenceShape, body_pose: &Iso3, offset: &Vec3, rotation: &Quat) -> Vec<Leaf> {
    let mut leaves = Vec::new();
    shape.leaves(&(body_pose * utils::isometry(offset, rotation)), &mut leaves);
    leaves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::backend::shape_builder::build_shape;
    use crate::physics::types::{CompoundChild, ShapeConfig};
    use approx::assert_relative_eq;

    #[test]
    fn test_capsule_becomes_sphere_chain() {
        let mut leaves = Vec::new();
        ReferenceShape::Capsule { radius: 0.5, half_height: 1.0 }.leaves(&Iso3::identity(), &mut leaves);
        assert!(leaves.len() >= 2);
        let ys: Vec<f32> = leaves
            .iter()
            .map(|l| match l {
                Leaf::Sphere(s) => s.center.y,
                _ => f32::NAN,
            })
            .collect();
        assert_relative_eq!(ys[0], -1.0);
        assert_relative_eq!(ys[ys.len() - 1], 1.0);
    }

    #[test]
    fn test_compound_leaves_are_posed() {
        let config = ShapeConfig::Compound {
            children: vec![
                CompoundChild::new(ShapeConfig::sphere(0.5), Vec3::new(1.0, 0.0, 0.0), Quat::identity()),
                CompoundChild::new(ShapeConfig::cuboid(0.5, 0.5, 0.5), Vec3::new(-1.0, 0.0, 0.0), Quat::identity()),
            ],
        };
        let bundle = build_shape(&mut ReferenceShapeFactory, &config);
        let pose = Iso3::from_parts(Vec3::new(0.0, 5.0, 0.0).into(), Quat::identity());
        let mut leaves = Vec::new();
        bundle.shape.leaves(&pose, &mut leaves);
        assert_eq!(leaves.len(), 2);
        assert_relative_eq!(leaves[0].bounds().center, Vec3::new(1.0, 5.0, 0.0));
        assert_relative_eq!(leaves[1].bounds().center, Vec3::new(-1.0, 5.0, 0.0));
    }

    #[test]
    fn test_flat_hull_is_degenerate() {
        let flat = [Vec3::zeros(), Vec3::x(), Vec3::z(), Vec3::new(1.0, 0.0, 1.0)];
        assert!(ReferenceShapeFactory.convex_hull(&flat).is_none());
        let cube: Vec<Vec3> = (0..8)
            .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
            .collect();
        let hull = ReferenceShapeFactory.convex_hull(&cube).unwrap();
        assert!(matches!(hull, ReferenceShape::Hull { .. }));
    }

    #[test]
    fn test_box_inertia() {
        let inertia = ReferenceShape::Box { half_extents: Vec3::new(0.5, 0.5, 0.5) }.principal_inertia(6.0);
        // m/12 * (1 + 1) for a unit cube
        assert_relative_eq!(inertia, Vec3::repeat(1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_leaf_raycast_mesh() {
        let mesh = ReferenceShapeFactory.triangle(
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
        );
        let mut leaves = Vec::new();
        mesh.leaves(&Iso3::identity(), &mut leaves);
        let ray = Ray::new(Vec3::new(0.0, 3.0, 0.0), -Vec3::y(), 10.0);
        let (t, _, normal) = leaves[0].raycast(&ray).unwrap();
        assert_relative_eq!(t, 3.0, epsilon = 1e-5);
        assert_relative_eq!(normal, Vec3::y(), epsilon = 1e-5);
    }
}
