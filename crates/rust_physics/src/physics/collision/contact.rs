//! Contact generation between primitives
//!
//! Every routine reports contacts with the normal pointing from the first
//! argument towards the second and a positive depth when the shapes overlap.

use crate::foundation::math::Vec3;
use super::primitives::{BoundingSphere, OrientedBox, Triangle};

/// Tolerance used when classifying vertices as touching
const CONTACT_SLACK: f32 = 0.01;

/// Upper bound on points kept per primitive pair
const MAX_CONTACTS: usize = 8;

/// A single contact between two primitives
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World space contact point
    pub point: Vec3,
    /// Unit normal from the first shape towards the second
    pub normal: Vec3,
    /// Overlap depth, positive when penetrating
    pub depth: f32,
}

impl Contact {
    /// Same contact seen from the other shape
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// Sphere against sphere
pub fn sphere_sphere(a: &BoundingSphere, b: &BoundingSphere) -> Option<Contact> {
    let delta = b.center - a.center;
    let distance_sq = delta.magnitude_squared();
    let radius_sum = a.radius + b.radius;
    if distance_sq > radius_sum * radius_sum {
        return None;
    }

    let distance = distance_sq.sqrt();
    let normal = if distance > 1e-6 { delta / distance } else { Vec3::y() };
    Some(Contact {
        point: a.center + normal * (a.radius - (radius_sum - distance) * 0.5),
        normal,
        depth: radius_sum - distance,
    })
}

/// Sphere against oriented box
pub fn sphere_box(sphere: &BoundingSphere, obb: &OrientedBox) -> Option<Contact> {
    let closest = obb.closest_point(sphere.center);
    let delta = closest - sphere.center;
    let distance_sq = delta.magnitude_squared();
    if distance_sq > sphere.radius * sphere.radius {
        return None;
    }

    let distance = distance_sq.sqrt();
    if distance > 1e-6 {
        return Some(Contact {
            point: closest,
            normal: delta / distance,
            depth: sphere.radius - distance,
        });
    }

    // Centre inside the box: leave through the nearest face
    let local = obb.to_local(sphere.center);
    let axes = obb.axes();
    let (axis, penetration) = (0..3)
        .map(|i| (i, obb.half_extents[i] - local[i].abs()))
        .fold((0, f32::MAX), |best, cur| if cur.1 < best.1 { cur } else { best });
    let outward = axes[axis] * local[axis].signum();
    Some(Contact {
        point: sphere.center,
        normal: -outward,
        depth: sphere.radius + penetration,
    })
}

/// Sphere against triangle
pub fn sphere_triangle(sphere: &BoundingSphere, triangle: &Triangle) -> Option<Contact> {
    let closest = triangle.closest_point(sphere.center);
    let delta = closest - sphere.center;
    let distance_sq = delta.magnitude_squared();
    if distance_sq > sphere.radius * sphere.radius {
        return None;
    }

    let distance = distance_sq.sqrt();
    let normal = if distance > 1e-6 {
        delta / distance
    } else {
        -triangle.normal()
    };
    Some(Contact {
        point: closest,
        normal,
        depth: sphere.radius - distance,
    })
}

/// Box against box, separating axis test over the 15 candidate axes
pub fn box_box(a: &OrientedBox, b: &OrientedBox) -> Vec<Contact> {
    polytope_contacts(&Polytope::Box(a), &Polytope::Box(b))
}

/// Box against triangle, separating axis test over the 13 candidate axes
pub fn box_triangle(obb: &OrientedBox, triangle: &Triangle) -> Vec<Contact> {
    polytope_contacts(&Polytope::Box(obb), &Polytope::Triangle(triangle))
}

/// Convex primitives the separating axis test understands
enum Polytope<'a> {
    Box(&'a OrientedBox),
    Triangle(&'a Triangle),
}

impl Polytope<'_> {
    fn vertices(&self) -> Vec<Vec3> {
        match self {
            Self::Box(b) => b.corners().to_vec(),
            Self::Triangle(t) => t.vertices().to_vec(),
        }
    }

    fn face_normals(&self) -> Vec<Vec3> {
        match self {
            Self::Box(b) => b.axes().to_vec(),
            Self::Triangle(t) => vec![t.normal()],
        }
    }

    fn edge_directions(&self) -> Vec<Vec3> {
        match self {
            Self::Box(b) => b.axes().to_vec(),
            Self::Triangle(t) => t.edges().to_vec(),
        }
    }

    fn center(&self) -> Vec3 {
        match self {
            Self::Box(b) => b.center,
            Self::Triangle(t) => t.centroid(),
        }
    }

    fn touches(&self, point: Vec3, depth: f32) -> bool {
        match self {
            Self::Box(b) => b.contains_point(point, CONTACT_SLACK),
            Self::Triangle(t) => t.projects_inside(point) && t.distance_to_point(point).abs() <= depth + CONTACT_SLACK,
        }
    }
}

fn project(vertices: &[Vec3], axis: &Vec3) -> (f32, f32) {
    vertices.iter().fold((f32::MAX, f32::MIN), |(lo, hi), v| {
        let p = v.dot(axis);
        (lo.min(p), hi.max(p))
    })
}

fn polytope_contacts(a: &Polytope, b: &Polytope) -> Vec<Contact> {
    let verts_a = a.vertices();
    let verts_b = b.vertices();
    let center_delta = b.center() - a.center();

    let mut axes: Vec<(Vec3, f32)> = a
        .face_normals()
        .into_iter()
        .chain(b.face_normals())
        .map(|n| (n, 1.0))
        .collect();
    for ea in a.edge_directions() {
        for eb in b.edge_directions() {
            // Edge axes only win when clearly better than a face axis
            axes.push((ea.cross(&eb), 1.05));
        }
    }

    let mut best: Option<(Vec3, f32, f32)> = None;
    for (axis, bias) in axes {
        let Some(axis) = axis.try_normalize(1e-6) else {
            continue;
        };
        let normal = if center_delta.dot(&axis) < 0.0 { -axis } else { axis };
        let (min_a, max_a) = project(&verts_a, &normal);
        let (min_b, max_b) = project(&verts_b, &normal);
        if max_a < min_b || max_b < min_a {
            return Vec::new();
        }
        let depth = max_a - min_b;
        if best.map_or(true, |(_, d, bias_best)| depth * bias < d * bias_best) {
            best = Some((normal, depth, bias));
        }
    }

    let Some((normal, depth, _)) = best else {
        return Vec::new();
    };

    let (_, max_a) = project(&verts_a, &normal);
    let (min_b, _) = project(&verts_b, &normal);

    let mut contacts: Vec<Contact> = Vec::new();
    for v in &verts_b {
        let d = max_a - v.dot(&normal);
        if d >= -CONTACT_SLACK && a.touches(*v, d.max(0.0)) {
            contacts.push(Contact { point: *v, normal, depth: d.max(0.0) });
        }
    }
    for u in &verts_a {
        let d = u.dot(&normal) - min_b;
        if d >= -CONTACT_SLACK && b.touches(*u, d.max(0.0)) {
            contacts.push(Contact { point: *u, normal, depth: d.max(0.0) });
        }
    }

    if contacts.is_empty() {
        // Edge against edge: one point between the two support features
        let support = |verts: &[Vec3], target: f32| {
            let near: Vec<&Vec3> = verts
                .iter()
                .filter(|v| (v.dot(&normal) - target).abs() <= CONTACT_SLACK)
                .collect();
            if near.is_empty() {
                None
            } else {
                Some(near.iter().fold(Vec3::zeros(), |acc, v| acc + **v) / near.len() as f32)
            }
        };
        if let (Some(sa), Some(sb)) = (support(&verts_a, max_a), support(&verts_b, min_b)) {
            contacts.push(Contact { point: (sa + sb) * 0.5, normal, depth });
        }
    }

    contacts.sort_by(|x, y| y.depth.total_cmp(&x.depth));
    contacts.truncate(MAX_CONTACTS);
    contacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_sphere_contact() {
        let a = BoundingSphere::new(Vec3::zeros(), 1.0);
        let b = BoundingSphere::new(Vec3::new(1.5, 0.0, 0.0), 1.0);
        let c = sphere_sphere(&a, &b).unwrap();
        assert_relative_eq!(c.normal, Vec3::x());
        assert_relative_eq!(c.depth, 0.5);

        let far = BoundingSphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0);
        assert!(sphere_sphere(&a, &far).is_none());
    }

    #[test]
    fn test_sphere_resting_on_box() {
        let ground = OrientedBox::new(Vec3::zeros(), Quat::identity(), Vec3::new(5.0, 0.5, 5.0));
        let ball = BoundingSphere::new(Vec3::new(0.0, 0.9, 0.0), 0.5);
        let c = sphere_box(&ball, &ground).unwrap();
        assert_relative_eq!(c.normal, -Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(c.depth, 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_center_inside_box() {
        let obb = OrientedBox::new(Vec3::zeros(), Quat::identity(), Vec3::new(1.0, 1.0, 1.0));
        let ball = BoundingSphere::new(Vec3::new(0.0, 0.8, 0.0), 0.5);
        let c = sphere_box(&ball, &obb).unwrap();
        // Pushed out through the top face
        assert_relative_eq!(c.normal, -Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(c.depth, 0.7, epsilon = 1e-5);
    }

    #[test]
    fn test_box_resting_on_box_has_four_contacts() {
        let ground = OrientedBox::new(Vec3::zeros(), Quat::identity(), Vec3::new(5.0, 0.5, 5.0));
        let crate_box = OrientedBox::new(Vec3::new(0.0, 0.99, 0.0), Quat::identity(), Vec3::new(0.5, 0.5, 0.5));
        let contacts = box_box(&ground, &crate_box);
        assert_eq!(contacts.len(), 4);
        for c in &contacts {
            assert_relative_eq!(c.normal, Vec3::y(), epsilon = 1e-5);
            assert_relative_eq!(c.depth, 0.01, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_separated_boxes() {
        let a = OrientedBox::new(Vec3::zeros(), Quat::identity(), Vec3::new(0.5, 0.5, 0.5));
        let b = OrientedBox::new(Vec3::new(1.2, 0.0, 0.0), Quat::identity(), Vec3::new(0.5, 0.5, 0.5));
        assert!(box_box(&a, &b).is_empty());
    }

    #[test]
    fn test_box_on_triangle() {
        let tri = Triangle::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 5.0), Vec3::new(5.0, 0.0, -5.0));
        let obb = OrientedBox::new(Vec3::new(0.0, 0.45, 0.0), Quat::identity(), Vec3::new(0.5, 0.5, 0.5));
        let contacts = box_triangle(&obb, &tri);
        assert!(!contacts.is_empty());
        // Normal points from the box towards the triangle (downwards)
        assert!(contacts[0].normal.y < -0.9);
        assert_relative_eq!(contacts[0].depth, 0.05, epsilon = 1e-4);
    }
}
