//! Primitive collision shapes and intersection algorithms
//!
//! Provides basic geometric primitives (spheres, oriented boxes, triangles)
//! with ray intersection and closest point queries.

use crate::foundation::math::{Quat, Vec3};
use crate::physics::types::Ray;

/// A bounding sphere for collision detection
#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    /// The center position of the sphere in world space
    pub center: Vec3,
    /// The radius of the sphere
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Check if this sphere intersects with another
    pub fn intersects(&self, other: &Self) -> bool {
        let distance_squared = (self.center - other.center).magnitude_squared();
        let radius_sum = self.radius + other.radius;
        distance_squared <= radius_sum * radius_sum
    }

    /// Get the penetration depth if intersecting (0.0 if not intersecting)
    pub fn penetration_depth(&self, other: &Self) -> f32 {
        let distance = (self.center - other.center).magnitude();
        let radius_sum = self.radius + other.radius;
        if distance < radius_sum {
            radius_sum - distance
        } else {
            0.0
        }
    }

    /// Test ray intersection with this sphere
    /// Returns (distance, hit_point, normal) if hit, None otherwise
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, Vec3, Vec3)> {
        let oc = ray.origin - self.center;

        // Solve: |origin + t*direction - center|^2 = radius^2 (direction is unit length)
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;

        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_discriminant = discriminant.sqrt();
        let t1 = -b - sqrt_discriminant;
        let t2 = -b + sqrt_discriminant;

        // Closest non-negative intersection; an origin inside the sphere hits at t = 0
        let t = if t1 >= 0.0 {
            t1
        } else if t2 >= 0.0 {
            0.0
        } else {
            return None;
        };

        let hit_point = ray.point_at(t);
        let normal = if t > 0.0 {
            (hit_point - self.center).normalize()
        } else {
            -ray.direction
        };

        Some((t, hit_point, normal))
    }
}

/// An oriented box
#[derive(Debug, Clone, Copy)]
pub struct OrientedBox {
    /// Center in world space
    pub center: Vec3,
    /// Orientation
    pub rotation: Quat,
    /// Half size along each local axis
    pub half_extents: Vec3,
}

impl OrientedBox {
    /// Creates a new oriented box
    pub fn new(center: Vec3, rotation: Quat, half_extents: Vec3) -> Self {
        Self { center, rotation, half_extents }
    }

    /// The three local axes in world space
    pub fn axes(&self) -> [Vec3; 3] {
        [
            self.rotation * Vec3::x(),
            self.rotation * Vec3::y(),
            self.rotation * Vec3::z(),
        ]
    }

    /// The eight corners in world space
    pub fn corners(&self) -> [Vec3; 8] {
        let [ax, ay, az] = self.axes();
        let (x, y, z) = (ax * self.half_extents.x, ay * self.half_extents.y, az * self.half_extents.z);
        let c = self.center;
        [
            c - x - y - z,
            c + x - y - z,
            c + x + y - z,
            c - x + y - z,
            c - x - y + z,
            c + x - y + z,
            c + x + y + z,
            c - x + y + z,
        ]
    }

    /// Radius of the enclosing sphere
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents.magnitude()
    }

    /// Point expressed in the box's local frame
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.center)
    }

    /// Whether the point lies inside the box grown by `slack`
    pub fn contains_point(&self, point: Vec3, slack: f32) -> bool {
        let local = self.to_local(point);
        local.x.abs() <= self.half_extents.x + slack
            && local.y.abs() <= self.half_extents.y + slack
            && local.z.abs() <= self.half_extents.z + slack
    }

    /// Get the closest point on (or in) the box to a given point
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let local = self.to_local(point);
        let clamped = Vec3::new(
            local.x.clamp(-self.half_extents.x, self.half_extents.x),
            local.y.clamp(-self.half_extents.y, self.half_extents.y),
            local.z.clamp(-self.half_extents.z, self.half_extents.z),
        );
        self.center + self.rotation * clamped
    }

    /// Slab test against the box
    /// Returns (distance, hit_point, normal) if hit, None otherwise
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, Vec3, Vec3)> {
        let inv = self.rotation.inverse();
        let origin = inv * (ray.origin - self.center);
        let direction = inv * ray.direction;

        let mut t_min = 0.0f32;
        let mut t_max = f32::MAX;
        let mut hit_axis = None;

        for axis in 0..3 {
            let extent = self.half_extents[axis];
            if direction[axis].abs() < 1e-8 {
                if origin[axis].abs() > extent {
                    return None;
                }
                continue;
            }
            let inv_d = 1.0 / direction[axis];
            let mut t0 = (-extent - origin[axis]) * inv_d;
            let mut t1 = (extent - origin[axis]) * inv_d;
            let mut sign = -1.0;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                sign = 1.0;
            }
            if t0 > t_min {
                t_min = t0;
                hit_axis = Some((axis, sign));
            }
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        let normal = match hit_axis {
            Some((axis, sign)) => {
                let mut local = Vec3::zeros();
                local[axis] = sign;
                self.rotation * local
            }
            // Origin inside the box
            None => -ray.direction,
        };

        Some((t_min, ray.point_at(t_min), normal))
    }
}

/// A triangle for collision detection
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Calculates the normal of the triangle (right-hand rule)
    pub fn normal(&self) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).try_normalize(1e-12).unwrap_or_else(Vec3::y)
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Vertices as an array
    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Edge vectors
    pub fn edges(&self) -> [Vec3; 3] {
        [self.v1 - self.v0, self.v2 - self.v1, self.v0 - self.v2]
    }

    /// Möller-Trumbore ray-triangle intersection algorithm
    /// Returns (t, u, v) barycentric coordinates if hit, None otherwise
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 0.000_001;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        if t >= 0.0 {
            Some((t, u, v))
        } else {
            None
        }
    }

    /// Get the closest point on the triangle to a given point
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let v0_to_point = point - self.v0;

        let d1 = edge1.dot(&v0_to_point);
        let d2 = edge2.dot(&v0_to_point);

        // Vertex region outside v0
        if d1 <= 0.0 && d2 <= 0.0 {
            return self.v0;
        }

        // Vertex region outside v1
        let v1_to_point = point - self.v1;
        let d3 = edge1.dot(&v1_to_point);
        let d4 = edge2.dot(&v1_to_point);
        if d3 >= 0.0 && d4 <= d3 {
            return self.v1;
        }

        // Vertex region outside v2
        let v2_to_point = point - self.v2;
        let d5 = edge1.dot(&v2_to_point);
        let d6 = edge2.dot(&v2_to_point);
        if d6 >= 0.0 && d5 <= d6 {
            return self.v2;
        }

        // Edge regions
        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v_val = d1 / (d1 - d3);
            return self.v0 + edge1 * v_val;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return self.v0 + edge2 * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return self.v1 + (self.v2 - self.v1) * w;
        }

        // Inside the triangle
        let denom = 1.0 / (va + vb + vc);
        let v_val = vb * denom;
        let w = vc * denom;
        self.v0 + edge1 * v_val + edge2 * w
    }

    /// Distance from a point to the triangle plane (signed)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal().dot(&(point - self.v0))
    }

    /// Whether the point's projection onto the plane falls inside the triangle
    pub fn projects_inside(&self, point: Vec3) -> bool {
        let n = self.normal();
        let inside = |a: Vec3, b: Vec3| (b - a).cross(&(point - a)).dot(&n) >= -1e-6;
        inside(self.v0, self.v1) && inside(self.v1, self.v2) && inside(self.v2, self.v0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_ray_hit() {
        let sphere = BoundingSphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0);
        let ray = Ray::new(Vec3::zeros(), Vec3::z(), 100.0);
        let (t, point, normal) = sphere.intersect_ray(&ray).unwrap();
        assert_relative_eq!(t, 9.0, epsilon = 1e-5);
        assert_relative_eq!(point, Vec3::new(0.0, 0.0, 9.0), epsilon = 1e-5);
        assert_relative_eq!(normal, -Vec3::z(), epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_ray_miss_behind() {
        let sphere = BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0);
        let ray = Ray::new(Vec3::zeros(), Vec3::z(), 100.0);
        assert!(sphere.intersect_ray(&ray).is_none());
    }

    #[test]
    fn test_sphere_penetration() {
        let a = BoundingSphere::new(Vec3::zeros(), 1.0);
        let b = BoundingSphere::new(Vec3::new(1.5, 0.0, 0.0), 1.0);
        assert!(a.intersects(&b));
        assert_relative_eq!(a.penetration_depth(&b), 0.5);
    }

    #[test]
    fn test_box_ray_rotated() {
        let obb = OrientedBox::new(
            Vec3::new(0.0, 0.0, 5.0),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_4),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let ray = Ray::new(Vec3::zeros(), Vec3::z(), 100.0);
        let (t, _point, normal) = obb.intersect_ray(&ray).unwrap();
        // Corner of the rotated box faces the ray
        assert_relative_eq!(t, 5.0 - std::f32::consts::SQRT_2, epsilon = 1e-4);
        assert!(normal.z < 0.0);
    }

    #[test]
    fn test_box_ray_miss() {
        let obb = OrientedBox::new(Vec3::new(3.0, 0.0, 5.0), Quat::identity(), Vec3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Vec3::zeros(), Vec3::z(), 100.0);
        assert!(obb.intersect_ray(&ray).is_none());
    }

    #[test]
    fn test_box_closest_point_and_contains() {
        let obb = OrientedBox::new(Vec3::zeros(), Quat::identity(), Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(obb.closest_point(Vec3::new(5.0, 0.0, 0.0)), Vec3::new(1.0, 0.0, 0.0));
        assert!(obb.contains_point(Vec3::new(0.5, -1.5, 2.5), 0.0));
        assert!(!obb.contains_point(Vec3::new(1.5, 0.0, 0.0), 0.1));
        assert_eq!(obb.corners().len(), 8);
    }

    #[test]
    fn test_triangle_ray() {
        let tri = Triangle::new(
            Vec3::new(-1.0, -1.0, 5.0),
            Vec3::new(1.0, -1.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
        );
        let ray = Ray::new(Vec3::zeros(), Vec3::z(), 100.0);
        let (t, _, _) = tri.intersect_ray(&ray).unwrap();
        assert_relative_eq!(t, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_triangle_closest_point_regions() {
        let tri = Triangle::new(Vec3::zeros(), Vec3::x(), Vec3::z());
        // Above the interior
        assert_relative_eq!(tri.closest_point(Vec3::new(0.2, 3.0, 0.2)), Vec3::new(0.2, 0.0, 0.2), epsilon = 1e-6);
        // Beyond vertex v1
        assert_relative_eq!(tri.closest_point(Vec3::new(3.0, 0.0, -1.0)), Vec3::x(), epsilon = 1e-6);
        assert!(tri.projects_inside(Vec3::new(0.2, 3.0, 0.2)));
        assert!(!tri.projects_inside(Vec3::new(2.0, 3.0, 2.0)));
    }
}
