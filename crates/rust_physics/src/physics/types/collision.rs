//! Per-step collision records and ray queries

use crate::foundation::math::Vec3;
use crate::physics::collision_layers::CollisionLayers;
use super::transform::{EntityId, INVALID_ENTITY};

/// One contact point of a manifold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World space contact position
    pub position: Vec3,
    /// World space normal pointing from entity A towards entity B
    pub normal: Vec3,
    /// Overlap depth, positive when penetrating
    pub penetration_depth: f32,
}

/// Contact between two bodies during the most recent step
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionInfo {
    /// First participant
    pub entity_a: EntityId,
    /// Second participant
    pub entity_b: EntityId,
    /// Contact points, empty for trigger overlaps
    pub contacts: Vec<ContactPoint>,
    /// Sum of the normal impulses applied by the solver
    pub impulse: f32,
    /// Relative velocity of B with respect to A along the contact normal
    pub separation_velocity: f32,
    /// At least one participant is a trigger volume
    pub is_trigger: bool,
}

impl Default for CollisionInfo {
    fn default() -> Self {
        Self {
            entity_a: INVALID_ENTITY,
            entity_b: INVALID_ENTITY,
            contacts: Vec::new(),
            impulse: 0.0,
            separation_velocity: 0.0,
            is_trigger: false,
        }
    }
}

impl CollisionInfo {
    /// Both participants are real entities
    pub fn is_valid(&self) -> bool {
        self.entity_a != INVALID_ENTITY && self.entity_b != INVALID_ENTITY
    }

    /// Whether `entity` takes part in this collision
    pub fn involves(&self, entity: EntityId) -> bool {
        self.entity_a == entity || self.entity_b == entity
    }

    /// The participant that is not `entity`
    pub fn other(&self, entity: EntityId) -> EntityId {
        if self.entity_a == entity {
            self.entity_b
        } else {
            self.entity_a
        }
    }

    /// Deepest penetration among the contacts
    pub fn max_penetration(&self) -> f32 {
        self.contacts
            .iter()
            .map(|c| c.penetration_depth)
            .fold(0.0, f32::max)
    }
}

/// A ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point in world space
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
    /// Length of the query segment
    pub max_distance: f32,
    /// Only bodies whose layer intersects this mask are hit
    pub layer_mask: u32,
}

impl Ray {
    /// Creates a ray, normalizing the direction
    ///
    /// A zero direction stays zero and never hits anything.
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.try_normalize(1e-12).unwrap_or_else(Vec3::zeros),
            max_distance,
            layer_mask: CollisionLayers::ALL,
        }
    }

    /// Builder pattern: Restrict the query to some layers
    pub fn with_layer_mask(mut self, mask: u32) -> Self {
        self.layer_mask = mask;
        self
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// End of the query segment
    pub fn end(&self) -> Vec3 {
        self.point_at(self.max_distance)
    }

    /// Whether the query can hit anything at all
    pub fn is_degenerate(&self) -> bool {
        self.direction == Vec3::zeros() || !(self.max_distance > 0.0)
    }
}

/// Result of a ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastResult {
    /// The entity that was hit, `INVALID_ENTITY` for no hit
    pub entity: EntityId,
    /// Hit point in world space
    pub point: Vec3,
    /// Surface normal at the hit point
    pub normal: Vec3,
    /// Distance from the ray origin
    pub distance: f32,
}

impl Default for RaycastResult {
    fn default() -> Self {
        Self {
            entity: INVALID_ENTITY,
            point: Vec3::zeros(),
            normal: Vec3::zeros(),
            distance: 0.0,
        }
    }
}

impl RaycastResult {
    /// Whether something was hit
    pub fn has_hit(&self) -> bool {
        self.entity != INVALID_ENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_collision_info_validity() {
        let mut info = CollisionInfo::default();
        assert!(!info.is_valid());
        info.entity_a = 1;
        assert!(!info.is_valid());
        info.entity_b = 2;
        assert!(info.is_valid());
        assert_eq!(info.other(1), 2);
        assert_eq!(info.other(2), 1);
    }

    #[test]
    fn test_raycast_result_has_hit() {
        let mut result = RaycastResult::default();
        assert!(!result.has_hit());
        result.entity = 9;
        assert!(result.has_hit());
    }

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 5.0), 10.0);
        assert_relative_eq!(ray.direction, Vec3::z());
        assert_relative_eq!(ray.end(), Vec3::new(0.0, 0.0, 10.0));
        assert!(!ray.is_degenerate());
    }

    #[test]
    fn test_zero_direction_ray_is_degenerate() {
        let ray = Ray::new(Vec3::zeros(), Vec3::zeros(), 10.0);
        assert!(ray.is_degenerate());
    }
}
