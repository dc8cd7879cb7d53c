//! Constraint and character controller descriptions

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::physics::collision_layers::CollisionLayers;

/// Kind of joint linking two bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConstraintType {
    /// No relative motion
    #[default]
    Fixed,
    /// Rotation about one axis
    Hinge,
    /// Translation along one axis
    Slider,
    /// Anchors kept within a distance range
    Distance,
    /// Ball joint with a swing limit
    Cone,
    /// Ball joint, anchors coincide
    PointToPoint,
    /// Per-axis limits on all six degrees of freedom
    SixDOF,
}

/// A joint between two bodies
///
/// Anchors are expressed in each body's local space. When the second entity
/// is `INVALID_ENTITY`, `anchor_b` is a world-space pin point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintConfig {
    /// Joint kind
    pub constraint_type: ConstraintType,
    /// Anchor on body A (local)
    pub anchor_a: Vec3,
    /// Anchor on body B (local), or world pin point
    pub anchor_b: Vec3,
    /// Hinge/slider/cone axis in body A's local space
    pub axis: Vec3,
    /// Lower limit: angle (rad) for hinge/cone, distance for slider/distance
    pub lower_limit: Option<f32>,
    /// Upper limit, same units as `lower_limit`
    pub upper_limit: Option<f32>,
    /// Spring stiffness, drives the joint towards its rest position
    pub spring_stiffness: Option<f32>,
    /// Spring damping
    pub spring_damping: f32,
    /// Constraint force (impulse per step over the timestep) above which the joint breaks
    pub break_force: Option<f32>,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            constraint_type: ConstraintType::Fixed,
            anchor_a: Vec3::zeros(),
            anchor_b: Vec3::zeros(),
            axis: Vec3::y(),
            lower_limit: None,
            upper_limit: None,
            spring_stiffness: None,
            spring_damping: 0.0,
            break_force: None,
        }
    }
}

impl ConstraintConfig {
    /// Constraint of a given type with default anchors
    pub fn new(constraint_type: ConstraintType) -> Self {
        Self {
            constraint_type,
            ..Default::default()
        }
    }

    /// Builder pattern: Set anchors
    pub fn with_anchors(mut self, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        self.anchor_a = anchor_a;
        self.anchor_b = anchor_b;
        self
    }

    /// Builder pattern: Set axis
    pub fn with_axis(mut self, axis: Vec3) -> Self {
        self.axis = axis;
        self
    }

    /// Builder pattern: Set limits
    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.lower_limit = Some(lower);
        self.upper_limit = Some(upper);
        self
    }

    /// Builder pattern: Set spring
    pub fn with_spring(mut self, stiffness: f32, damping: f32) -> Self {
        self.spring_stiffness = Some(stiffness);
        self.spring_damping = damping;
        self
    }

    /// Builder pattern: Set break force
    pub fn with_break_force(mut self, force: f32) -> Self {
        self.break_force = Some(force);
        self
    }

    /// Normalized axis, falling back to +Y for a zero vector
    pub fn unit_axis(&self) -> Vec3 {
        self.axis.try_normalize(1e-6).unwrap_or_else(Vec3::y)
    }

    /// Limits as an ordered pair when both are set
    pub fn limits(&self) -> Option<(f32, f32)> {
        match (self.lower_limit, self.upper_limit) {
            (Some(lo), Some(hi)) => Some((lo.min(hi), lo.max(hi))),
            _ => None,
        }
    }
}

/// Kinematic capsule character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterControllerConfig {
    /// Total height including the hemispheres
    pub height: f32,
    /// Capsule radius
    pub radius: f32,
    /// Highest ledge that is stepped over automatically
    pub step_height: f32,
    /// Steepest walkable slope, degrees
    pub max_slope_angle: f32,
    /// Gap kept between the capsule and geometry
    pub skin_width: f32,
    /// Layer bits the character occupies
    pub collision_layer: u32,
    /// Layer bits the character collides with
    pub collision_mask: u32,
}

impl Default for CharacterControllerConfig {
    fn default() -> Self {
        Self {
            height: 1.8,
            radius: 0.3,
            step_height: 0.35,
            max_slope_angle: 45.0,
            skin_width: 0.02,
            collision_layer: CollisionLayers::CHARACTER,
            collision_mask: CollisionLayers::ALL,
        }
    }
}

impl CharacterControllerConfig {
    /// Half length of the capsule's axis segment
    pub fn half_segment(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_limits_are_ordered() {
        let c = ConstraintConfig::new(ConstraintType::Hinge).with_limits(1.0, -1.0);
        assert_eq!(c.limits(), Some((-1.0, 1.0)));
        assert_eq!(ConstraintConfig::default().limits(), None);
    }

    #[test]
    fn test_unit_axis_fallback() {
        let c = ConstraintConfig::default().with_axis(Vec3::zeros());
        assert_eq!(c.unit_axis(), Vec3::y());
        let c = ConstraintConfig::default().with_axis(Vec3::new(0.0, 0.0, 4.0));
        assert_relative_eq!(c.unit_axis(), Vec3::z());
    }

    #[test]
    fn test_character_half_segment() {
        let cfg = CharacterControllerConfig { height: 2.0, radius: 0.5, ..Default::default() };
        assert_relative_eq!(cfg.half_segment(), 0.5);
        let squat = CharacterControllerConfig { height: 0.5, radius: 0.5, ..Default::default() };
        assert_relative_eq!(squat.half_segment(), 0.0);
    }
}
