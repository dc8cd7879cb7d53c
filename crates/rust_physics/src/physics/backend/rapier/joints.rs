//! Constraint descriptions to rapier joints

use rapier3d::dynamics::{
    FixedJointBuilder, GenericJoint, GenericJointBuilder, ImpulseJoint, ImpulseJointHandle, JointAxesMask,
    JointAxis, PrismaticJointBuilder, RevoluteJointBuilder, RopeJointBuilder, SphericalJointBuilder,
};
use rapier3d::math::{Point, UnitVector};

use crate::physics::types::{ConstraintConfig, ConstraintType};

const LINEAR_AXES: [JointAxis; 3] = [JointAxis::X, JointAxis::Y, JointAxis::Z];
const ANGULAR_AXES: [JointAxis; 3] = [JointAxis::AngX, JointAxis::AngY, JointAxis::AngZ];

/// A joint inserted into the rapier world
#[derive(Debug, Clone, Copy)]
pub struct JointRecord {
    /// Native handle
    pub handle: ImpulseJointHandle,
    /// Force above which the joint is removed
    pub break_force: Option<f32>,
}

impl JointRecord {
    /// Whether the last step pushed harder than the break force
    pub fn is_broken(&self, joint: &ImpulseJoint, dt: f32) -> bool {
        match self.break_force {
            Some(limit) if dt > 0.0 => joint.impulses.fixed_rows::<3>(0).magnitude() / dt > limit,
            _ => false,
        }
    }
}

/// Build the native joint for a constraint
///
/// Anchors are local to each body. `rest_length` is the anchor distance when
/// the constraint was created and bounds a distance joint without limits.
pub fn build_joint(config: &ConstraintConfig, anchor_a: Point<f32>, anchor_b: Point<f32>, rest_length: f32) -> GenericJoint {
    let axis = UnitVector::new_normalize(config.unit_axis());
    let spring = config
        .spring_stiffness
        .filter(|stiffness| *stiffness > 0.0)
        .map(|stiffness| (stiffness, config.spring_damping));

    match config.constraint_type {
        ConstraintType::Fixed => FixedJointBuilder::new()
            .local_anchor1(anchor_a)
            .local_anchor2(anchor_b)
            .into(),
        ConstraintType::Hinge => {
            let mut builder = RevoluteJointBuilder::new(axis)
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b);
            if let Some((lo, hi)) = config.limits() {
                builder = builder.limits([lo, hi]);
            }
            if let Some((stiffness, damping)) = spring {
                builder = builder.motor_position(0.0, stiffness, damping);
            }
            builder.into()
        }
        ConstraintType::Slider => {
            let mut builder = PrismaticJointBuilder::new(axis)
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b);
            if let Some((lo, hi)) = config.limits() {
                builder = builder.limits([lo, hi]);
            }
            if let Some((stiffness, damping)) = spring {
                builder = builder.motor_position(0.0, stiffness, damping);
            }
            builder.into()
        }
        ConstraintType::PointToPoint | ConstraintType::Cone => {
            let mut builder = SphericalJointBuilder::new()
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b);
            if config.constraint_type == ConstraintType::Cone {
                // Swing limited around the two axes orthogonal to the twist axis
                let (lo, hi) = config.limits().unwrap_or((-std::f32::consts::FRAC_PI_4, std::f32::consts::FRAC_PI_4));
                builder = builder.limits(JointAxis::AngY, [lo, hi]).limits(JointAxis::AngZ, [lo, hi]);
            }
            if let Some((stiffness, damping)) = spring {
                for ang in ANGULAR_AXES {
                    builder = builder.motor_position(ang, 0.0, stiffness, damping);
                }
            }
            builder.into()
        }
        ConstraintType::Distance => {
            let (lo, hi) = config.limits().unwrap_or((rest_length, rest_length));
            let mut builder = RopeJointBuilder::new()
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b)
                .limits([lo, hi]);
            if let Some((stiffness, damping)) = spring {
                builder = builder.motor_position(rest_length, stiffness, damping);
            }
            builder.into()
        }
        ConstraintType::SixDOF => {
            let mut builder = GenericJointBuilder::new(JointAxesMask::empty())
                .local_anchor1(anchor_a)
                .local_anchor2(anchor_b);
            if let Some((lo, hi)) = config.limits() {
                for lin in LINEAR_AXES {
                    builder = builder.limits(lin, [lo, hi]);
                }
            }
            if let Some((stiffness, damping)) = spring {
                for lin in LINEAR_AXES {
                    builder = builder.motor_position(lin, 0.0, stiffness, damping);
                }
            }
            builder.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hinge_keeps_limits() {
        let config = ConstraintConfig::new(ConstraintType::Hinge).with_limits(0.5, -0.5);
        let joint = build_joint(&config, Point::origin(), Point::origin(), 0.0);
        let limits = joint.limits(JointAxis::AngX).unwrap();
        assert_eq!((limits.min, limits.max), (-0.5, 0.5));
    }

    #[test]
    fn test_distance_without_limits_uses_rest_length() {
        let config = ConstraintConfig::new(ConstraintType::Distance);
        let joint = build_joint(&config, Point::origin(), Point::origin(), 2.0);
        let limits = joint.limits(JointAxis::X).unwrap();
        assert_eq!((limits.min, limits.max), (2.0, 2.0));
    }

    #[test]
    fn test_spring_becomes_position_motor() {
        let config = ConstraintConfig::new(ConstraintType::Hinge).with_spring(50.0, 2.0);
        let joint = build_joint(&config, Point::origin(), Point::origin(), 0.0);
        let motor = joint.motor(JointAxis::AngX).unwrap();
        assert_eq!((motor.target_pos, motor.stiffness, motor.damping), (0.0, 50.0, 2.0));

        let slider = ConstraintConfig::new(ConstraintType::Slider).with_spring(10.0, 1.0);
        let joint = build_joint(&slider, Point::origin(), Point::origin(), 0.0);
        assert_eq!(joint.motor(JointAxis::X).map(|m| m.stiffness), Some(10.0));

        let rope = ConstraintConfig::new(ConstraintType::Distance).with_spring(5.0, 0.5);
        let joint = build_joint(&rope, Point::origin(), Point::origin(), 3.0);
        assert_eq!(joint.motor(JointAxis::X).map(|m| m.target_pos), Some(3.0));
    }

    #[test]
    fn test_no_motor_without_positive_stiffness() {
        let plain = ConstraintConfig::new(ConstraintType::Hinge);
        assert!(build_joint(&plain, Point::origin(), Point::origin(), 0.0)
            .motor(JointAxis::AngX)
            .is_none());

        let slack = ConstraintConfig::new(ConstraintType::Hinge).with_spring(0.0, 1.0);
        assert!(build_joint(&slack, Point::origin(), Point::origin(), 0.0)
            .motor(JointAxis::AngX)
            .is_none());
    }

    #[test]
    fn test_cone_limits_both_swing_axes() {
        let config = ConstraintConfig::new(ConstraintType::Cone).with_limits(-0.2, 0.2);
        let joint = build_joint(&config, Point::origin(), Point::origin(), 0.0);
        for axis in [JointAxis::AngY, JointAxis::AngZ] {
            let limits = joint.limits(axis).unwrap();
            assert_eq!((limits.min, limits.max), (-0.2, 0.2));
        }
        assert!(joint.limits(JointAxis::AngX).is_none());
    }

    #[test]
    fn test_fixed_locks_every_axis() {
        let joint = build_joint(&ConstraintConfig::default(), Point::origin(), Point::origin(), 0.0);
        assert_eq!(joint.locked_axes, JointAxesMask::LOCKED_FIXED_AXES);
    }
}
