//! Kinematic character controller of the reference backend
//!
//! The capsule is swept by plain displacement and then pushed out of the
//! obstacles it overlaps. The part of the capsule below `step_height` is
//! ignored while pushing out; a downward ground probe then lifts the
//! character onto low ledges and snaps it onto walkable ground.

use crate::foundation::math::{utils, Vec3};
use crate::physics::collision::BoundingSphere;
use crate::physics::types::{CharacterControllerConfig, Ray};
use super::shape::Leaf;

/// Push-out passes per move
const MAX_ITERATIONS: usize = 4;

/// Extra reach of the ground probe beyond the skin
const GROUND_TOLERANCE: f32 = 0.05;

/// A character owned by the reference backend
#[derive(Debug, Clone)]
pub struct CharacterState {
    /// Capsule description
    pub config: CharacterControllerConfig,
    /// Capsule centre
    pub position: Vec3,
    /// Stood on walkable ground after the last move
    pub grounded: bool,
}

impl CharacterState {
    /// Character at a position
    pub fn new(config: CharacterControllerConfig, position: Vec3) -> Self {
        Self {
            config,
            position,
            grounded: false,
        }
    }

    /// Spheres covering the capsule above the step height, inflated by the skin
    fn collision_spheres(&self, center: Vec3) -> Vec<BoundingSphere> {
        let cfg = &self.config;
        let half = cfg.half_segment();
        let radius = cfg.radius + cfg.skin_width;
        let top = center.y + half;
        let bottom = (center.y - half + cfg.step_height).min(top);
        let count = (((top - bottom) / (cfg.radius * 0.5).max(1e-3)).ceil() as usize + 1).max(1);
        (0..count)
            .map(|i| {
                let t = if count == 1 { 0.0 } else { i as f32 / (count - 1) as f32 };
                BoundingSphere::new(Vec3::new(center.x, bottom + (top - bottom) * t, center.z), radius)
            })
            .collect()
    }

    /// Shapes used for debug drawing
    pub fn outline(&self) -> Vec<BoundingSphere> {
        let half = self.config.half_segment();
        vec![
            BoundingSphere::new(self.position - Vec3::y() * half, self.config.radius),
            BoundingSphere::new(self.position + Vec3::y() * half, self.config.radius),
        ]
    }

    /// Move by `displacement` against the given obstacles, returns the new position
    pub fn move_by(&mut self, displacement: Vec3, obstacles: &[Leaf]) -> Vec3 {
        let mut target = self.position + displacement;

        for _ in 0..MAX_ITERATIONS {
            let deepest = self
                .collision_spheres(target)
                .into_iter()
                .flat_map(|s| obstacles.iter().flat_map(move |o| Leaf::Sphere(s).contacts(o)))
                .max_by(|a, b| a.depth.total_cmp(&b.depth));
            match deepest {
                Some(c) if c.depth > 1e-5 => target -= c.normal * c.depth,
                _ => break,
            }
        }

        self.grounded = false;
        let cfg = &self.config;
        let half_total = cfg.height * 0.5;
        if displacement.y <= 1e-6 {
            let probe = Ray::new(
                target + Vec3::y() * cfg.step_height,
                -Vec3::y(),
                half_total + cfg.step_height + cfg.skin_width * 2.0 + GROUND_TOLERANCE,
            );
            let hit = obstacles
                .iter()
                .filter_map(|o| o.raycast(&probe))
                .filter(|(t, _, _)| *t <= probe.max_distance)
                .min_by(|a, b| a.0.total_cmp(&b.0));

            if let Some((_, point, normal)) = hit {
                let walkable = normal.dot(&Vec3::y()) >= utils::deg_to_rad(cfg.max_slope_angle).cos();
                let gap = (target.y - half_total) - point.y;
                if walkable && gap <= cfg.skin_width * 2.0 + GROUND_TOLERANCE {
                    target.y = point.y + half_total + cfg.skin_width;
                    self.grounded = true;
                }
            }
        }

        self.position = target;
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use crate::physics::collision::OrientedBox;
    use approx::assert_relative_eq;

    fn floor() -> Leaf {
        Leaf::Box(OrientedBox::new(Vec3::zeros(), Quat::identity(), Vec3::new(10.0, 0.5, 10.0)))
    }

    fn character() -> CharacterState {
        CharacterState::new(CharacterControllerConfig::default(), Vec3::new(0.0, 1.45, 0.0))
    }

    #[test]
    fn test_character_lands_on_floor() {
        let mut c = character();
        let obstacles = [floor()];
        for _ in 0..30 {
            c.move_by(Vec3::new(0.0, -0.1, 0.0), &obstacles);
        }
        assert!(c.grounded);
        let feet = c.position.y - c.config.height * 0.5;
        assert_relative_eq!(feet, 0.5 + c.config.skin_width, epsilon = 1e-4);
    }

    #[test]
    fn test_character_blocked_by_wall() {
        let mut c = character();
        let wall = Leaf::Box(OrientedBox::new(Vec3::new(2.0, 2.0, 0.0), Quat::identity(), Vec3::new(0.5, 2.0, 5.0)));
        let obstacles = [floor(), wall];
        for _ in 0..40 {
            c.move_by(Vec3::new(0.1, -0.05, 0.0), &obstacles);
        }
        // Never past the wall face minus the capsule radius
        assert!(c.position.x <= 1.5 - c.config.radius + 1e-3);
        assert!(c.grounded);
    }

    #[test]
    fn test_character_steps_onto_low_ledge() {
        let mut c = character();
        let ledge = Leaf::Box(OrientedBox::new(Vec3::new(2.0, 0.6, 0.0), Quat::identity(), Vec3::new(1.0, 0.2, 1.0)));
        let obstacles = [floor(), ledge];
        for _ in 0..20 {
            c.move_by(Vec3::new(0.1, -0.05, 0.0), &obstacles);
        }
        let feet = c.position.y - c.config.height * 0.5;
        assert!(c.position.x > 1.5);
        assert_relative_eq!(feet, 0.8 + c.config.skin_width, epsilon = 1e-3);
    }

    #[test]
    fn test_jumping_is_not_grounded() {
        let mut c = character();
        c.move_by(Vec3::new(0.0, 0.2, 0.0), &[floor()]);
        assert!(!c.grounded);
    }
}
