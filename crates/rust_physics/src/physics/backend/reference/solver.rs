//! Sequential impulse solver of the reference backend

use crate::foundation::math::{utils, Iso3, Mat3, Quat, Vec3};
use crate::physics::backend::shape_builder::ShapeBundle;
use crate::physics::collision::Contact;
use crate::physics::types::{ColliderConfig, ConstraintConfig, ConstraintType, EntityId, MotionType, RigidBody};
use super::shape::{world_leaves, Leaf, ReferenceShape};

/// Fraction of the position error corrected per step
pub const BAUMGARTE: f32 = 0.2;

/// Penetration allowed without correction
pub const PENETRATION_SLOP: f32 = 0.005;

/// Approach speed below which contacts do not bounce
pub const RESTITUTION_THRESHOLD: f32 = 1.0;

/// Seconds a body must rest before it sleeps
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Simulation state of one body
#[derive(Debug)]
pub struct BodyState {
    /// Owning entity
    pub entity: EntityId,
    /// Centre of mass position
    pub position: Vec3,
    /// Orientation
    pub rotation: Quat,
    /// Host scale, carried through unchanged
    pub scale: Vec3,
    /// Linear velocity
    pub linear_velocity: Vec3,
    /// Angular velocity
    pub angular_velocity: Vec3,
    /// Force accumulated for the next step
    pub force: Vec3,
    /// Torque accumulated for the next step
    pub torque: Vec3,
    /// Body description
    pub body: RigidBody,
    /// Collider description
    pub collider: ColliderConfig,
    /// Owned shape bundle
    pub shape: ShapeBundle<ReferenceShape>,
    /// Inverse principal inertia in the local frame
    pub inverse_inertia_local: Vec3,
    /// Asleep
    pub sleeping: bool,
    /// Time spent below the sleep threshold
    pub sleep_timer: f32,
}

impl BodyState {
    /// Recompute mass properties after the body or shape changed
    pub fn refresh_mass(&mut self) {
        self.inverse_inertia_local = if self.body.is_dynamic() {
            self.shape
                .shape
                .principal_inertia(self.body.mass)
                .map(|i| if i > 1e-9 { 1.0 / i } else { 0.0 })
        } else {
            Vec3::zeros()
        };
    }

    /// Pose of the body
    pub fn pose(&self) -> Iso3 {
        utils::isometry(&self.position, &self.rotation)
    }

    /// World-space collision leaves
    pub fn leaves(&self) -> Vec<Leaf> {
        world_leaves(&self.shape.shape, &self.pose(), &self.collider.offset, &self.collider.rotation)
    }

    /// Bounding radius around the body origin
    pub fn bounding_radius(&self) -> f32 {
        self.collider.offset.magnitude() + self.shape.shape.bounding_radius()
    }

    /// Whether the solver may change this body's velocity this step
    pub fn is_solvable(&self) -> bool {
        self.body.is_dynamic() && !self.sleeping
    }

    /// Inverse mass seen by the solver
    pub fn solver_inverse_mass(&self) -> f32 {
        if self.is_solvable() {
            self.body.inverse_mass()
        } else {
            0.0
        }
    }

    /// Inverse inertia tensor in world space as seen by the solver
    pub fn solver_inverse_inertia(&self) -> Mat3 {
        if !self.is_solvable() {
            return Mat3::zeros();
        }
        let r = self.rotation.to_rotation_matrix();
        r.matrix() * Mat3::from_diagonal(&self.inverse_inertia_local) * r.matrix().transpose()
    }

    /// Velocity of a point given relative to the centre of mass
    pub fn velocity_at(&self, r: &Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(r)
    }

    /// Wake the body up
    pub fn wake(&mut self) {
        self.sleeping = false;
        self.sleep_timer = 0.0;
    }

    /// Apply an impulse at an offset from the centre of mass
    pub fn apply_impulse_at(&mut self, impulse: &Vec3, r: &Vec3) {
        let inv_mass = self.body.inverse_mass();
        self.linear_velocity += impulse * inv_mass;
        self.angular_velocity += self.solver_inverse_inertia() * r.cross(impulse);
    }
}

/// Velocity-level view of a body used while iterating
#[derive(Debug, Clone, Copy)]
pub struct SolverBody {
    /// Inverse mass
    pub inverse_mass: f32,
    /// World inverse inertia
    pub inverse_inertia: Mat3,
    /// Linear velocity
    pub linear_velocity: Vec3,
    /// Angular velocity
    pub angular_velocity: Vec3,
    /// Centre of mass
    pub position: Vec3,
}

impl SolverBody {
    /// Snapshot a body state
    pub fn from_state(state: &BodyState) -> Self {
        Self {
            inverse_mass: state.solver_inverse_mass(),
            inverse_inertia: state.solver_inverse_inertia(),
            linear_velocity: state.linear_velocity,
            angular_velocity: state.angular_velocity,
            position: state.position,
        }
    }

    /// Immovable anchor at a world point
    pub fn world(position: Vec3) -> Self {
        Self {
            inverse_mass: 0.0,
            inverse_inertia: Mat3::zeros(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            position,
        }
    }

    fn velocity_at(&self, r: &Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(r)
    }

    fn apply(&mut self, impulse: &Vec3, r: &Vec3) {
        self.linear_velocity += impulse * self.inverse_mass;
        self.angular_velocity += self.inverse_inertia * r.cross(impulse);
    }

    fn effective_mass_term(&self, r: &Vec3, n: &Vec3) -> f32 {
        let rn = r.cross(n);
        self.inverse_mass + rn.dot(&(self.inverse_inertia * rn))
    }
}

/// Index of a body in the solver arrays, `None` for the static world
pub type BodySlot = Option<usize>;

fn load(bodies: &[SolverBody], world: &SolverBody, slot: BodySlot) -> SolverBody {
    slot.map_or(*world, |i| bodies[i])
}

fn store(bodies: &mut [SolverBody], slot: BodySlot, value: SolverBody) {
    if let Some(i) = slot {
        bodies[i] = value;
    }
}

/// One contact point prepared for the iterations
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    /// Body A
    pub a: usize,
    /// Body B
    pub b: usize,
    /// Contact data, normal from A to B
    pub contact: Contact,
    ra: Vec3,
    rb: Vec3,
    normal_mass: f32,
    tangents: [Vec3; 2],
    tangent_mass: [f32; 2],
    target_velocity: f32,
    friction: f32,
    /// Accumulated normal impulse
    pub normal_impulse: f32,
    tangent_impulse: [f32; 2],
    /// Normal velocity of B relative to A before solving
    pub initial_normal_velocity: f32,
}

impl ContactConstraint {
    /// Prepare a contact for solving
    pub fn new(
        bodies: &[SolverBody],
        a: usize,
        b: usize,
        contact: Contact,
        friction: f32,
        restitution: f32,
        dt: f32,
    ) -> Self {
        let (body_a, body_b) = (&bodies[a], &bodies[b]);
        let n = contact.normal;
        let ra = contact.point - body_a.position;
        let rb = contact.point - body_b.position;

        let t1 = utils::any_orthogonal(&n);
        let t2 = n.cross(&t1);
        let mass = |dir: &Vec3| {
            let k = body_a.effective_mass_term(&ra, dir) + body_b.effective_mass_term(&rb, dir);
            if k > 1e-9 {
                1.0 / k
            } else {
                0.0
            }
        };

        let relative = body_b.velocity_at(&rb) - body_a.velocity_at(&ra);
        let vn = relative.dot(&n);
        let bounce = if vn < -RESTITUTION_THRESHOLD { -restitution * vn } else { 0.0 };
        let correction = BAUMGARTE / dt * (contact.depth - PENETRATION_SLOP).max(0.0);

        Self {
            a,
            b,
            contact,
            ra,
            rb,
            normal_mass: mass(&n),
            tangents: [t1, t2],
            tangent_mass: [mass(&t1), mass(&t2)],
            target_velocity: bounce.max(correction),
            friction,
            normal_impulse: 0.0,
            tangent_impulse: [0.0; 2],
            initial_normal_velocity: vn,
        }
    }

    /// One Gauss-Seidel iteration
    pub fn solve(&mut self, bodies: &mut [SolverBody]) {
        let n = self.contact.normal;
        let (mut body_a, mut body_b) = (bodies[self.a], bodies[self.b]);

        // Friction first, bounded by the current normal impulse
        for k in 0..2 {
            let t = self.tangents[k];
            let vt = (body_b.velocity_at(&self.rb) - body_a.velocity_at(&self.ra)).dot(&t);
            let limit = self.friction * self.normal_impulse;
            let old = self.tangent_impulse[k];
            self.tangent_impulse[k] = (old - vt * self.tangent_mass[k]).clamp(-limit, limit);
            let impulse = t * (self.tangent_impulse[k] - old);
            body_a.apply(&-impulse, &self.ra);
            body_b.apply(&impulse, &self.rb);
        }

        let vn = (body_b.velocity_at(&self.rb) - body_a.velocity_at(&self.ra)).dot(&n);
        let old = self.normal_impulse;
        self.normal_impulse = (old + (self.target_velocity - vn) * self.normal_mass).max(0.0);
        let impulse = n * (self.normal_impulse - old);
        body_a.apply(&-impulse, &self.ra);
        body_b.apply(&impulse, &self.rb);

        bodies[self.a] = body_a;
        bodies[self.b] = body_b;
    }
}

/// A joint stored by the reference backend
#[derive(Debug, Clone)]
pub struct JointState {
    /// Description
    pub config: ConstraintConfig,
    /// Rest length for distance joints without limits
    pub rest_length: f32,
}

impl JointState {
    /// Whether the solver handles this joint type
    pub fn is_simulated(&self) -> bool {
        matches!(
            self.config.constraint_type,
            ConstraintType::PointToPoint | ConstraintType::Distance
        )
    }
}

/// One scalar joint row
#[derive(Debug, Clone)]
pub struct JointRow {
    a: BodySlot,
    b: BodySlot,
    ra: Vec3,
    rb: Vec3,
    direction: Vec3,
    mass: f32,
    bias: f32,
    min_impulse: f32,
    max_impulse: f32,
    accumulated: f32,
}

impl JointRow {
    /// Build the rows for a joint; `b` is `None` when pinned to the world
    pub fn build(
        bodies: &[SolverBody],
        a: usize,
        b: BodySlot,
        anchor_a: Vec3,
        anchor_b: Vec3,
        joint: &JointState,
        dt: f32,
    ) -> Vec<Self> {
        let world = SolverBody::world(anchor_b);
        let body_a = bodies[a];
        let body_b = b.map_or(world, |i| bodies[i]);
        let ra = anchor_a - body_a.position;
        let rb = anchor_b - body_b.position;
        let error = anchor_b - anchor_a;

        let row = |direction: Vec3, c: f32, min_impulse: f32, max_impulse: f32| {
            let k = body_a.effective_mass_term(&ra, &direction) + body_b.effective_mass_term(&rb, &direction);
            Self {
                a: Some(a),
                b,
                ra,
                rb,
                direction,
                mass: if k > 1e-9 { 1.0 / k } else { 0.0 },
                bias: BAUMGARTE / dt * c,
                min_impulse,
                max_impulse,
                accumulated: 0.0,
            }
        };

        match joint.config.constraint_type {
            ConstraintType::PointToPoint => [Vec3::x(), Vec3::y(), Vec3::z()]
                .into_iter()
                .map(|axis| row(axis, error.dot(&axis), f32::MIN, f32::MAX))
                .collect(),
            ConstraintType::Distance => {
                let length = error.magnitude();
                let Some(direction) = error.try_normalize(1e-6) else {
                    return Vec::new();
                };
                let (lo, hi) = joint.config.limits().unwrap_or((joint.rest_length, joint.rest_length));
                if length > hi {
                    // Too far: only pulling impulses
                    vec![row(direction, length - hi, f32::MIN, 0.0)]
                } else if length < lo {
                    vec![row(direction, length - lo, 0.0, f32::MAX)]
                } else if (hi - lo).abs() < 1e-6 {
                    vec![row(direction, 0.0, f32::MIN, f32::MAX)]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// One Gauss-Seidel iteration
    pub fn solve(&mut self, bodies: &mut [SolverBody], world: &SolverBody) {
        let mut body_a = load(bodies, world, self.a);
        let mut body_b = load(bodies, world, self.b);
        let v = (body_b.velocity_at(&self.rb) - body_a.velocity_at(&self.ra)).dot(&self.direction);
        let old = self.accumulated;
        self.accumulated = (old - (v + self.bias) * self.mass).clamp(self.min_impulse, self.max_impulse);
        let impulse = self.direction * (self.accumulated - old);
        body_a.apply(&-impulse, &self.ra);
        body_b.apply(&impulse, &self.rb);
        store(bodies, self.a, body_a);
        store(bodies, self.b, body_b);
    }
}

/// Advance velocities by gravity, forces and damping
pub fn integrate_velocity(state: &mut BodyState, gravity: &Vec3, dt: f32) {
    if !state.is_solvable() {
        return;
    }
    let inv_mass = state.body.inverse_mass();
    state.linear_velocity += (gravity * state.body.gravity_factor() + state.force * inv_mass) * dt;
    state.angular_velocity += state.solver_inverse_inertia() * state.torque * dt;
    state.linear_velocity *= 1.0 / (1.0 + dt * state.body.linear_damping);
    state.angular_velocity *= 1.0 / (1.0 + dt * state.body.angular_damping);
}

/// Advance the pose by the current velocities
pub fn integrate_position(state: &mut BodyState, dt: f32) {
    let moves = match state.body.motion_type {
        MotionType::Static => false,
        MotionType::Kinematic => true,
        MotionType::Dynamic => !state.sleeping,
    };
    if !moves {
        return;
    }
    state.position += state.linear_velocity * dt;
    let spin = state.angular_velocity * dt;
    let angle = spin.magnitude();
    if angle > 1e-9 {
        let delta = Quat::from_scaled_axis(spin);
        state.rotation = Quat::new_normalize((delta * state.rotation).into_inner());
    }
}

/// Update the sleep timer, returns true when the body just fell asleep
pub fn update_sleep(state: &mut BodyState, threshold: f32, dt: f32) -> bool {
    if !state.body.is_dynamic() || state.sleeping {
        return false;
    }
    if !state.body.allow_sleep {
        state.sleep_timer = 0.0;
        return false;
    }
    let resting = state.linear_velocity.magnitude_squared() < threshold * threshold
        && state.angular_velocity.magnitude_squared() < threshold * threshold;
    if resting {
        state.sleep_timer += dt;
        if state.sleep_timer >= TIME_TO_SLEEP {
            state.sleeping = true;
            state.linear_velocity = Vec3::zeros();
            state.angular_velocity = Vec3::zeros();
            return true;
        }
    } else {
        state.sleep_timer = 0.0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn body(inverse_mass: f32, position: Vec3, velocity: Vec3) -> SolverBody {
        SolverBody {
            inverse_mass,
            inverse_inertia: Mat3::zeros(),
            linear_velocity: velocity,
            angular_velocity: Vec3::zeros(),
            position,
        }
    }

    #[test]
    fn test_contact_stops_approach() {
        let mut bodies = vec![
            body(0.0, Vec3::zeros(), Vec3::zeros()),
            body(1.0, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -0.5, 0.0)),
        ];
        let contact = Contact { point: Vec3::new(0.0, 0.5, 0.0), normal: Vec3::y(), depth: 0.0 };
        let mut c = ContactConstraint::new(&bodies, 0, 1, contact, 0.5, 0.0, 1.0 / 60.0);
        for _ in 0..4 {
            c.solve(&mut bodies);
        }
        assert_relative_eq!(bodies[1].linear_velocity.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(c.normal_impulse, 0.5, epsilon = 1e-5);
        assert_relative_eq!(c.initial_normal_velocity, -0.5);
    }

    #[test]
    fn test_contact_never_pulls() {
        let mut bodies = vec![
            body(0.0, Vec3::zeros(), Vec3::zeros()),
            body(1.0, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0)),
        ];
        let contact = Contact { point: Vec3::new(0.0, 0.5, 0.0), normal: Vec3::y(), depth: 0.0 };
        let mut c = ContactConstraint::new(&bodies, 0, 1, contact, 0.5, 0.0, 1.0 / 60.0);
        c.solve(&mut bodies);
        assert_relative_eq!(bodies[1].linear_velocity.y, 2.0);
        assert_eq!(c.normal_impulse, 0.0);
    }

    #[test]
    fn test_restitution_bounces_fast_impacts() {
        let mut bodies = vec![
            body(0.0, Vec3::zeros(), Vec3::zeros()),
            body(1.0, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -4.0, 0.0)),
        ];
        let contact = Contact { point: Vec3::new(0.0, 0.5, 0.0), normal: Vec3::y(), depth: 0.0 };
        let mut c = ContactConstraint::new(&bodies, 0, 1, contact, 0.0, 0.5, 1.0 / 60.0);
        for _ in 0..4 {
            c.solve(&mut bodies);
        }
        assert_relative_eq!(bodies[1].linear_velocity.y, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_world_pinned_point_joint_holds_body() {
        let mut bodies = vec![body(1.0, Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, -3.0, 0.0))];
        let world = SolverBody::world(Vec3::zeros());
        let joint = JointState {
            config: ConstraintConfig::new(ConstraintType::PointToPoint),
            rest_length: 0.0,
        };
        // Anchor on the body coincides with the pin
        let mut rows = JointRow::build(&bodies, 0, None, Vec3::zeros(), Vec3::zeros(), &joint, 1.0 / 60.0);
        assert_eq!(rows.len(), 3);
        for _ in 0..8 {
            for row in &mut rows {
                row.solve(&mut bodies, &world);
            }
        }
        assert_relative_eq!(bodies[0].linear_velocity, Vec3::zeros(), epsilon = 1e-4);
    }

    #[test]
    fn test_point_joint_pulls_anchor_back_to_pin() {
        let mut bodies = vec![body(1.0, Vec3::new(0.1, 0.0, 0.0), Vec3::zeros())];
        let world = SolverBody::world(Vec3::zeros());
        let joint = JointState {
            config: ConstraintConfig::new(ConstraintType::PointToPoint),
            rest_length: 0.0,
        };
        let dt = 1.0 / 60.0;
        let mut rows = JointRow::build(&bodies, 0, None, Vec3::new(0.1, 0.0, 0.0), Vec3::zeros(), &joint, dt);
        for _ in 0..8 {
            for row in &mut rows {
                row.solve(&mut bodies, &world);
            }
        }
        // Moves towards the pin at BAUMGARTE of the error per step
        assert_relative_eq!(bodies[0].linear_velocity.x, -BAUMGARTE * 0.1 / dt, epsilon = 1e-4);
        assert_relative_eq!(bodies[0].linear_velocity.y, 0.0, epsilon = 1e-5);
    }
}
