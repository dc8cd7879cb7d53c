//! Built-in reference backend
//!
//! A small deterministic rigid-body solver with no native dependencies.
//! Bodies are kept in entity order so every run with the same inputs
//! produces bit-identical results.
//!
//! Spheres, boxes and triangle meshes collide exactly. Capsules are chains of
//! spheres, cylinders and convex hulls are treated as their local bounding
//! box, and mesh against mesh is not resolved. Only point-to-point and
//! distance constraints are simulated; the other constraint types are
//! accepted and ignored.
//!
//! Pairs where neither body is awake are not tested, so a body asleep on a
//! static floor reports no contact until something wakes it.

pub mod character;
pub mod shape;
pub mod solver;

use std::collections::BTreeMap;

use crate::foundation::math::{utils, Point3, Vec3};
use crate::physics::backend::shape_builder::build_shape;
use crate::physics::backend::{BackendCapabilities, PhysicsBackend};
use crate::physics::collision::Contact;
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::debug_render::PhysicsDebugRenderer;
use crate::physics::error::PhysicsError;
use crate::physics::types::{
    CharacterControllerConfig, ColliderConfig, CollisionInfo, ConstraintConfig, ContactPoint, EntityId,
    MotionType, PhysicsConfig, PhysicsSyncResult, PhysicsTransform, Ray, RaycastResult, RigidBody,
    INVALID_ENTITY,
};

use character::CharacterState;
use shape::{Leaf, ReferenceShapeFactory};
use solver::{BodyState, ContactConstraint, JointRow, JointState, SolverBody};

const STATIC_COLOR: Vec3 = Vec3::new(0.5, 0.5, 0.5);
const KINEMATIC_COLOR: Vec3 = Vec3::new(0.2, 0.4, 1.0);
const AWAKE_COLOR: Vec3 = Vec3::new(0.2, 1.0, 0.2);
const SLEEPING_COLOR: Vec3 = Vec3::new(0.1, 0.4, 0.1);
const TRIGGER_COLOR: Vec3 = Vec3::new(1.0, 1.0, 0.2);
const CHARACTER_COLOR: Vec3 = Vec3::new(0.2, 1.0, 1.0);
const CONTACT_COLOR: Vec3 = Vec3::new(1.0, 0.2, 0.2);

/// Length of the contact normal lines in debug output
const CONTACT_NORMAL_LENGTH: f32 = 0.25;

/// Contacts between one pair of bodies found in a step
struct Manifold {
    a: usize,
    b: usize,
    contacts: Vec<Contact>,
    constraints: std::ops::Range<usize>,
}

/// Deterministic sequential impulse backend
pub struct ReferenceBackend {
    bodies: BTreeMap<EntityId, BodyState>,
    joints: BTreeMap<(EntityId, EntityId), JointState>,
    characters: BTreeMap<EntityId, CharacterState>,
    events: Vec<CollisionInfo>,
    debug_contacts: Vec<(Vec3, Vec3)>,
    config: PhysicsConfig,
    gravity: Vec3,
    initialized: bool,
}

impl ReferenceBackend {
    /// Create an uninitialized backend
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            joints: BTreeMap::new(),
            characters: BTreeMap::new(),
            events: Vec::new(),
            debug_contacts: Vec::new(),
            config: PhysicsConfig::default(),
            gravity: Vec3::zeros(),
            initialized: false,
        }
    }

    fn find_joint_key(&self, a: EntityId, b: EntityId) -> Option<(EntityId, EntityId)> {
        [(a, b), (b, a)].into_iter().find(|key| self.joints.contains_key(key))
    }

    /// Moving bodies drive collision detection; resting pairs are skipped
    fn is_active(state: &BodyState) -> bool {
        match state.body.motion_type {
            MotionType::Static => false,
            MotionType::Kinematic => true,
            MotionType::Dynamic => !state.sleeping,
        }
    }

    fn detect(states: &mut [BodyState], leaves: &[Vec<Leaf>], events: &mut Vec<CollisionInfo>) -> Vec<Manifold> {
        let mut manifolds = Vec::new();
        for i in 0..states.len() {
            for j in (i + 1)..states.len() {
                let (a, b) = (&states[i], &states[j]);
                if !a.body.is_dynamic() && !b.body.is_dynamic() {
                    continue;
                }
                if !Self::is_active(a) && !Self::is_active(b) {
                    continue;
                }
                if !CollisionLayers::should_collide(
                    a.body.collision_layer,
                    a.body.collision_mask,
                    b.body.collision_layer,
                    b.body.collision_mask,
                ) {
                    continue;
                }
                let reach = a.bounding_radius() + b.bounding_radius();
                if (a.position - b.position).magnitude_squared() > reach * reach {
                    continue;
                }

                let contacts: Vec<Contact> = leaves[i]
                    .iter()
                    .flat_map(|la| leaves[j].iter().flat_map(move |lb| la.contacts(lb)))
                    .collect();
                if contacts.is_empty() {
                    continue;
                }

                if a.collider.is_trigger || b.collider.is_trigger {
                    events.push(CollisionInfo {
                        entity_a: a.entity,
                        entity_b: b.entity,
                        is_trigger: true,
                        ..Default::default()
                    });
                    continue;
                }

                if states[i].sleeping && Self::is_active(&states[j]) {
                    states[i].wake();
                }
                if states[j].sleeping && Self::is_active(&states[i]) {
                    states[j].wake();
                }
                manifolds.push(Manifold {
                    a: i,
                    b: j,
                    contacts,
                    constraints: 0..0,
                });
            }
        }
        manifolds
    }

    fn joint_rows(&self, states: &[BodyState], solver_bodies: &[SolverBody], dt: f32) -> Vec<JointRow> {
        let index_of = |entity: EntityId| states.binary_search_by_key(&entity, |s| s.entity).ok();
        let mut rows = Vec::new();
        for (&(ea, eb), joint) in &self.joints {
            if !joint.is_simulated() {
                continue;
            }
            let Some(ia) = index_of(ea) else { continue };
            let ib = if eb == INVALID_ENTITY {
                None
            } else {
                match index_of(eb) {
                    Some(i) => Some(i),
                    None => continue,
                }
            };
            let anchor_a = states[ia].pose() * Point3::from(joint.config.anchor_a);
            let anchor_b = match ib {
                Some(i) => (states[i].pose() * Point3::from(joint.config.anchor_b)).coords,
                None => joint.config.anchor_b,
            };
            rows.extend(JointRow::build(solver_bodies, ia, ib, anchor_a.coords, anchor_b, joint, dt));
        }
        rows
    }

    fn world_anchors(&self, a: EntityId, b: EntityId, config: &ConstraintConfig) -> Option<(Vec3, Vec3)> {
        let body_a = self.bodies.get(&a)?;
        let anchor_a = (body_a.pose() * Point3::from(config.anchor_a)).coords;
        let anchor_b = if b == INVALID_ENTITY {
            config.anchor_b
        } else {
            (self.bodies.get(&b)?.pose() * Point3::from(config.anchor_b)).coords
        };
        Some((anchor_a, anchor_b))
    }

    fn obstacles_for(&self, config: &CharacterControllerConfig) -> Vec<Leaf> {
        self.bodies
            .values()
            .filter(|s| !s.collider.is_trigger)
            .filter(|s| {
                CollisionLayers::should_collide(
                    config.collision_layer,
                    config.collision_mask,
                    s.body.collision_layer,
                    s.body.collision_mask,
                )
            })
            .flat_map(BodyState::leaves)
            .collect()
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReferenceBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PhysicsBackend for ReferenceBackend {
    fn initialize(&mut self, config: &PhysicsConfig) -> Result<(), PhysicsError> {
        if self.initialized {
            log::warn!("[Reference] initialize called twice, keeping the existing world");
            return Ok(());
        }
        config.validate()?;
        self.config = config.clone();
        self.gravity = config.gravity;
        self.initialized = true;
        log::info!(
            "[Reference] World created (gravity {:?}, {} solver iterations)",
            self.gravity,
            self.config.solver_iterations
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        self.joints.clear();
        self.characters.clear();
        while let Some((entity, _)) = self.bodies.pop_first() {
            log::trace!("[Reference] Released body for entity {}", entity);
        }
        self.events.clear();
        self.debug_contacts.clear();
        self.initialized = false;
        log::info!("[Reference] World shut down");
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn step_simulation(&mut self, delta_time: f32) {
        if !self.initialized || delta_time <= 0.0 {
            return;
        }
        self.events.clear();
        self.debug_contacts.clear();

        let mut states: Vec<BodyState> = std::mem::take(&mut self.bodies).into_values().collect();
        for state in &mut states {
            solver::integrate_velocity(state, &self.gravity, delta_time);
            state.force = Vec3::zeros();
            state.torque = Vec3::zeros();
        }

        let leaves: Vec<Vec<Leaf>> = states.iter().map(BodyState::leaves).collect();
        let mut manifolds = Self::detect(&mut states, &leaves, &mut self.events);

        let mut solver_bodies: Vec<SolverBody> = states.iter().map(SolverBody::from_state).collect();
        let mut constraints = Vec::new();
        for manifold in &mut manifolds {
            let (a, b) = (&states[manifold.a], &states[manifold.b]);
            let friction = (a.collider.effective_friction(&a.body) * b.collider.effective_friction(&b.body)).sqrt();
            let restitution = a
                .collider
                .effective_restitution(&a.body)
                .max(b.collider.effective_restitution(&b.body));
            let start = constraints.len();
            for contact in &manifold.contacts {
                constraints.push(ContactConstraint::new(
                    &solver_bodies,
                    manifold.a,
                    manifold.b,
                    *contact,
                    friction,
                    restitution,
                    delta_time,
                ));
            }
            manifold.constraints = start..constraints.len();
        }
        let mut rows = self.joint_rows(&states, &solver_bodies, delta_time);

        let world = SolverBody::world(Vec3::zeros());
        for _ in 0..self.config.solver_iterations.max(1) {
            for constraint in &mut constraints {
                constraint.solve(&mut solver_bodies);
            }
            for row in &mut rows {
                row.solve(&mut solver_bodies, &world);
            }
        }

        for (state, solved) in states.iter_mut().zip(&solver_bodies) {
            if state.is_solvable() {
                state.linear_velocity = solved.linear_velocity;
                state.angular_velocity = solved.angular_velocity;
            }
            solver::integrate_position(state, delta_time);
            if self.config.enable_sleeping && solver::update_sleep(state, self.config.sleep_threshold, delta_time) {
                log::trace!("[Reference] Entity {} fell asleep", state.entity);
            }
        }

        for manifold in &manifolds {
            let solved = &constraints[manifold.constraints.clone()];
            let count = solved.len().max(1) as f32;
            self.events.push(CollisionInfo {
                entity_a: states[manifold.a].entity,
                entity_b: states[manifold.b].entity,
                contacts: manifold
                    .contacts
                    .iter()
                    .map(|c| ContactPoint {
                        position: c.point,
                        normal: c.normal,
                        penetration_depth: c.depth,
                    })
                    .collect(),
                impulse: solved.iter().map(|c| c.normal_impulse).sum(),
                separation_velocity: solved.iter().map(|c| c.initial_normal_velocity).sum::<f32>() / count,
                is_trigger: false,
            });
            self.debug_contacts
                .extend(manifold.contacts.iter().map(|c| (c.point, c.normal)));
        }

        self.bodies = states.into_iter().map(|s| (s.entity, s)).collect();
    }

    fn sync_body_to_backend(
        &mut self,
        entity: EntityId,
        transform: &PhysicsTransform,
        body: &RigidBody,
        collider: &ColliderConfig,
    ) -> Result<(), PhysicsError> {
        if !self.initialized {
            return Err(PhysicsError::NotInitialized);
        }
        if let Err(err) = body.validate(entity) {
            log::error!("[Reference] {}", err);
            return Err(err);
        }
        if !utils::is_finite_vec3(&transform.position) || !utils::is_finite_vec3(&collider.offset) {
            let err = PhysicsError::InvalidBody {
                entity,
                reason: "non-finite position or collider offset".into(),
            };
            log::error!("[Reference] {}", err);
            return Err(err);
        }

        let bundle = build_shape(&mut ReferenceShapeFactory, &collider.shape);

        match self.bodies.get_mut(&entity) {
            Some(state) => {
                let was_dynamic = state.body.is_dynamic();
                state.shape = bundle;
                state.body = body.clone();
                state.collider = collider.clone();
                state.position = transform.position;
                state.rotation = transform.rotation;
                state.scale = transform.scale;
                match body.motion_type {
                    MotionType::Static => {
                        state.linear_velocity = Vec3::zeros();
                        state.angular_velocity = Vec3::zeros();
                    }
                    MotionType::Kinematic => {
                        state.linear_velocity = body.linear_velocity;
                        state.angular_velocity = body.angular_velocity;
                    }
                    MotionType::Dynamic if !was_dynamic => {
                        state.linear_velocity = body.linear_velocity;
                        state.angular_velocity = body.angular_velocity;
                    }
                    MotionType::Dynamic => {}
                }
                state.refresh_mass();
                state.wake();
                log::debug!("[Reference] Updated body for entity {}", entity);
            }
            None => {
                let (linear_velocity, angular_velocity) = match body.motion_type {
                    MotionType::Static => (Vec3::zeros(), Vec3::zeros()),
                    _ => (body.linear_velocity, body.angular_velocity),
                };
                let mut state = BodyState {
                    entity,
                    position: transform.position,
                    rotation: transform.rotation,
                    scale: transform.scale,
                    linear_velocity,
                    angular_velocity,
                    force: Vec3::zeros(),
                    torque: Vec3::zeros(),
                    body: body.clone(),
                    collider: collider.clone(),
                    shape: bundle,
                    inverse_inertia_local: Vec3::zeros(),
                    sleeping: false,
                    sleep_timer: 0.0,
                };
                state.refresh_mass();
                self.bodies.insert(entity, state);
                log::debug!(
                    "[Reference] Created {:?} body with {} for entity {}",
                    body.motion_type,
                    collider.shape.type_name(),
                    entity
                );
            }
        }
        Ok(())
    }

    fn sync_body_from_backend(&self, entity: EntityId) -> PhysicsSyncResult {
        self.bodies
            .get(&entity)
            .map(|s| PhysicsSyncResult {
                position: s.position,
                rotation: s.rotation,
                linear_velocity: s.linear_velocity,
                angular_velocity: s.angular_velocity,
            })
            .unwrap_or_default()
    }

    fn remove_body(&mut self, entity: EntityId) {
        if self.bodies.remove(&entity).is_some() {
            self.joints.retain(|&(a, b), _| a != entity && b != entity);
            log::debug!("[Reference] Removed body for entity {}", entity);
        }
    }

    fn has_body(&self, entity: EntityId) -> bool {
        self.bodies.contains_key(&entity)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn set_velocity(&mut self, entity: EntityId, linear: Vec3, angular: Vec3) -> bool {
        let Some(state) = self.bodies.get_mut(&entity) else {
            return false;
        };
        if state.body.motion_type != MotionType::Static {
            state.linear_velocity = linear;
            state.angular_velocity = angular;
            state.wake();
        }
        true
    }

    fn apply_force(&mut self, entity: EntityId, force: Vec3, torque: Vec3) {
        let Some(state) = self.bodies.get_mut(&entity) else {
            return;
        };
        if !state.body.is_dynamic() || (force == Vec3::zeros() && torque == Vec3::zeros()) {
            return;
        }
        state.wake();
        state.force += force;
        state.torque += torque;
    }

    fn apply_impulse(&mut self, entity: EntityId, impulse: Vec3, point: Vec3) {
        let Some(state) = self.bodies.get_mut(&entity) else {
            return;
        };
        if !state.body.is_dynamic() || impulse == Vec3::zeros() {
            return;
        }
        state.wake();
        let r = if point == Vec3::zeros() {
            Vec3::zeros()
        } else {
            point - state.position
        };
        state.apply_impulse_at(&impulse, &r);
    }

    fn is_sleeping(&self, entity: EntityId) -> bool {
        self.bodies.get(&entity).is_some_and(|s| s.sleeping)
    }

    fn collision_events(&self) -> &[CollisionInfo] {
        &self.events
    }

    fn raycast(&self, ray: &Ray) -> Option<RaycastResult> {
        self.raycast_all(ray).into_iter().next()
    }

    fn raycast_all(&self, ray: &Ray) -> Vec<RaycastResult> {
        if !self.initialized || ray.is_degenerate() {
            return Vec::new();
        }
        let mut hits: Vec<RaycastResult> = self
            .bodies
            .values()
            .filter(|s| !s.collider.is_trigger)
            .filter(|s| CollisionLayers::query_accepts(ray.layer_mask, s.body.collision_layer))
            .filter_map(|s| {
                s.leaves()
                    .iter()
                    .filter_map(|leaf| leaf.raycast(ray))
                    .filter(|(t, _, _)| *t <= ray.max_distance)
                    .min_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(distance, point, normal)| RaycastResult {
                        entity: s.entity,
                        point,
                        normal,
                        distance,
                    })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn add_constraint(&mut self, a: EntityId, b: EntityId, config: &ConstraintConfig) -> bool {
        if !self.initialized || a == b {
            return false;
        }
        if self.find_joint_key(a, b).is_some() {
            log::warn!("[Reference] Constraint between {} and {} already exists", a, b);
            return false;
        }
        let Some((anchor_a, anchor_b)) = self.world_anchors(a, b, config) else {
            log::warn!("[Reference] Cannot link {} and {}: missing body", a, b);
            return false;
        };
        let joint = JointState {
            config: config.clone(),
            rest_length: (anchor_b - anchor_a).magnitude(),
        };
        if !joint.is_simulated() {
            log::debug!(
                "[Reference] {:?} constraint between {} and {} is stored but not simulated",
                config.constraint_type,
                a,
                b
            );
        }
        self.joints.insert((a, b), joint);
        true
    }

    fn remove_constraint(&mut self, a: EntityId, b: EntityId) -> bool {
        match self.find_joint_key(a, b) {
            Some(key) => self.joints.remove(&key).is_some(),
            None => false,
        }
    }

    fn add_character(&mut self, entity: EntityId, position: Vec3, config: &CharacterControllerConfig) -> bool {
        if !self.initialized || self.characters.contains_key(&entity) {
            return false;
        }
        self.characters.insert(entity, CharacterState::new(config.clone(), position));
        log::debug!("[Reference] Created character for entity {}", entity);
        true
    }

    fn move_character(&mut self, entity: EntityId, displacement: Vec3, _delta_time: f32) -> Vec3 {
        let Some(config) = self.characters.get(&entity).map(|c| c.config.clone()) else {
            return Vec3::zeros();
        };
        let obstacles = self.obstacles_for(&config);
        match self.characters.get_mut(&entity) {
            Some(character) => character.move_by(displacement, &obstacles),
            None => Vec3::zeros(),
        }
    }

    fn character_position(&self, entity: EntityId) -> Vec3 {
        self.characters.get(&entity).map_or_else(Vec3::zeros, |c| c.position)
    }

    fn is_character_grounded(&self, entity: EntityId) -> bool {
        self.characters.get(&entity).is_some_and(|c| c.grounded)
    }

    fn remove_character(&mut self, entity: EntityId) {
        self.characters.remove(&entity);
    }

    fn has_character(&self, entity: EntityId) -> bool {
        self.characters.contains_key(&entity)
    }

    fn debug_draw(&mut self, renderer: &mut dyn PhysicsDebugRenderer) {
        for state in self.bodies.values() {
            let color = if state.collider.is_trigger {
                TRIGGER_COLOR
            } else {
                match state.body.motion_type {
                    MotionType::Static => STATIC_COLOR,
                    MotionType::Kinematic => KINEMATIC_COLOR,
                    MotionType::Dynamic if state.sleeping => SLEEPING_COLOR,
                    MotionType::Dynamic => AWAKE_COLOR,
                }
            };
            for leaf in state.leaves() {
                leaf.debug_draw(renderer, color);
            }
        }
        for character in self.characters.values() {
            for sphere in character.outline() {
                renderer.draw_wire_sphere(sphere.center, sphere.radius, CHARACTER_COLOR);
            }
        }
        for (point, normal) in &self.debug_contacts {
            renderer.draw_line(*point, point + normal * CONTACT_NORMAL_LENGTH, CONTACT_COLOR);
        }
    }

    fn engine_name(&self) -> &'static str {
        "Reference"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::RIGID_BODIES
            | BackendCapabilities::COLLISION_EVENTS
            | BackendCapabilities::RAYCASTS
            | BackendCapabilities::CHARACTERS
            | BackendCapabilities::DEBUG_DRAW
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::debug_render::DebugDrawBuffer;
    use crate::physics::types::{ConstraintType, ShapeConfig};
    use approx::assert_relative_eq;

    fn backend() -> ReferenceBackend {
        let mut backend = ReferenceBackend::new();
        backend.initialize(&PhysicsConfig::default()).unwrap();
        backend
    }

    fn add_box(backend: &mut ReferenceBackend, entity: EntityId, position: Vec3, body: RigidBody) {
        backend
            .sync_body_to_backend(
                entity,
                &PhysicsTransform::from_position(position),
                &body,
                &ColliderConfig::new(ShapeConfig::cuboid(0.5, 0.5, 0.5)),
            )
            .unwrap();
    }

    #[test]
    fn test_sync_requires_initialize() {
        let mut backend = ReferenceBackend::new();
        let result = backend.sync_body_to_backend(
            1,
            &PhysicsTransform::default(),
            &RigidBody::default(),
            &ColliderConfig::default(),
        );
        assert_eq!(result, Err(PhysicsError::NotInitialized));
    }

    #[test]
    fn test_invalid_mass_is_rejected() {
        let mut backend = backend();
        let result = backend.sync_body_to_backend(
            1,
            &PhysicsTransform::default(),
            &RigidBody::dynamic(0.0),
            &ColliderConfig::default(),
        );
        assert!(matches!(result, Err(PhysicsError::InvalidBody { entity: 1, .. })));
        assert!(!backend.has_body(1));
    }

    #[test]
    fn test_free_fall_matches_semi_implicit_euler() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 10.0, 0.0), RigidBody::dynamic(1.0));
        let dt = 1.0 / 60.0;
        backend.step_simulation(dt);
        let result = backend.sync_body_from_backend(1);
        assert_relative_eq!(result.linear_velocity.y, -9.81 * dt, epsilon = 1e-5);
        assert_relative_eq!(result.position.y, 10.0 - 9.81 * dt * dt, epsilon = 1e-5);
    }

    #[test]
    fn test_static_body_never_moves() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::fixed());
        for _ in 0..10 {
            backend.step_simulation(1.0 / 60.0);
        }
        assert_eq!(backend.sync_body_from_backend(1).position, Vec3::zeros());
    }

    #[test]
    fn test_kinematic_body_follows_velocity() {
        let mut backend = backend();
        add_box(
            &mut backend,
            1,
            Vec3::zeros(),
            RigidBody::kinematic().with_velocity(Vec3::new(1.0, 0.0, 0.0), Vec3::zeros()),
        );
        for _ in 0..60 {
            backend.step_simulation(1.0 / 60.0);
        }
        assert_relative_eq!(backend.sync_body_from_backend(1).position.x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_trigger_reports_without_contacts() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::dynamic(1.0).with_gravity(false, 1.0));
        backend
            .sync_body_to_backend(
                2,
                &PhysicsTransform::from_position(Vec3::new(0.5, 0.0, 0.0)),
                &RigidBody::fixed(),
                &ColliderConfig::new(ShapeConfig::sphere(1.0)).as_trigger(),
            )
            .unwrap();
        backend.step_simulation(1.0 / 60.0);
        let events = backend.collision_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_trigger);
        assert!(events[0].contacts.is_empty());
        // Trigger does not push the body
        assert_eq!(backend.sync_body_from_backend(1).position, Vec3::zeros());
    }

    #[test]
    fn test_layer_filter_skips_pair() {
        let mut backend = backend();
        add_box(
            &mut backend,
            1,
            Vec3::zeros(),
            RigidBody::dynamic(1.0)
                .with_gravity(false, 1.0)
                .with_layers(CollisionLayers::DEBRIS, CollisionLayers::STATIC),
        );
        add_box(
            &mut backend,
            2,
            Vec3::new(0.5, 0.0, 0.0),
            RigidBody::dynamic(1.0)
                .with_gravity(false, 1.0)
                .with_layers(CollisionLayers::DEBRIS, CollisionLayers::STATIC),
        );
        backend.step_simulation(1.0 / 60.0);
        assert!(backend.collision_events().is_empty());
    }

    #[test]
    fn test_raycast_respects_mask_and_order() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 0.0, 5.0), RigidBody::fixed());
        add_box(
            &mut backend,
            2,
            Vec3::new(0.0, 0.0, 10.0),
            RigidBody::fixed().with_layers(CollisionLayers::DEBRIS, CollisionLayers::ALL),
        );
        let ray = Ray::new(Vec3::zeros(), Vec3::z(), 100.0);
        let hits = backend.raycast_all(&ray);
        assert_eq!(hits.iter().map(|h| h.entity).collect::<Vec<_>>(), vec![1, 2]);
        assert_relative_eq!(hits[0].distance, 4.5, epsilon = 1e-5);
        assert_relative_eq!(hits[0].normal, -Vec3::z(), epsilon = 1e-5);

        let debris_only = ray.with_layer_mask(CollisionLayers::DEBRIS);
        assert_eq!(backend.raycast(&debris_only).map(|h| h.entity), Some(2));

        let short = Ray::new(Vec3::zeros(), Vec3::z(), 2.0);
        assert!(backend.raycast(&short).is_none());
    }

    #[test]
    fn test_impulse_at_point_spins_body() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::dynamic(1.0).with_gravity(false, 1.0));
        backend.apply_impulse(1, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.5, 0.0, 0.0));
        let result = backend.sync_body_from_backend(1);
        assert_relative_eq!(result.linear_velocity.y, 1.0);
        assert!(result.angular_velocity.z > 0.0);

        backend.apply_impulse(1, Vec3::zeros(), Vec3::zeros());
        assert_relative_eq!(backend.sync_body_from_backend(1).linear_velocity.y, 1.0);
    }

    #[test]
    fn test_force_is_consumed_by_step() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::dynamic(2.0).with_gravity(false, 1.0));
        backend.apply_force(1, Vec3::new(2.0, 0.0, 0.0), Vec3::zeros());
        backend.step_simulation(0.5);
        let after_first = backend.sync_body_from_backend(1).linear_velocity.x;
        assert_relative_eq!(after_first, 0.5, epsilon = 1e-5);
        backend.step_simulation(0.5);
        assert_relative_eq!(backend.sync_body_from_backend(1).linear_velocity.x, after_first);
    }

    #[test]
    fn test_distance_joint_keeps_length() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 5.0, 0.0), RigidBody::fixed());
        add_box(&mut backend, 2, Vec3::new(2.0, 5.0, 0.0), RigidBody::dynamic(1.0));
        assert!(backend.add_constraint(1, 2, &ConstraintConfig::new(ConstraintType::Distance)));
        assert!(!backend.add_constraint(2, 1, &ConstraintConfig::new(ConstraintType::Distance)));
        for _ in 0..120 {
            backend.step_simulation(1.0 / 60.0);
        }
        let p = backend.sync_body_from_backend(2).position;
        assert_relative_eq!((p - Vec3::new(0.0, 5.0, 0.0)).magnitude(), 2.0, epsilon = 0.05);
        assert!(backend.remove_constraint(2, 1));
        assert!(!backend.remove_constraint(1, 2));
    }

    #[test]
    fn test_point_joint_closes_initial_gap() {
        let mut backend = backend();
        backend.set_gravity(Vec3::zeros());
        add_box(&mut backend, 1, Vec3::new(0.1, 0.0, 0.0), RigidBody::dynamic(1.0));
        let pin = ConstraintConfig::new(ConstraintType::PointToPoint).with_anchors(Vec3::zeros(), Vec3::zeros());
        assert!(backend.add_constraint(1, INVALID_ENTITY, &pin));

        let mut last_error = 0.1;
        for _ in 0..10 {
            backend.step_simulation(1.0 / 60.0);
            let error = backend.sync_body_from_backend(1).position.magnitude();
            assert!(error < last_error, "gap grew from {} to {}", last_error, error);
            last_error = error;
        }
        for _ in 0..50 {
            backend.step_simulation(1.0 / 60.0);
        }
        assert!(backend.sync_body_from_backend(1).position.magnitude() < 1e-3);
    }

    #[test]
    fn test_unsimulated_constraint_is_accepted() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::fixed());
        add_box(&mut backend, 2, Vec3::new(2.0, 0.0, 0.0), RigidBody::dynamic(1.0));
        assert!(backend.add_constraint(1, 2, &ConstraintConfig::new(ConstraintType::Hinge)));
        assert!(!backend.add_constraint(1, 99, &ConstraintConfig::default()));
    }

    #[test]
    fn test_resting_body_falls_asleep() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 1.0, 0.0), RigidBody::dynamic(1.0).with_gravity(false, 1.0));
        for _ in 0..60 {
            backend.step_simulation(1.0 / 60.0);
        }
        assert!(backend.is_sleeping(1));
        backend.apply_impulse(1, Vec3::x(), Vec3::zeros());
        assert!(!backend.is_sleeping(1));
    }

    #[test]
    fn test_sleeping_pair_reports_nothing_until_woken() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 1.0, 0.0), RigidBody::dynamic(1.0).with_gravity(false, 1.0));
        for _ in 0..60 {
            backend.step_simulation(1.0 / 60.0);
        }
        assert!(backend.is_sleeping(1));

        add_box(&mut backend, 2, Vec3::new(0.0, 0.2, 0.0), RigidBody::fixed());
        backend.step_simulation(1.0 / 60.0);
        assert!(backend.collision_events().is_empty());
        assert!(backend.is_sleeping(1));

        backend.apply_impulse(1, Vec3::new(0.1, 0.0, 0.0), Vec3::zeros());
        backend.step_simulation(1.0 / 60.0);
        assert!(backend.collision_events().iter().any(|e| e.involves(1) && e.involves(2)));
    }

    #[test]
    fn test_debug_draw_outlines_bodies_and_characters() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::fixed());
        backend.add_character(2, Vec3::new(0.0, 3.0, 0.0), &CharacterControllerConfig::default());
        let mut buffer = DebugDrawBuffer::new();
        backend.debug_draw(&mut buffer);
        // One wire box plus two wire spheres
        assert_eq!(buffer.line_count(), 12 + 2 * 48);
    }

    #[test]
    fn test_shutdown_clears_everything() {
        let mut backend = backend();
        add_box(&mut backend, 3, Vec3::zeros(), RigidBody::fixed());
        add_box(&mut backend, 1, Vec3::new(0.0, 2.0, 0.0), RigidBody::dynamic(1.0));
        backend.add_character(5, Vec3::zeros(), &CharacterControllerConfig::default());
        backend.shutdown();
        backend.shutdown();
        assert!(!backend.is_initialized());
        assert_eq!(backend.body_count(), 0);
        assert!(!backend.has_character(5));
    }
}
