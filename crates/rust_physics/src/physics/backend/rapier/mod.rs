//! rapier3d backend
//!
//! Owns a complete rapier world: body and collider sets, the pipelines and
//! every shape bundle created for the host's bodies. Each host entity maps to
//! one rapier body with one collider; both carry the entity id in
//! `user_data`.

pub mod debug;
pub mod joints;
pub mod shape;

use std::collections::BTreeMap;

use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet, RigidBodyBuilder,
    RigidBodyHandle, RigidBodySet, RigidBodyType,
};
use rapier3d::geometry::{
    BroadPhase, Collider, ColliderBuilder, ColliderHandle, ColliderSet, Group, InteractionGroups, NarrowPhase,
    Ray as NativeRay, SharedShape,
};
use rapier3d::math::{Isometry, Point};
use rapier3d::pipeline::{DebugRenderPipeline, PhysicsPipeline, QueryFilter, QueryPipeline};

use crate::foundation::math::{utils, Iso3, Vec3};
use crate::physics::backend::shape_builder::{build_shape, ShapeBundle};
use crate::physics::backend::{BackendCapabilities, PhysicsBackend};
use crate::physics::collision_layers::CollisionLayers;
use crate::physics::debug_render::PhysicsDebugRenderer;
use crate::physics::error::PhysicsError;
use crate::physics::types::{
    CharacterControllerConfig, ColliderConfig, CollisionInfo, ConstraintConfig, ContactPoint, EntityId,
    MotionType, PhysicsConfig, PhysicsSyncResult, PhysicsTransform, Ray, RaycastResult, RigidBody,
    INVALID_ENTITY,
};

use debug::DebugLineForwarder;
use joints::JointRecord;
use shape::RapierShapeFactory;

const CHARACTER_COLOR: Vec3 = Vec3::new(0.2, 1.0, 1.0);

/// Native state, present while initialized
struct RapierWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    /// Fixed body at the origin used for world-pinned joints
    world_anchor: RigidBodyHandle,
}

impl RapierWorld {
    fn new(config: &PhysicsConfig) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: config.fixed_timestep,
            max_velocity_iterations: config.solver_iterations.max(1) as usize,
            max_ccd_substeps: config.collision_steps.max(1) as usize,
            ..Default::default()
        };
        let mut bodies = RigidBodySet::new();
        let world_anchor = bodies.insert(RigidBodyBuilder::fixed().user_data(INVALID_ENTITY as u128));
        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies,
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            world_anchor,
        }
    }

    fn remove_native_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn entity_of(&self, collider: ColliderHandle) -> Option<EntityId> {
        self.colliders.get(collider).map(|c| c.user_data as EntityId)
    }

    fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.bodies, &self.colliders);
    }
}

/// A host body inside the rapier world
struct BodyRecord {
    handle: RigidBodyHandle,
    collider: ColliderHandle,
    /// Keeps the shape and its children alive as long as the body
    shape: ShapeBundle<SharedShape>,
}

struct CharacterRecord {
    config: CharacterControllerConfig,
    controller: KinematicCharacterController,
    shape: SharedShape,
    position: Vec3,
    grounded: bool,
}

impl CharacterRecord {
    fn new(config: &CharacterControllerConfig, position: Vec3) -> Self {
        let controller = KinematicCharacterController {
            offset: CharacterLength::Absolute(config.skin_width),
            autostep: Some(CharacterAutostep {
                max_height: CharacterLength::Absolute(config.step_height),
                min_width: CharacterLength::Absolute(config.radius),
                include_dynamic_bodies: false,
            }),
            max_slope_climb_angle: utils::deg_to_rad(config.max_slope_angle),
            min_slope_slide_angle: utils::deg_to_rad(config.max_slope_angle),
            snap_to_ground: Some(CharacterLength::Absolute(config.step_height)),
            ..Default::default()
        };
        Self {
            config: config.clone(),
            controller,
            shape: SharedShape::capsule_y(config.half_segment(), config.radius),
            position,
            grounded: false,
        }
    }
}

fn body_type(motion: MotionType) -> RigidBodyType {
    match motion {
        MotionType::Static => RigidBodyType::Fixed,
        MotionType::Kinematic => RigidBodyType::KinematicVelocityBased,
        MotionType::Dynamic => RigidBodyType::Dynamic,
    }
}

fn interaction_groups(layer: u32, mask: u32) -> InteractionGroups {
    InteractionGroups::new(Group::from_bits_truncate(layer), Group::from_bits_truncate(mask))
}

fn invalid_body(entity: EntityId, err: PhysicsError) -> PhysicsError {
    log::error!("[Rapier] {}", err);
    match err {
        PhysicsError::InvalidBody { .. } => err,
        other => PhysicsError::InvalidBody {
            entity,
            reason: other.to_string(),
        },
    }
}

/// rapier3d adapter
pub struct RapierBackend {
    world: Option<RapierWorld>,
    bodies: BTreeMap<EntityId, BodyRecord>,
    joints: BTreeMap<(EntityId, EntityId), JointRecord>,
    characters: BTreeMap<EntityId, CharacterRecord>,
    events: Vec<CollisionInfo>,
    debug_pipeline: DebugRenderPipeline,
    config: PhysicsConfig,
    gravity: Vec3,
}

impl RapierBackend {
    /// Create an uninitialized backend
    pub fn new() -> Self {
        Self {
            world: None,
            bodies: BTreeMap::new(),
            joints: BTreeMap::new(),
            characters: BTreeMap::new(),
            events: Vec::new(),
            debug_pipeline: DebugRenderPipeline::default(),
            config: PhysicsConfig::default(),
            gravity: Vec3::zeros(),
        }
    }

    fn find_joint_key(&self, a: EntityId, b: EntityId) -> Option<(EntityId, EntityId)> {
        [(a, b), (b, a)].into_iter().find(|key| self.joints.contains_key(key))
    }

    fn collect_events(&mut self) {
        self.events.clear();
        let Some(world) = self.world.as_ref() else {
            return;
        };

        for pair in world.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let (Some(entity_a), Some(entity_b)) = (world.entity_of(pair.collider1), world.entity_of(pair.collider2))
            else {
                continue;
            };
            for manifold in &pair.manifolds {
                if manifold.data.solver_contacts.is_empty() {
                    continue;
                }
                let normal = manifold.data.normal;
                let contacts: Vec<ContactPoint> = manifold
                    .data
                    .solver_contacts
                    .iter()
                    .map(|c| ContactPoint {
                        position: c.point.coords,
                        normal,
                        penetration_depth: -c.dist,
                    })
                    .collect();

                let velocity_at = |body: Option<RigidBodyHandle>, point: &Point<f32>| {
                    body.and_then(|h| world.bodies.get(h))
                        .map_or_else(Vec3::zeros, |rb| rb.velocity_at_point(point))
                };
                let count = manifold.data.solver_contacts.len() as f32;
                let separation_velocity = manifold
                    .data
                    .solver_contacts
                    .iter()
                    .map(|c| {
                        (velocity_at(manifold.data.rigid_body2, &c.point)
                            - velocity_at(manifold.data.rigid_body1, &c.point))
                        .dot(&normal)
                    })
                    .sum::<f32>()
                    / count;

                self.events.push(CollisionInfo {
                    entity_a,
                    entity_b,
                    contacts,
                    impulse: manifold.points.iter().map(|p| p.data.impulse).sum(),
                    separation_velocity,
                    is_trigger: false,
                });
            }
        }

        for (c1, c2, intersecting) in world.narrow_phase.intersection_pairs() {
            if !intersecting {
                continue;
            }
            if let (Some(entity_a), Some(entity_b)) = (world.entity_of(c1), world.entity_of(c2)) {
                self.events.push(CollisionInfo {
                    entity_a,
                    entity_b,
                    is_trigger: true,
                    ..Default::default()
                });
            }
        }
    }

    fn break_joints(&mut self, dt: f32) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        let broken: Vec<(EntityId, EntityId)> = self
            .joints
            .iter()
            .filter(|(_, record)| {
                world
                    .impulse_joints
                    .get(record.handle)
                    .is_some_and(|joint| record.is_broken(joint, dt))
            })
            .map(|(key, _)| *key)
            .collect();
        for key in broken {
            if let Some(record) = self.joints.remove(&key) {
                world.impulse_joints.remove(record.handle, true);
                log::info!("[Rapier] Constraint between {} and {} broke", key.0, key.1);
            }
        }
    }

    fn query_filter_predicate(mask: u32) -> impl Fn(ColliderHandle, &Collider) -> bool {
        move |_, collider: &Collider| CollisionLayers::query_accepts(mask, collider.collision_groups().memberships.bits())
    }

    fn to_result(world: &RapierWorld, ray: &Ray, native: &NativeRay, handle: ColliderHandle, toi: f32, normal: Vec3) -> Option<RaycastResult> {
        Some(RaycastResult {
            entity: world.entity_of(handle)?,
            point: native.point_at(toi).coords,
            normal,
            distance: toi * ray.max_distance,
        })
    }
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RapierBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PhysicsBackend for RapierBackend {
    fn initialize(&mut self, config: &PhysicsConfig) -> Result<(), PhysicsError> {
        if self.world.is_some() {
            log::warn!("[Rapier] initialize called twice, keeping the existing world");
            return Ok(());
        }
        config.validate()?;
        self.world = Some(RapierWorld::new(config));
        self.config = config.clone();
        self.gravity = config.gravity;
        log::info!(
            "[Rapier] World created (gravity {:?}, dt {:.4}s, {} solver iterations)",
            self.gravity,
            config.fixed_timestep,
            config.solver_iterations
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        let Some(mut world) = self.world.take() else {
            return;
        };
        self.characters.clear();
        for (_, record) in std::mem::take(&mut self.joints) {
            world.impulse_joints.remove(record.handle, false);
        }
        while let Some((entity, record)) = self.bodies.pop_first() {
            world.remove_native_body(record.handle);
            log::trace!("[Rapier] Released body for entity {}", entity);
        }
        self.events.clear();
        log::info!("[Rapier] World shut down");
    }

    fn is_initialized(&self) -> bool {
        self.world.is_some()
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }

    fn step_simulation(&mut self, delta_time: f32) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        if delta_time <= 0.0 {
            return;
        }
        world.integration_parameters.dt = delta_time;
        world.pipeline.step(
            &self.gravity,
            &world.integration_parameters,
            &mut world.islands,
            &mut world.broad_phase,
            &mut world.narrow_phase,
            &mut world.bodies,
            &mut world.colliders,
            &mut world.impulse_joints,
            &mut world.multibody_joints,
            &mut world.ccd_solver,
            Some(&mut world.query_pipeline),
            &(),
            &(),
        );
        for record in self.bodies.values() {
            if let Some(rb) = world.bodies.get_mut(record.handle) {
                rb.reset_forces(false);
                rb.reset_torques(false);
            }
        }
        self.collect_events();
        self.break_joints(delta_time);
    }

    fn sync_body_to_backend(
        &mut self,
        entity: EntityId,
        transform: &PhysicsTransform,
        body: &RigidBody,
        collider: &ColliderConfig,
    ) -> Result<(), PhysicsError> {
        let Some(world) = self.world.as_mut() else {
            return Err(PhysicsError::NotInitialized);
        };
        body.validate(entity).map_err(|e| invalid_body(entity, e))?;
        if !utils::is_finite_vec3(&transform.position) || !utils::is_finite_vec3(&collider.offset) {
            return Err(invalid_body(
                entity,
                PhysicsError::InvalidBody {
                    entity,
                    reason: "non-finite position or collider offset".into(),
                },
            ));
        }

        let bundle = build_shape(&mut RapierShapeFactory, &collider.shape);
        let pose: Iso3 = transform.to_isometry();
        let local: Iso3 = utils::isometry(&collider.offset, &collider.rotation);
        let groups = interaction_groups(body.collision_layer, body.collision_mask);
        let can_sleep = self.config.enable_sleeping && body.allow_sleep && body.is_dynamic();
        // Negative thresholds keep a body awake
        let sleep_threshold = if can_sleep { self.config.sleep_threshold } else { -1.0 };
        let (linear, angular) = match body.motion_type {
            MotionType::Static => (Vec3::zeros(), Vec3::zeros()),
            _ => (body.linear_velocity, body.angular_velocity),
        };

        match self.bodies.get_mut(&entity) {
            Some(record) => {
                if let Some(rb) = world.bodies.get_mut(record.handle) {
                    let was_dynamic = rb.is_dynamic();
                    rb.set_body_type(body_type(body.motion_type), true);
                    rb.set_position(pose, true);
                    rb.set_linear_damping(body.linear_damping);
                    rb.set_angular_damping(body.angular_damping);
                    rb.set_gravity_scale(body.gravity_factor(), true);
                    rb.enable_ccd(body.enable_ccd);
                    rb.activation_mut().linear_threshold = sleep_threshold;
                    rb.activation_mut().angular_threshold = sleep_threshold;
                    if !body.is_dynamic() || !was_dynamic {
                        rb.set_linvel(linear, true);
                        rb.set_angvel(angular, true);
                    }
                    rb.wake_up(true);
                }
                if let Some(co) = world.colliders.get_mut(record.collider) {
                    co.set_shape(bundle.shape.clone());
                    co.set_position_wrt_parent(local);
                    co.set_position(pose * local);
                    co.set_friction(collider.effective_friction(body));
                    co.set_restitution(collider.effective_restitution(body));
                    co.set_sensor(collider.is_trigger);
                    co.set_collision_groups(groups);
                    if body.is_dynamic() {
                        co.set_mass(body.mass);
                    } else {
                        co.set_density(0.0);
                    }
                }
                // The previous bundle is released only after the collider holds the new shape
                record.shape = bundle;
                log::debug!("[Rapier] Updated body for entity {}", entity);
            }
            None => {
                let mut rb = RigidBodyBuilder::new(body_type(body.motion_type))
                    .position(pose)
                    .linvel(linear)
                    .angvel(angular)
                    .linear_damping(body.linear_damping)
                    .angular_damping(body.angular_damping)
                    .gravity_scale(body.gravity_factor())
                    .ccd_enabled(body.enable_ccd)
                    .can_sleep(can_sleep)
                    .user_data(entity as u128)
                    .build();
                rb.activation_mut().linear_threshold = sleep_threshold;
                rb.activation_mut().angular_threshold = sleep_threshold;
                let handle = world.bodies.insert(rb);

                let builder = ColliderBuilder::new(bundle.shape.clone())
                    .position(local)
                    .friction(collider.effective_friction(body))
                    .restitution(collider.effective_restitution(body))
                    .sensor(collider.is_trigger)
                    .collision_groups(groups)
                    .user_data(entity as u128);
                let builder = if body.is_dynamic() {
                    builder.mass(body.mass)
                } else {
                    builder.density(0.0)
                };
                let collider_handle = world.colliders.insert_with_parent(builder, handle, &mut world.bodies);

                self.bodies.insert(
                    entity,
                    BodyRecord {
                        handle,
                        collider: collider_handle,
                        shape: bundle,
                    },
                );
                log::debug!(
                    "[Rapier] Created {:?} body with {} for entity {}",
                    body.motion_type,
                    collider.shape.type_name(),
                    entity
                );
            }
        }
        world.refresh_queries();
        Ok(())
    }

    fn sync_body_from_backend(&self, entity: EntityId) -> PhysicsSyncResult {
        let rb = self
            .world
            .as_ref()
            .zip(self.bodies.get(&entity))
            .and_then(|(world, record)| world.bodies.get(record.handle));
        match rb {
            Some(rb) => PhysicsSyncResult {
                position: *rb.translation(),
                rotation: *rb.rotation(),
                linear_velocity: *rb.linvel(),
                angular_velocity: *rb.angvel(),
            },
            None => PhysicsSyncResult::default(),
        }
    }

    fn remove_body(&mut self, entity: EntityId) {
        let Some(record) = self.bodies.remove(&entity) else {
            return;
        };
        // Native joints go away with the body
        self.joints.retain(|&(a, b), _| a != entity && b != entity);
        if let Some(world) = self.world.as_mut() {
            world.remove_native_body(record.handle);
            world.refresh_queries();
        }
        log::debug!("[Rapier] Removed body for entity {}", entity);
    }

    fn has_body(&self, entity: EntityId) -> bool {
        self.bodies.contains_key(&entity)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn set_velocity(&mut self, entity: EntityId, linear: Vec3, angular: Vec3) -> bool {
        let (Some(world), Some(record)) = (self.world.as_mut(), self.bodies.get(&entity)) else {
            return false;
        };
        if let Some(rb) = world.bodies.get_mut(record.handle) {
            if !rb.is_fixed() {
                rb.set_linvel(linear, true);
                rb.set_angvel(angular, true);
            }
        }
        true
    }

    fn apply_force(&mut self, entity: EntityId, force: Vec3, torque: Vec3) {
        let (Some(world), Some(record)) = (self.world.as_mut(), self.bodies.get(&entity)) else {
            return;
        };
        let Some(rb) = world.bodies.get_mut(record.handle) else {
            return;
        };
        if !rb.is_dynamic() {
            return;
        }
        if force != Vec3::zeros() {
            rb.add_force(force, true);
        }
        if torque != Vec3::zeros() {
            rb.add_torque(torque, true);
        }
    }

    fn apply_impulse(&mut self, entity: EntityId, impulse: Vec3, point: Vec3) {
        let (Some(world), Some(record)) = (self.world.as_mut(), self.bodies.get(&entity)) else {
            return;
        };
        let Some(rb) = world.bodies.get_mut(record.handle) else {
            return;
        };
        if !rb.is_dynamic() || impulse == Vec3::zeros() {
            return;
        }
        if point == Vec3::zeros() {
            rb.apply_impulse(impulse, true);
        } else {
            rb.apply_impulse_at_point(impulse, Point::from(point), true);
        }
    }

    fn is_sleeping(&self, entity: EntityId) -> bool {
        self.world
            .as_ref()
            .zip(self.bodies.get(&entity))
            .and_then(|(world, record)| world.bodies.get(record.handle))
            .is_some_and(|rb| rb.is_sleeping())
    }

    fn collision_events(&self) -> &[CollisionInfo] {
        &self.events
    }

    fn raycast(&self, ray: &Ray) -> Option<RaycastResult> {
        let world = self.world.as_ref()?;
        if ray.is_degenerate() || ray.max_distance <= 0.0 {
            return None;
        }
        let native = NativeRay::new(Point::from(ray.origin), ray.direction * ray.max_distance);
        let predicate = Self::query_filter_predicate(ray.layer_mask);
        let filter = QueryFilter::new().exclude_sensors().predicate(&predicate);
        let (handle, hit) =
            world
                .query_pipeline
                .cast_ray_and_get_normal(&world.bodies, &world.colliders, &native, 1.0, true, filter)?;
        Self::to_result(world, ray, &native, handle, hit.toi, hit.normal)
    }

    fn raycast_all(&self, ray: &Ray) -> Vec<RaycastResult> {
        let Some(world) = self.world.as_ref() else {
            return Vec::new();
        };
        if ray.is_degenerate() || ray.max_distance <= 0.0 {
            return Vec::new();
        }
        let native = NativeRay::new(Point::from(ray.origin), ray.direction * ray.max_distance);
        let predicate = Self::query_filter_predicate(ray.layer_mask);
        let filter = QueryFilter::new().exclude_sensors().predicate(&predicate);
        let mut hits = Vec::new();
        world.query_pipeline.intersections_with_ray(
            &world.bodies,
            &world.colliders,
            &native,
            1.0,
            true,
            filter,
            |handle, hit| {
                hits.extend(Self::to_result(world, ray, &native, handle, hit.toi, hit.normal));
                true
            },
        );
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn add_constraint(&mut self, a: EntityId, b: EntityId, config: &ConstraintConfig) -> bool {
        if a == b {
            return false;
        }
        if self.find_joint_key(a, b).is_some() {
            log::warn!("[Rapier] Constraint between {} and {} already exists", a, b);
            return false;
        }
        let Some(world) = self.world.as_mut() else {
            return false;
        };
        let Some(handle_a) = self.bodies.get(&a).map(|r| r.handle) else {
            log::warn!("[Rapier] Cannot link {} and {}: missing body", a, b);
            return false;
        };
        let handle_b = if b == INVALID_ENTITY {
            world.world_anchor
        } else {
            match self.bodies.get(&b) {
                Some(record) => record.handle,
                None => {
                    log::warn!("[Rapier] Cannot link {} and {}: missing body", a, b);
                    return false;
                }
            }
        };

        let pose_of = |handle: RigidBodyHandle| -> Isometry<f32> {
            world.bodies.get(handle).map_or_else(Isometry::identity, |rb| *rb.position())
        };
        let anchor_a = Point::from(config.anchor_a);
        let anchor_b = Point::from(config.anchor_b);
        let rest_length = (pose_of(handle_b) * anchor_b - pose_of(handle_a) * anchor_a).magnitude();

        let joint = joints::build_joint(config, anchor_a, anchor_b, rest_length);
        let handle = world.impulse_joints.insert(handle_a, handle_b, joint, true);
        self.joints.insert(
            (a, b),
            JointRecord {
                handle,
                break_force: config.break_force,
            },
        );
        log::debug!("[Rapier] Added {:?} constraint between {} and {}", config.constraint_type, a, b);
        true
    }

    fn remove_constraint(&mut self, a: EntityId, b: EntityId) -> bool {
        let Some(key) = self.find_joint_key(a, b) else {
            return false;
        };
        let Some(record) = self.joints.remove(&key) else {
            return false;
        };
        if let Some(world) = self.world.as_mut() {
            world.impulse_joints.remove(record.handle, true);
        }
        true
    }

    fn add_character(&mut self, entity: EntityId, position: Vec3, config: &CharacterControllerConfig) -> bool {
        if self.world.is_none() || self.characters.contains_key(&entity) {
            return false;
        }
        self.characters.insert(entity, CharacterRecord::new(config, position));
        log::debug!("[Rapier] Created character for entity {}", entity);
        true
    }

    fn move_character(&mut self, entity: EntityId, displacement: Vec3, delta_time: f32) -> Vec3 {
        let (Some(world), Some(character)) = (self.world.as_ref(), self.characters.get_mut(&entity)) else {
            return Vec3::zeros();
        };
        let groups = interaction_groups(character.config.collision_layer, character.config.collision_mask);
        let filter = QueryFilter::new().exclude_sensors().groups(groups);
        let pose = Isometry::translation(character.position.x, character.position.y, character.position.z);
        let movement = character.controller.move_shape(
            delta_time,
            &world.bodies,
            &world.colliders,
            &world.query_pipeline,
            &*character.shape,
            &pose,
            displacement,
            filter,
            |_| {},
        );
        character.position += movement.translation;
        character.grounded = movement.grounded;
        character.position
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
        let Some(world) = self.world.as_ref() else {
            return;
        };
        self.debug_pipeline.render(
            &mut DebugLineForwarder::new(renderer),
            &world.bodies,
            &world.colliders,
            &world.impulse_joints,
            &world.multibody_joints,
            &world.narrow_phase,
        );
        for character in self.characters.values() {
            let half = character.config.half_segment();
            for end in [-half, half] {
                renderer.draw_wire_sphere(character.position + Vec3::y() * end, character.config.radius, CHARACTER_COLOR);
            }
        }
    }

    fn engine_name(&self) -> &'static str {
        "Rapier"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::debug_render::DebugDrawBuffer;
    use crate::physics::types::{ConstraintType, ShapeConfig};
    use approx::assert_relative_eq;

    fn backend() -> RapierBackend {
        let mut backend = RapierBackend::new();
        backend.initialize(&PhysicsConfig::default()).unwrap();
        backend
    }

    fn add_box(backend: &mut RapierBackend, entity: EntityId, position: Vec3, body: RigidBody) {
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
    fn test_body_round_trip() {
        let mut backend = backend();
        let rotation = utils::euler_to_quat(&Vec3::new(0.1, 0.2, 0.3));
        backend
            .sync_body_to_backend(
                7,
                &PhysicsTransform::new(Vec3::new(1.0, 2.0, 3.0), rotation),
                &RigidBody::fixed(),
                &ColliderConfig::default(),
            )
            .unwrap();
        let result = backend.sync_body_from_backend(7);
        assert_relative_eq!(result.position, Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-5);
        assert_relative_eq!(result.rotation, rotation, epsilon = 1e-5);
    }

    #[test]
    fn test_entity_stored_in_user_data() {
        let mut backend = backend();
        add_box(&mut backend, 42, Vec3::zeros(), RigidBody::fixed());
        let world = backend.world.as_ref().unwrap();
        let record = &backend.bodies[&42];
        assert_eq!(world.bodies[record.handle].user_data, 42);
        assert_eq!(world.entity_of(record.collider), Some(42));
    }

    #[test]
    fn test_update_swaps_shape_in_place() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::fixed());
        let handle = backend.bodies[&1].handle;
        backend
            .sync_body_to_backend(
                1,
                &PhysicsTransform::default(),
                &RigidBody::fixed(),
                &ColliderConfig::new(ShapeConfig::sphere(2.0)),
            )
            .unwrap();
        let record = &backend.bodies[&1];
        assert_eq!(record.handle, handle);
        let world = backend.world.as_ref().unwrap();
        assert!(world.colliders[record.collider].shape().as_ball().is_some());
        assert_eq!(backend.body_count(), 1);
    }

    #[test]
    fn test_raycast_distance_is_scaled() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 0.0, 5.0), RigidBody::fixed());
        let hit = backend.raycast(&Ray::new(Vec3::zeros(), Vec3::z(), 100.0)).unwrap();
        assert_eq!(hit.entity, 1);
        assert_relative_eq!(hit.distance, 4.5, epsilon = 1e-4);
        assert_relative_eq!(hit.point, Vec3::new(0.0, 0.0, 4.5), epsilon = 1e-4);
        assert_relative_eq!(hit.normal, -Vec3::z(), epsilon = 1e-4);
    }

    #[test]
    fn test_raycast_ignores_other_layers_and_triggers() {
        let mut backend = backend();
        add_box(
            &mut backend,
            1,
            Vec3::new(0.0, 0.0, 3.0),
            RigidBody::fixed().with_layers(CollisionLayers::DEBRIS, CollisionLayers::ALL),
        );
        backend
            .sync_body_to_backend(
                2,
                &PhysicsTransform::from_position(Vec3::new(0.0, 0.0, 6.0)),
                &RigidBody::fixed(),
                &ColliderConfig::new(ShapeConfig::sphere(0.5)).as_trigger(),
            )
            .unwrap();
        add_box(&mut backend, 3, Vec3::new(0.0, 0.0, 9.0), RigidBody::fixed());

        let ray = Ray::new(Vec3::zeros(), Vec3::z(), 100.0).with_layer_mask(CollisionLayers::DEFAULT);
        let hits = backend.raycast_all(&ray);
        assert_eq!(hits.iter().map(|h| h.entity).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_world_pinned_joint() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 5.0, 0.0), RigidBody::dynamic(1.0));
        let config = ConstraintConfig::new(ConstraintType::PointToPoint).with_anchors(Vec3::zeros(), Vec3::new(0.0, 5.0, 0.0));
        assert!(backend.add_constraint(1, INVALID_ENTITY, &config));
        for _ in 0..60 {
            backend.step_simulation(1.0 / 60.0);
        }
        assert_relative_eq!(backend.sync_body_from_backend(1).position, Vec3::new(0.0, 5.0, 0.0), epsilon = 0.05);
        assert!(backend.remove_constraint(1, INVALID_ENTITY));
    }

    #[test]
    fn test_hinge_pendulum_stops_at_limit() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(1.0, 5.0, 0.0), RigidBody::dynamic(1.0));
        let config = ConstraintConfig::new(ConstraintType::Hinge)
            .with_axis(Vec3::z())
            .with_anchors(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, 5.0, 0.0))
            .with_limits(-0.3, 0.3);
        assert!(backend.add_constraint(1, INVALID_ENTITY, &config));
        for _ in 0..120 {
            backend.step_simulation(1.0 / 60.0);
        }
        let result = backend.sync_body_from_backend(1);
        let swing = utils::quat_to_euler(&result.rotation).z;
        assert!(swing < -0.15 && swing > -0.4, "swing {swing}");
        assert_relative_eq!((result.position - Vec3::new(0.0, 5.0, 0.0)).magnitude(), 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_break_force_removes_joint() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::new(0.0, 5.0, 0.0), RigidBody::dynamic(10.0));
        let config = ConstraintConfig::new(ConstraintType::Fixed)
            .with_anchors(Vec3::zeros(), Vec3::new(0.0, 5.0, 0.0))
            .with_break_force(1.0);
        assert!(backend.add_constraint(1, INVALID_ENTITY, &config));
        for _ in 0..5 {
            backend.step_simulation(1.0 / 60.0);
        }
        assert!(!backend.remove_constraint(1, INVALID_ENTITY));
    }

    #[test]
    fn test_character_stands_on_floor() {
        let mut backend = backend();
        backend
            .sync_body_to_backend(
                1,
                &PhysicsTransform::default(),
                &RigidBody::fixed(),
                &ColliderConfig::new(ShapeConfig::cuboid(10.0, 0.5, 10.0)),
            )
            .unwrap();
        let config = CharacterControllerConfig::default();
        assert!(backend.add_character(2, Vec3::new(0.0, 2.0, 0.0), &config));
        assert!(!backend.add_character(2, Vec3::zeros(), &config));
        for _ in 0..120 {
            backend.move_character(2, Vec3::new(0.0, -0.1, 0.0), 1.0 / 60.0);
        }
        assert!(backend.is_character_grounded(2));
        let feet = backend.character_position(2).y - config.height * 0.5;
        assert!(feet > 0.45 && feet < 0.6, "feet at {feet}");
    }

    #[test]
    fn test_debug_draw_emits_lines() {
        let mut backend = backend();
        add_box(&mut backend, 1, Vec3::zeros(), RigidBody::fixed());
        let mut buffer = DebugDrawBuffer::new();
        backend.debug_draw(&mut buffer);
        assert!(buffer.line_count() > 0);
    }
}
