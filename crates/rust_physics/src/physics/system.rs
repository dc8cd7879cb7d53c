//! Physics system façade
//!
//! [`PhysicsSystem`] owns the active backend and drives it with a fixed
//! timestep. Real frame time is accumulated and consumed in whole steps; the
//! accumulator is clamped so a long frame can never queue more work than
//! `max_substeps` steps. The backend can be swapped at runtime, and a swap
//! whose new backend fails to initialize rolls back to the previous one.

use std::collections::BTreeMap;

use crate::foundation::math::{Quat, Vec3};
use super::backend::{create_backend, BackendCapabilities, PhysicsBackend, PhysicsEngineType};
use super::debug_render::PhysicsDebugRenderer;
use super::error::PhysicsError;
use super::types::{
    CharacterControllerConfig, ColliderConfig, CollisionInfo, ConstraintConfig, EntityId,
    PhysicsConfig, PhysicsSyncResult, PhysicsTransform, Ray, RaycastResult, RigidBody, ShapeConfig,
    INVALID_ENTITY,
};

/// What the façade remembers about a body it handed to the backend
#[derive(Debug, Clone)]
struct BodyEntry {
    transform: PhysicsTransform,
    body: RigidBody,
    /// `None` until `add_collider`; the backend only sees the body after that
    collider: Option<ColliderConfig>,
}

/// High-level physics interface with fixed-timestep stepping
pub struct PhysicsSystem {
    backend: Option<Box<dyn PhysicsBackend>>,
    engine_type: Option<PhysicsEngineType>,
    config: PhysicsConfig,
    accumulator: f32,
    bodies: BTreeMap<EntityId, BodyEntry>,
    frame_events: Vec<CollisionInfo>,
}

impl PhysicsSystem {
    /// Create a system running the given engine
    pub fn new(engine: PhysicsEngineType, config: PhysicsConfig) -> Result<Self, PhysicsError> {
        let backend = create_backend(engine)?;
        let mut system = Self::with_backend(backend, config)?;
        system.engine_type = Some(engine);
        Ok(system)
    }

    /// Create a system around a custom backend
    pub fn with_backend(
        mut backend: Box<dyn PhysicsBackend>,
        config: PhysicsConfig,
    ) -> Result<Self, PhysicsError> {
        config.validate()?;
        backend.initialize(&config)?;
        log::info!(
            "[PhysicsSystem] Initialized with {} backend (dt = {:.4}s, max substeps = {})",
            backend.engine_name(),
            config.fixed_timestep,
            config.max_substeps
        );

        Ok(Self {
            backend: Some(backend),
            engine_type: None,
            config,
            accumulator: 0.0,
            bodies: BTreeMap::new(),
            frame_events: Vec::new(),
        })
    }

    /// Advance the simulation by real frame time, returns the number of fixed steps taken
    pub fn update(&mut self, delta_time: f32) -> u32 {
        self.frame_events.clear();
        let Some(backend) = self.backend.as_mut() else {
            return 0;
        };
        if !delta_time.is_finite() || delta_time < 0.0 {
            log::warn!("[PhysicsSystem] Ignoring invalid frame time {delta_time}");
            return 0;
        }

        let fixed = self.config.fixed_timestep;
        self.accumulator += delta_time;

        let mut steps = 0;
        while self.accumulator >= fixed && steps < self.config.max_substeps {
            backend.step_simulation(fixed);
            self.frame_events.extend_from_slice(backend.collision_events());
            self.accumulator -= fixed;
            steps += 1;
        }

        let max_frame_time = self.config.max_frame_time();
        if self.accumulator > max_frame_time {
            log::debug!(
                "[PhysicsSystem] Dropping {:.4}s of simulation time after {} substeps",
                self.accumulator - max_frame_time,
                steps
            );
            self.accumulator = max_frame_time;
        }

        steps
    }

    /// Advance exactly one fixed step, ignoring the accumulator
    pub fn step_once(&mut self) {
        self.frame_events.clear();
        if let Some(backend) = self.backend.as_mut() {
            backend.step_simulation(self.config.fixed_timestep);
            self.frame_events.extend_from_slice(backend.collision_events());
        }
    }

    /// Switch to another engine, returns false and keeps the current one on failure
    pub fn set_engine(&mut self, engine: PhysicsEngineType, config: PhysicsConfig) -> bool {
        match create_backend(engine) {
            Ok(backend) => self.swap_backend(backend, Some(engine), config),
            Err(e) => {
                log::error!("[PhysicsSystem] Cannot switch to {engine}: {e}");
                false
            }
        }
    }

    /// Switch to a custom backend, returns false and keeps the current one on failure
    pub fn set_backend(&mut self, backend: Box<dyn PhysicsBackend>, config: PhysicsConfig) -> bool {
        self.swap_backend(backend, None, config)
    }

    fn swap_backend(
        &mut self,
        mut backend: Box<dyn PhysicsBackend>,
        engine_type: Option<PhysicsEngineType>,
        config: PhysicsConfig,
    ) -> bool {
        if let Err(e) = config.validate() {
            log::error!("[PhysicsSystem] Rejected config for {}: {e}", backend.engine_name());
            return false;
        }

        // Capture live poses so a rollback restores where bodies were, not where they started
        let snapshot: Vec<(EntityId, PhysicsSyncResult)> = self
            .bodies
            .iter()
            .filter(|(_, entry)| entry.collider.is_some())
            .map(|(&entity, _)| (entity, self.body_state(entity)))
            .collect();

        let previous = self.backend.take();
        let previous_name = previous.as_ref().map_or("None", |b| b.engine_name());
        let mut previous = previous.map(|mut old| {
            old.shutdown();
            old
        });

        match backend.initialize(&config) {
            Ok(()) => {
                log::info!(
                    "[PhysicsSystem] Switched engine {} -> {} ({} bodies discarded)",
                    previous_name,
                    backend.engine_name(),
                    self.bodies.len()
                );
                drop(previous);
                self.backend = Some(backend);
                self.engine_type = engine_type;
                self.config = config;
                self.accumulator = 0.0;
                self.bodies.clear();
                self.frame_events.clear();
                true
            }
            Err(e) => {
                log::error!(
                    "[PhysicsSystem] Failed to initialize {}: {e}, restoring {}",
                    backend.engine_name(),
                    previous_name
                );
                if let Some(old) = previous.as_mut() {
                    if let Err(e) = old.initialize(&self.config) {
                        log::error!("[PhysicsSystem] Failed to restore {previous_name}: {e}");
                    }
                }
                self.backend = previous;
                self.restore_bodies(&snapshot);
                false
            }
        }
    }

    fn restore_bodies(&mut self, snapshot: &[(EntityId, PhysicsSyncResult)]) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        for (entity, state) in snapshot {
            let Some(entry) = self.bodies.get_mut(entity) else {
                continue;
            };
            let Some(collider) = entry.collider.as_ref() else {
                continue;
            };
            entry.transform.position = state.position;
            entry.transform.rotation = state.rotation;
            match backend.sync_body_to_backend(*entity, &entry.transform, &entry.body, collider) {
                Ok(()) => {
                    backend.set_velocity(*entity, state.linear_velocity, state.angular_velocity);
                }
                Err(e) => log::error!("[PhysicsSystem] Could not restore entity {entity}: {e}"),
            }
        }
    }

    /// Shut the backend down and release it
    pub fn shutdown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            log::info!("[PhysicsSystem] Shutting down {} backend", backend.engine_name());
            backend.shutdown();
        }
        self.engine_type = None;
        self.bodies.clear();
        self.frame_events.clear();
        self.accumulator = 0.0;
    }

    // Bodies

    /// Register a rigid body, it enters the simulation once a collider is added
    pub fn add_rigid_body(&mut self, entity: EntityId, transform: PhysicsTransform, body: RigidBody) -> bool {
        if self.backend.is_none() {
            return false;
        }
        if entity == INVALID_ENTITY {
            log::warn!("[PhysicsSystem] Refusing rigid body for the invalid entity");
            return false;
        }
        if self.bodies.contains_key(&entity) {
            log::warn!("[PhysicsSystem] {}", PhysicsError::DuplicateBody(entity));
            return false;
        }
        if let Err(e) = body.validate(entity) {
            log::warn!("[PhysicsSystem] {e}");
            return false;
        }

        self.bodies.insert(
            entity,
            BodyEntry {
                transform,
                body,
                collider: None,
            },
        );
        true
    }

    /// Attach the collider to a registered body and create it in the backend
    pub fn add_collider(&mut self, entity: EntityId, collider: ColliderConfig) -> bool {
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        let Some(entry) = self.bodies.get_mut(&entity) else {
            log::warn!("[PhysicsSystem] add_collider: {}", PhysicsError::BodyNotFound(entity));
            return false;
        };
        if entry.collider.is_some() {
            log::warn!("[PhysicsSystem] Entity {entity} already has a collider");
            return false;
        }

        match backend.sync_body_to_backend(entity, &entry.transform, &entry.body, &collider) {
            Ok(()) => {
                entry.collider = Some(collider);
                true
            }
            Err(e) => {
                log::warn!(
                    "[PhysicsSystem] {} rejected {} collider for entity {entity}: {e}",
                    backend.engine_name(),
                    collider.shape.type_name()
                );
                false
            }
        }
    }

    /// Create or update a complete body in one call
    ///
    /// Used by the ECS bridge, which always knows all three parts. Unlike
    /// `add_rigid_body` an existing body is updated in place.
    pub fn sync_body_to_backend(
        &mut self,
        entity: EntityId,
        transform: PhysicsTransform,
        body: &RigidBody,
        collider: &ColliderConfig,
    ) -> Result<(), PhysicsError> {
        let backend = self.backend.as_mut().ok_or(PhysicsError::NotInitialized)?;
        if entity == INVALID_ENTITY {
            return Err(PhysicsError::InvalidBody {
                entity,
                reason: "invalid entity id".into(),
            });
        }
        body.validate(entity)?;
        backend.sync_body_to_backend(entity, &transform, body, collider)?;

        self.bodies.insert(
            entity,
            BodyEntry {
                transform,
                body: body.clone(),
                collider: Some(collider.clone()),
            },
        );
        Ok(())
    }

    /// Remove a body, a no-op when it does not exist
    pub fn remove_rigid_body(&mut self, entity: EntityId) {
        if self.bodies.remove(&entity).is_none() {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.remove_body(entity);
        }
    }

    /// Whether the entity has a registered body
    pub fn has_rigid_body(&self, entity: EntityId) -> bool {
        self.backend.is_some() && self.bodies.contains_key(&entity)
    }

    /// Number of registered bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Teleport a body
    pub fn set_body_transform(&mut self, entity: EntityId, transform: PhysicsTransform) -> bool {
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        let Some(entry) = self.bodies.get_mut(&entity) else {
            return false;
        };
        entry.transform = transform;
        match entry.collider.as_ref() {
            Some(collider) => match backend.sync_body_to_backend(entity, &entry.transform, &entry.body, collider) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("[PhysicsSystem] set_body_transform failed for entity {entity}: {e}");
                    false
                }
            },
            None => true,
        }
    }

    /// Current world transform of a body, identity for unknown entities
    pub fn body_transform(&self, entity: EntityId) -> PhysicsTransform {
        let Some(entry) = self.bodies.get(&entity) else {
            return PhysicsTransform::default();
        };
        if entry.collider.is_none() {
            return entry.transform;
        }
        let state = self.body_state(entity);
        PhysicsTransform::new(state.position, state.rotation).with_scale(entry.transform.scale)
    }

    /// Pose and velocities read back from the backend
    pub fn body_state(&self, entity: EntityId) -> PhysicsSyncResult {
        self.backend
            .as_ref()
            .map(|b| b.sync_body_from_backend(entity))
            .unwrap_or_default()
    }

    /// Linear velocity, zero for unknown entities
    pub fn linear_velocity(&self, entity: EntityId) -> Vec3 {
        self.body_state(entity).linear_velocity
    }

    /// Angular velocity, zero for unknown entities
    pub fn angular_velocity(&self, entity: EntityId) -> Vec3 {
        self.body_state(entity).angular_velocity
    }

    /// Overwrite the linear velocity, keeping the angular one
    pub fn set_linear_velocity(&mut self, entity: EntityId, velocity: Vec3) -> bool {
        let angular = self.angular_velocity(entity);
        self.backend
            .as_mut()
            .map_or(false, |b| b.set_velocity(entity, velocity, angular))
    }

    /// Overwrite the angular velocity, keeping the linear one
    pub fn set_angular_velocity(&mut self, entity: EntityId, velocity: Vec3) -> bool {
        let linear = self.linear_velocity(entity);
        self.backend
            .as_mut()
            .map_or(false, |b| b.set_velocity(entity, linear, velocity))
    }

    /// Continuous force and torque applied during the next step
    pub fn apply_force(&mut self, entity: EntityId, force: Vec3, torque: Vec3) {
        if let Some(backend) = self.backend.as_mut() {
            backend.apply_force(entity, force, torque);
        }
    }

    /// Instantaneous impulse at a world point, or at the centre of mass when `point` is zero
    pub fn apply_impulse(&mut self, entity: EntityId, impulse: Vec3, point: Vec3) {
        if let Some(backend) = self.backend.as_mut() {
            backend.apply_impulse(entity, impulse, point);
        }
    }

    /// Whether the body is asleep
    pub fn is_sleeping(&self, entity: EntityId) -> bool {
        self.backend.as_ref().map_or(false, |b| b.is_sleeping(entity))
    }

    // Convenience constructors

    /// Dynamic box with the given half extents
    pub fn create_dynamic_box(&mut self, entity: EntityId, position: Vec3, half_extents: Vec3, mass: f32) -> bool {
        self.create_body(
            entity,
            position,
            RigidBody::dynamic(mass),
            ShapeConfig::Box { half_extents },
        )
    }

    /// Static box with the given half extents
    pub fn create_static_box(&mut self, entity: EntityId, position: Vec3, half_extents: Vec3) -> bool {
        self.create_body(entity, position, RigidBody::fixed(), ShapeConfig::Box { half_extents })
    }

    /// Kinematic box moved by its velocity
    pub fn create_kinematic_box(&mut self, entity: EntityId, position: Vec3, half_extents: Vec3) -> bool {
        self.create_body(entity, position, RigidBody::kinematic(), ShapeConfig::Box { half_extents })
    }

    /// Dynamic sphere
    pub fn create_dynamic_sphere(&mut self, entity: EntityId, position: Vec3, radius: f32, mass: f32) -> bool {
        self.create_body(entity, position, RigidBody::dynamic(mass), ShapeConfig::sphere(radius))
    }

    /// Static sphere
    pub fn create_static_sphere(&mut self, entity: EntityId, position: Vec3, radius: f32) -> bool {
        self.create_body(entity, position, RigidBody::fixed(), ShapeConfig::sphere(radius))
    }

    fn create_body(&mut self, entity: EntityId, position: Vec3, body: RigidBody, shape: ShapeConfig) -> bool {
        if !self.add_rigid_body(entity, PhysicsTransform::new(position, Quat::identity()), body) {
            return false;
        }
        if !self.add_collider(entity, ColliderConfig::new(shape)) {
            self.remove_rigid_body(entity);
            return false;
        }
        true
    }

    // Queries

    /// Closest hit along the ray
    pub fn raycast(&self, ray: &Ray) -> Option<RaycastResult> {
        self.backend.as_ref().and_then(|b| b.raycast(ray))
    }

    /// Every hit along the ray, nearest first
    pub fn raycast_all(&self, ray: &Ray) -> Vec<RaycastResult> {
        self.backend.as_ref().map(|b| b.raycast_all(ray)).unwrap_or_default()
    }

    /// Contacts of the most recent fixed step
    pub fn collision_events(&self) -> &[CollisionInfo] {
        self.backend.as_ref().map_or(&[], |b| b.collision_events())
    }

    /// Contacts of every fixed step taken by the last `update`
    pub fn frame_collision_events(&self) -> &[CollisionInfo] {
        &self.frame_events
    }

    // Constraints

    /// Link two bodies, `b` may be `INVALID_ENTITY` to pin `a` to the world
    pub fn add_constraint(&mut self, a: EntityId, b: EntityId, config: &ConstraintConfig) -> bool {
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        let added = backend.add_constraint(a, b, config);
        if !added {
            log::warn!(
                "[PhysicsSystem] {:?} constraint between {a} and {b} rejected by {} (duplicate or missing body)",
                config.constraint_type,
                backend.engine_name()
            );
        }
        added
    }

    /// Remove the constraint between two bodies
    pub fn remove_constraint(&mut self, a: EntityId, b: EntityId) -> bool {
        self.backend.as_mut().map_or(false, |backend| backend.remove_constraint(a, b))
    }

    // Characters

    /// Create a kinematic character at `position`
    pub fn add_character(&mut self, entity: EntityId, position: Vec3, config: &CharacterControllerConfig) -> bool {
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        if backend.has_character(entity) {
            log::warn!("[PhysicsSystem] Entity {entity} already has a character controller");
            return false;
        }
        backend.add_character(entity, position, config)
    }

    /// Move a character by a displacement, returns its new position
    pub fn move_character(&mut self, entity: EntityId, displacement: Vec3, delta_time: f32) -> Vec3 {
        self.backend
            .as_mut()
            .map_or_else(Vec3::zeros, |b| b.move_character(entity, displacement, delta_time))
    }

    /// Character position, zero for unknown characters
    pub fn character_position(&self, entity: EntityId) -> Vec3 {
        self.backend
            .as_ref()
            .map_or_else(Vec3::zeros, |b| b.character_position(entity))
    }

    /// Whether the character is standing on walkable ground
    pub fn is_character_grounded(&self, entity: EntityId) -> bool {
        self.backend.as_ref().map_or(false, |b| b.is_character_grounded(entity))
    }

    /// Remove a character
    pub fn remove_character(&mut self, entity: EntityId) {
        if let Some(backend) = self.backend.as_mut() {
            backend.remove_character(entity);
        }
    }

    /// Whether the entity has a character
    pub fn has_character(&self, entity: EntityId) -> bool {
        self.backend.as_ref().map_or(false, |b| b.has_character(entity))
    }

    // World

    /// Set world gravity
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_gravity(gravity);
        }
    }

    /// Current world gravity
    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    /// Forward backend debug geometry to a renderer
    pub fn debug_draw(&mut self, renderer: &mut dyn PhysicsDebugRenderer) {
        if let Some(backend) = self.backend.as_mut() {
            backend.debug_draw(renderer);
        }
    }

    /// Toggle debug drawing in the stored config
    pub fn set_show_debug_physics(&mut self, enabled: bool) {
        self.config.show_debug_physics = enabled;
    }

    // Accessors

    /// Active engine name, `"None"` when there is no backend
    pub fn engine_name(&self) -> &'static str {
        self.backend.as_ref().map_or("None", |b| b.engine_name())
    }

    /// Engine the active backend was built from, `None` for custom backends
    pub fn engine_type(&self) -> Option<PhysicsEngineType> {
        self.engine_type
    }

    /// Config the active backend was initialized with
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Unsimulated time carried to the next update
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Features of the active backend, empty when there is none
    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend
            .as_ref()
            .map_or(BackendCapabilities::empty(), |b| b.capabilities())
    }

    /// Whether a backend is active
    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }
}
