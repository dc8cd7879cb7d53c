//! Test backends
//!
//! Minimal [`PhysicsBackend`] implementations for exercising the façade
//! without a real engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::foundation::math::Vec3;
use super::backend::{BackendCapabilities, PhysicsBackend};
use super::error::PhysicsError;
use super::types::{
    ColliderConfig, CollisionInfo, ConstraintConfig, EntityId, PhysicsConfig, PhysicsSyncResult,
    PhysicsTransform, Ray, RaycastResult, RigidBody,
};

/// Records every step and reports one fake contact per step
///
/// Clones share their counters, so a test can keep a counter after boxing the
/// backend into a system.
#[derive(Clone, Default)]
pub struct CountingBackend {
    steps: Arc<AtomicU32>,
    last_delta: Arc<Mutex<f32>>,
    reject_bodies: bool,
    initialized: bool,
    gravity: Vec3,
    bodies: BTreeMap<EntityId, PhysicsTransform>,
    events: Vec<CollisionInfo>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose `sync_body_to_backend` always fails
    pub fn rejecting_bodies() -> Self {
        Self {
            reject_bodies: true,
            ..Self::default()
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn last_delta(&self) -> f32 {
        self.last_delta.lock().map_or(0.0, |dt| *dt)
    }
}

impl PhysicsBackend for CountingBackend {
    fn initialize(&mut self, config: &PhysicsConfig) -> Result<(), PhysicsError> {
        self.initialized = true;
        self.gravity = config.gravity;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        self.bodies.clear();
        self.events.clear();
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
        if !self.initialized {
            return;
        }
        self.steps.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_delta.lock() {
            *last = delta_time;
        }
        self.events = vec![CollisionInfo {
            entity_a: 1,
            entity_b: 2,
            ..CollisionInfo::default()
        }];
    }

    fn sync_body_to_backend(
        &mut self,
        entity: EntityId,
        transform: &PhysicsTransform,
        _body: &RigidBody,
        _collider: &ColliderConfig,
    ) -> Result<(), PhysicsError> {
        if self.reject_bodies {
            return Err(PhysicsError::InvalidShape("rejected by test backend".into()));
        }
        self.bodies.insert(entity, *transform);
        Ok(())
    }

    fn sync_body_from_backend(&self, entity: EntityId) -> PhysicsSyncResult {
        self.bodies.get(&entity).map_or_else(PhysicsSyncResult::default, |t| PhysicsSyncResult {
            position: t.position,
            rotation: t.rotation,
            ..PhysicsSyncResult::default()
        })
    }

    fn remove_body(&mut self, entity: EntityId) {
        self.bodies.remove(&entity);
    }

    fn has_body(&self, entity: EntityId) -> bool {
        self.bodies.contains_key(&entity)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn set_velocity(&mut self, entity: EntityId, _linear: Vec3, _angular: Vec3) -> bool {
        self.bodies.contains_key(&entity)
    }

    fn apply_force(&mut self, _entity: EntityId, _force: Vec3, _torque: Vec3) {}

    fn apply_impulse(&mut self, _entity: EntityId, _impulse: Vec3, _point: Vec3) {}

    fn collision_events(&self) -> &[CollisionInfo] {
        &self.events
    }

    fn raycast(&self, _ray: &Ray) -> Option<RaycastResult> {
        None
    }

    fn raycast_all(&self, _ray: &Ray) -> Vec<RaycastResult> {
        Vec::new()
    }

    fn add_constraint(&mut self, _a: EntityId, _b: EntityId, _config: &ConstraintConfig) -> bool {
        false
    }

    fn remove_constraint(&mut self, _a: EntityId, _b: EntityId) -> bool {
        false
    }

    fn engine_name(&self) -> &'static str {
        "Counting"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::RIGID_BODIES | BackendCapabilities::COLLISION_EVENTS
    }
}

/// A backend that can never be initialized
pub struct FailingBackend;

impl PhysicsBackend for FailingBackend {
    fn initialize(&mut self, _config: &PhysicsConfig) -> Result<(), PhysicsError> {
        Err(PhysicsError::InitializationFailed("test backend always fails".into()))
    }

    fn shutdown(&mut self) {}

    fn is_initialized(&self) -> bool {
        false
    }

    fn set_gravity(&mut self, _gravity: Vec3) {}

    fn gravity(&self) -> Vec3 {
        Vec3::zeros()
    }

    fn step_simulation(&mut self, _delta_time: f32) {}

    fn sync_body_to_backend(
        &mut self,
        _entity: EntityId,
        _transform: &PhysicsTransform,
        _body: &RigidBody,
        _collider: &ColliderConfig,
    ) -> Result<(), PhysicsError> {
        Err(PhysicsError::NotInitialized)
    }

    fn sync_body_from_backend(&self, _entity: EntityId) -> PhysicsSyncResult {
        PhysicsSyncResult::default()
    }

    fn remove_body(&mut self, _entity: EntityId) {}

    fn has_body(&self, _entity: EntityId) -> bool {
        false
    }

    fn body_count(&self) -> usize {
        0
    }

    fn set_velocity(&mut self, _entity: EntityId, _linear: Vec3, _angular: Vec3) -> bool {
        false
    }

    fn apply_force(&mut self, _entity: EntityId, _force: Vec3, _torque: Vec3) {}

    fn apply_impulse(&mut self, _entity: EntityId, _impulse: Vec3, _point: Vec3) {}

    fn collision_events(&self) -> &[CollisionInfo] {
        &[]
    }

    fn raycast(&self, _ray: &Ray) -> Option<RaycastResult> {
        None
    }

    fn raycast_all(&self, _ray: &Ray) -> Vec<RaycastResult> {
        Vec::new()
    }

    fn add_constraint(&mut self, _a: EntityId, _b: EntityId, _config: &ConstraintConfig) -> bool {
        false
    }

    fn remove_constraint(&mut self, _a: EntityId, _b: EntityId) -> bool {
        false
    }

    fn engine_name(&self) -> &'static str {
        "Failing"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::empty()
    }
}
