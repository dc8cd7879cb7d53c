//! ECS physics synchronization
//!
//! Binds the host world to a [`PhysicsSystem`]. Each call to
//! [`PhysicsSyncBridge::update`] is one simulation phase:
//!
//! 1. drain the world's change journal and push changed bodies to the backend
//! 2. apply `PhysicsForce` / `PhysicsImpulse` components
//! 3. apply the `PhysicsWorldConfig` resource
//! 4. step the simulation with the fixed-timestep accumulator
//! 5. write simulated poses and velocities of dynamic bodies back
//! 6. hand the frame's contacts to subscribed entities
//!
//! Local `TransformComponent`s are never written; physics results only land
//! in `WorldTransform` and `PhysicsVelocity`.

use std::collections::BTreeSet;

use crate::ecs::components::{
    resolve_world_transform, CollisionEvents, Parent, PhysicsForce, PhysicsImpulse, PhysicsVelocity,
    TransformComponent, WorldTransform,
};
use crate::ecs::resources::PhysicsWorldConfig;
use crate::ecs::{Entity, World, WorldEvent};
use crate::physics::debug_render::PhysicsDebugRenderer;
use crate::physics::system::PhysicsSystem;
use crate::physics::types::{ColliderConfig, MotionType, RigidBody};

/// What one simulation phase did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysicsSyncStats {
    /// Bodies created or updated from world changes
    pub bodies_synced: usize,
    /// Bodies removed from the backend
    pub bodies_removed: usize,
    /// Fixed steps taken
    pub steps: u32,
    /// Collision events delivered to subscribers
    pub events_delivered: usize,
}

/// ECS system keeping a physics backend and the world in step
#[derive(Debug, Default)]
pub struct PhysicsSyncBridge {
    frame: u64,
    last_stats: PhysicsSyncStats,
}

impl PhysicsSyncBridge {
    /// Create a new bridge
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics of the most recent `update`
    pub fn last_stats(&self) -> PhysicsSyncStats {
        self.last_stats
    }

    /// Run one simulation phase
    pub fn update(&mut self, world: &mut World, physics: &mut PhysicsSystem, delta_time: f32) -> PhysicsSyncStats {
        self.frame += 1;
        let mut stats = PhysicsSyncStats::default();

        // Step 1: Drain host events and push changed bodies
        let mut dirty = Self::drain_world_events(world, physics, &mut stats);
        if Self::restart_for_world_config(world, physics) {
            dirty.extend(world.entities_with::<RigidBody>());
        }
        for entity in dirty {
            if Self::sync_entity(world, physics, entity) {
                stats.bodies_synced += 1;
            }
        }

        // Step 2: Forces and impulses
        Self::apply_forces(world, physics);

        // Step 3: Gravity and debug toggle from the world config
        Self::apply_live_settings(world, physics);

        // Step 4: Fixed-timestep simulation
        stats.steps = physics.update(delta_time);

        // Step 5: Write dynamic bodies back
        Self::sync_back(world, physics);

        // Step 6: Collision distribution
        stats.events_delivered = Self::distribute_collisions(world, physics);

        log::trace!(
            "[PhysicsSync] Frame {}: {} synced, {} removed, {} steps, {} events delivered",
            self.frame,
            stats.bodies_synced,
            stats.bodies_removed,
            stats.steps,
            stats.events_delivered
        );
        self.last_stats = stats;
        stats
    }

    /// Forward backend debug geometry when the debug toggle is on
    ///
    /// The `PhysicsWorldConfig` resource decides when present, otherwise the
    /// system's own config. Returns whether anything was drawn.
    pub fn draw_debug(&self, world: &World, physics: &mut PhysicsSystem, renderer: &mut dyn PhysicsDebugRenderer) -> bool {
        let enabled = world
            .resource::<PhysicsWorldConfig>()
            .map_or(physics.config().show_debug_physics, |c| c.show_debug_physics);
        if enabled {
            physics.debug_draw(renderer);
        }
        enabled
    }

    /// Collect entities whose body must be resynced, removing destroyed bodies on the way
    fn drain_world_events(
        world: &mut World,
        physics: &mut PhysicsSystem,
        stats: &mut PhysicsSyncStats,
    ) -> BTreeSet<Entity> {
        let mut dirty = BTreeSet::new();

        for event in world.drain_events() {
            match event {
                WorldEvent::ComponentSet { entity, .. } => {
                    if event.is::<RigidBody>() || event.is::<ColliderConfig>() || event.is::<Parent>() {
                        dirty.insert(entity);
                    } else if event.is::<TransformComponent>() {
                        dirty.insert(entity);
                        Self::collect_descendants(world, entity, &mut dirty);
                    }
                }
                WorldEvent::ComponentRemoved { entity, .. } => {
                    if event.is::<RigidBody>() || event.is::<ColliderConfig>() {
                        dirty.remove(&entity);
                        if physics.has_rigid_body(entity.id()) {
                            physics.remove_rigid_body(entity.id());
                            stats.bodies_removed += 1;
                        }
                        if world.remove::<PhysicsVelocity>(entity).is_some() {
                            log::trace!("[PhysicsSync] Dropped velocity of entity {}", entity.id());
                        }
                    } else if event.is::<Parent>() {
                        dirty.insert(entity);
                        Self::collect_descendants(world, entity, &mut dirty);
                    }
                }
                WorldEvent::EntityDestroyed { entity } => {
                    dirty.remove(&entity);
                    if physics.has_rigid_body(entity.id()) {
                        physics.remove_rigid_body(entity.id());
                        stats.bodies_removed += 1;
                        log::debug!("[PhysicsSync] Removed body of destroyed entity {}", entity.id());
                    }
                }
            }
        }

        // An entity may have been despawned after its change was journaled
        dirty.retain(|&entity| world.is_alive(entity));
        dirty
    }

    /// Add every entity parented (directly or not) under `root`
    fn collect_descendants(world: &World, root: Entity, out: &mut BTreeSet<Entity>) {
        let links: Vec<(Entity, Entity)> = world.query::<Parent>().into_iter().map(|(e, p)| (e, p.0)).collect();
        let mut frontier = vec![root];
        while let Some(parent) = frontier.pop() {
            for &(child, _) in links.iter().filter(|(_, p)| *p == parent) {
                if child != root && out.insert(child) {
                    frontier.push(child);
                }
            }
        }
    }

    /// Push one entity's body to the backend, returns whether it was synced
    fn sync_entity(world: &mut World, physics: &mut PhysicsSystem, entity: Entity) -> bool {
        let (Some(body), Some(collider)) = (world.get::<RigidBody>(entity), world.get::<ColliderConfig>(entity))
        else {
            return false;
        };
        let body = body.clone();
        let collider = collider.clone();

        let transform = resolve_world_transform(world, entity);
        match world.get_mut::<WorldTransform>(entity) {
            Some(world_transform) => *world_transform = WorldTransform::from_physics(&transform),
            None => {
                world.insert(entity, WorldTransform::from_physics(&transform));
            }
        }

        if let Err(e) = physics.sync_body_to_backend(entity.id(), transform, &body, &collider) {
            log::warn!("[PhysicsSync] Entity {} not synced to {}: {e}", entity.id(), physics.engine_name());
            return false;
        }

        match body.motion_type {
            MotionType::Dynamic => {
                if !world.has::<PhysicsVelocity>(entity) {
                    world.insert(
                        entity,
                        PhysicsVelocity {
                            linear: body.linear_velocity,
                            angular: body.angular_velocity,
                        },
                    );
                }
            }
            MotionType::Static | MotionType::Kinematic => {
                world.remove::<PhysicsVelocity>(entity);
            }
        }
        true
    }

    fn apply_forces(world: &mut World, physics: &mut PhysicsSystem) {
        for entity in world.entities_with::<PhysicsForce>() {
            let Some(&force) = world.get::<PhysicsForce>(entity) else {
                continue;
            };
            physics.apply_force(entity.id(), force.force, force.torque);
            if force.clear_after_apply {
                world.remove::<PhysicsForce>(entity);
            }
        }

        for entity in world.entities_with::<PhysicsImpulse>() {
            if let Some(impulse) = world.remove::<PhysicsImpulse>(entity) {
                physics.apply_impulse(entity.id(), impulse.impulse, impulse.point);
            }
        }
    }

    /// Restart the backend when the world config changed its stepping settings
    ///
    /// Returns true when the backend was replaced and every body must be pushed again.
    fn restart_for_world_config(world: &World, physics: &mut PhysicsSystem) -> bool {
        let Some(settings) = world.resource::<PhysicsWorldConfig>() else {
            return false;
        };
        if !settings.requires_restart(physics.config()) {
            return false;
        }

        let mut config = physics.config().clone();
        settings.apply_to(&mut config);
        if let Some(engine) = physics.engine_type() {
            log::info!("[PhysicsSync] Restarting {engine} for new stepping settings");
            if physics.set_engine(engine, config) {
                return true;
            }
        }
        log::warn!("[PhysicsSync] Stepping settings unchanged, {} was not restarted", physics.engine_name());
        false
    }

    fn apply_live_settings(world: &World, physics: &mut PhysicsSystem) {
        if let Some(settings) = world.resource::<PhysicsWorldConfig>() {
            physics.set_gravity(settings.gravity);
            physics.set_show_debug_physics(settings.show_debug_physics);
        }
    }

    fn sync_back(world: &mut World, physics: &PhysicsSystem) {
        for entity in world.entities_with::<RigidBody>() {
            let is_dynamic = world.get::<RigidBody>(entity).is_some_and(RigidBody::is_dynamic);
            if !is_dynamic || !physics.has_rigid_body(entity.id()) {
                continue;
            }
            let state = physics.body_state(entity.id());

            match world.get_mut::<WorldTransform>(entity) {
                Some(world_transform) => world_transform.set_pose(state.position, &state.rotation),
                None => {
                    let mut world_transform = WorldTransform::default();
                    world_transform.set_pose(state.position, &state.rotation);
                    world.insert(entity, world_transform);
                }
            }

            let velocity = PhysicsVelocity {
                linear: state.linear_velocity,
                angular: state.angular_velocity,
            };
            match world.get_mut::<PhysicsVelocity>(entity) {
                Some(current) => *current = velocity,
                None => {
                    world.insert(entity, velocity);
                }
            }
        }
    }

    fn distribute_collisions(world: &mut World, physics: &PhysicsSystem) -> usize {
        for entity in world.entities_with::<CollisionEvents>() {
            if let Some(events) = world.get_mut::<CollisionEvents>(entity) {
                events.events.clear();
            }
        }

        let mut delivered = 0;
        for info in physics.frame_collision_events() {
            for id in [info.entity_a, info.entity_b] {
                let entity = Entity::from_id(id);
                if !world.is_alive(entity) {
                    continue;
                }
                if let Some(events) = world.get_mut::<CollisionEvents>(entity) {
                    events.events.push(info.clone());
                    delivered += 1;
                }
            }
        }
        delivered
    }
}
