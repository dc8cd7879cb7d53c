//! ECS World implementation

use std::any::{Any, TypeId};
use std::collections::HashMap;

use slotmap::{SecondaryMap, SlotMap};

use super::entity::EntityKey;
use super::{Component, Entity};

/// Change recorded by the world for observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// A component was inserted, replaced or marked changed
    ComponentSet {
        /// Entity owning the component
        entity: Entity,
        /// Component type
        component: TypeId,
    },
    /// A component was removed from a living entity
    ComponentRemoved {
        /// Entity that owned the component
        entity: Entity,
        /// Component type
        component: TypeId,
    },
    /// An entity and all its components were destroyed
    EntityDestroyed {
        /// Destroyed entity
        entity: Entity,
    },
}

impl WorldEvent {
    /// Entity the event is about
    pub fn entity(&self) -> Entity {
        match *self {
            Self::ComponentSet { entity, .. }
            | Self::ComponentRemoved { entity, .. }
            | Self::EntityDestroyed { entity } => entity,
        }
    }

    /// Whether the event concerns component type `T`
    pub fn is<T: Component>(&self) -> bool {
        match *self {
            Self::ComponentSet { component, .. } | Self::ComponentRemoved { component, .. } => {
                component == TypeId::of::<T>()
            }
            Self::EntityDestroyed { .. } => false,
        }
    }
}

/// Type-erased view of one component column
trait AnyStorage: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove_entity(&mut self, key: EntityKey);
}

struct Storage<T: Component> {
    components: SecondaryMap<EntityKey, T>,
}

impl<T: Component> AnyStorage for Storage<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove_entity(&mut self, key: EntityKey) {
        self.components.remove(key);
    }
}

/// ECS World containing all entities, components and resources
#[derive(Default)]
pub struct World {
    entities: SlotMap<EntityKey, ()>,
    storages: HashMap<TypeId, Box<dyn AnyStorage>>,
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    events: Vec<WorldEvent>,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity
    pub fn spawn(&mut self) -> Entity {
        Entity::new(self.entities.insert(()))
    }

    /// Destroy an entity and all its components, returns false if it was already gone
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity.key()).is_none() {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity.key());
        }
        self.events.push(WorldEvent::EntityDestroyed { entity });
        true
    }

    /// Whether the entity exists
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity.key())
    }

    /// Number of living entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate living entities
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().map(Entity::new)
    }

    fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|s| s.as_any().downcast_ref::<Storage<T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut Storage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<Storage<T>>())
    }

    /// Add or replace a component, returns false for dead entities
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(Storage::<T> {
                    components: SecondaryMap::new(),
                })
            });
        let Some(storage) = storage.as_any_mut().downcast_mut::<Storage<T>>() else {
            return false;
        };
        storage.components.insert(entity.key(), component);
        self.events.push(WorldEvent::ComponentSet {
            entity,
            component: TypeId::of::<T>(),
        });
        true
    }

    /// Get a component from an entity
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.components.get(entity.key())
    }

    /// Get a mutable component from an entity
    ///
    /// Edits through this reference are not journaled; call
    /// [`World::mark_changed`] when observers must see them.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.components.get_mut(entity.key())
    }

    /// Remove a component, recording the removal
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let removed = self.storage_mut::<T>()?.components.remove(entity.key())?;
        self.events.push(WorldEvent::ComponentRemoved {
            entity,
            component: TypeId::of::<T>(),
        });
        Some(removed)
    }

    /// Whether the entity has a component of type `T`
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Entities owning a component of type `T`
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.storage::<T>()
            .map(|s| s.components.keys().map(Entity::new).collect())
            .unwrap_or_default()
    }

    /// Entities owning a component of type `T` alongside the component
    pub fn query<T: Component>(&self) -> Vec<(Entity, &T)> {
        self.storage::<T>()
            .map(|s| s.components.iter().map(|(k, c)| (Entity::new(k), c)).collect())
            .unwrap_or_default()
    }

    /// Record an in-place edit of a component
    pub fn mark_changed<T: Component>(&mut self, entity: Entity) {
        if self.has::<T>(entity) {
            self.events.push(WorldEvent::ComponentSet {
                entity,
                component: TypeId::of::<T>(),
            });
        }
    }

    /// Take every event recorded since the last drain
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Events waiting to be drained
    pub fn pending_events(&self) -> &[WorldEvent] {
        &self.events
    }

    /// Add or replace a resource
    pub fn insert_resource<R: Any + Send + Sync>(&mut self, resource: R) {
        self.resources.insert(TypeId::of::<R>(), Box::new(resource));
    }

    /// Get a resource
    pub fn resource<R: Any + Send + Sync>(&self) -> Option<&R> {
        self.resources.get(&TypeId::of::<R>())?.downcast_ref::<R>()
    }

    /// Get a mutable resource
    pub fn resource_mut<R: Any + Send + Sync>(&mut self) -> Option<&mut R> {
        self.resources.get_mut(&TypeId::of::<R>())?.downcast_mut::<R>()
    }

    /// Remove a resource
    pub fn remove_resource<R: Any + Send + Sync>(&mut self) -> Option<R> {
        self.resources
            .remove(&TypeId::of::<R>())?
            .downcast::<R>()
            .ok()
            .map(|boxed| *boxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Name(&'static str);
    impl Component for Name {}

    #[test]
    fn test_insert_get_remove() {
        let mut world = World::new();
        let entity = world.spawn();

        assert!(world.insert(entity, Health(10)));
        assert_eq!(world.get::<Health>(entity), Some(&Health(10)));
        assert!(world.has::<Health>(entity));
        assert!(!world.has::<Name>(entity));

        if let Some(health) = world.get_mut::<Health>(entity) {
            health.0 = 5;
        }
        assert_eq!(world.remove::<Health>(entity), Some(Health(5)));
        assert!(world.remove::<Health>(entity).is_none());
    }

    #[test]
    fn test_journal_records_changes() {
        let mut world = World::new();
        let entity = world.spawn();
        world.insert(entity, Health(1));
        world.mark_changed::<Health>(entity);
        world.mark_changed::<Name>(entity);
        world.remove::<Health>(entity);
        world.despawn(entity);

        let events = world.drain_events();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], WorldEvent::ComponentSet { .. }));
        assert!(events[0].is::<Health>());
        assert!(events[1].is::<Health>());
        assert!(matches!(events[2], WorldEvent::ComponentRemoved { .. }));
        assert_eq!(events[3], WorldEvent::EntityDestroyed { entity });
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn test_despawn_clears_components() {
        let mut world = World::new();
        let entity = world.spawn();
        world.insert(entity, Health(3));
        world.insert(entity, Name("crate"));

        assert!(world.despawn(entity));
        assert!(!world.despawn(entity));
        assert!(!world.is_alive(entity));
        assert!(world.get::<Health>(entity).is_none());
        assert!(!world.insert(entity, Health(1)));
        assert!(world.entities_with::<Name>().is_empty());
    }

    #[test]
    fn test_despawned_id_is_not_reused() {
        let mut world = World::new();
        let first = world.spawn();
        world.despawn(first);
        let second = world.spawn();
        assert_ne!(first.id(), second.id());
        assert!(!world.is_alive(Entity::from_id(first.id())));
        assert!(world.is_alive(Entity::from_id(second.id())));
    }

    #[test]
    fn test_query_and_entities_with() {
        let mut world = World::new();
        let a = world.spawn();
        let b = world.spawn();
        world.insert(a, Health(1));
        world.insert(b, Health(2));
        world.insert(b, Name("b"));

        assert_eq!(world.entities_with::<Health>().len(), 2);
        assert_eq!(world.entities_with::<Name>(), vec![b]);
        let total: u32 = world.query::<Health>().iter().map(|(_, h)| h.0).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_resources() {
        let mut world = World::new();
        assert!(world.resource::<f32>().is_none());
        world.insert_resource(9.81_f32);
        if let Some(g) = world.resource_mut::<f32>() {
            *g *= 2.0;
        }
        assert_eq!(world.resource::<f32>(), Some(&19.62));
        assert_eq!(world.remove_resource::<f32>(), Some(19.62));
    }
}
