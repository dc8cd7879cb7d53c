//! Entity implementation

use slotmap::{Key, KeyData};

use crate::physics::types::EntityId;

slotmap::new_key_type! {
    /// Versioned slot key backing an [`Entity`]
    pub struct EntityKey;
}

/// Entity identifier
///
/// Wraps a versioned slot key, so a despawned entity's id is never handed
/// out again while anything still refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    key: EntityKey,
}

impl Entity {
    pub(super) fn new(key: EntityKey) -> Self {
        Self { key }
    }

    pub(super) fn key(self) -> EntityKey {
        self.key
    }

    /// Get the entity ID used by the physics backends, never zero
    pub fn id(&self) -> EntityId {
        self.key.data().as_ffi()
    }

    /// Rebuild an entity from a physics id
    ///
    /// The result may name a despawned entity; check it with
    /// `World::is_alive`.
    pub fn from_id(id: EntityId) -> Self {
        Self {
            key: EntityKey::from(KeyData::from_ffi(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_id_round_trip_and_nonzero() {
        let mut slots: SlotMap<EntityKey, ()> = SlotMap::with_key();
        let entity = Entity::new(slots.insert(()));
        assert_ne!(entity.id(), 0);
        assert_eq!(Entity::from_id(entity.id()), entity);
    }

    #[test]
    fn test_reused_slot_gets_new_id() {
        let mut slots: SlotMap<EntityKey, ()> = SlotMap::with_key();
        let first = slots.insert(());
        slots.remove(first);
        let second = slots.insert(());
        assert_ne!(Entity::new(first).id(), Entity::new(second).id());
    }
}
