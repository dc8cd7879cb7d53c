//! Collision layer system for filtering collision detection and queries
//!
//! Every body occupies one or more layer bits and carries a mask of the
//! layers it is willing to touch. A pair only interacts when each side's
//! layer is accepted by the other side's mask.

/// Collision layer definitions using bitflags for efficient filtering
pub struct CollisionLayers;

impl CollisionLayers {
    /// No collision layer
    pub const NONE: u32 = 0;

    /// All collision layers
    pub const ALL: u32 = 0xFFFF_FFFF;

    // Built-in layers (bits 0-7)
    /// Layer given to bodies that do not pick one
    pub const DEFAULT: u32 = 1 << 0;

    /// Static world geometry
    pub const STATIC: u32 = 1 << 1;

    /// Simulated props
    pub const DYNAMIC: u32 = 1 << 2;

    /// Host-driven movers
    pub const KINEMATIC: u32 = 1 << 3;

    /// Character controllers
    pub const CHARACTER: u32 = 1 << 4;

    /// Trigger volumes (no physical response)
    pub const TRIGGER: u32 = 1 << 5;

    /// Fast movers, usually with CCD
    pub const PROJECTILE: u32 = 1 << 6;

    /// Debris and small physics objects
    pub const DEBRIS: u32 = 1 << 7;

    /// First bit free for game-specific layers (bits 8-31)
    pub const FIRST_CUSTOM_BIT: u32 = 8;

    /// Game-specific layer `n` (0-23), mapped onto bits 8-31
    pub const fn custom(n: u32) -> u32 {
        1 << (Self::FIRST_CUSTOM_BIT + (n % 24))
    }

    /// Check if two bodies should collide based on their layers and masks
    ///
    /// # Example
    /// ```
    /// use rust_physics::physics::CollisionLayers;
    ///
    /// // Character collides with static geometry and props
    /// let character_mask = CollisionLayers::STATIC | CollisionLayers::DYNAMIC;
    /// // Props collide with everything
    /// let prop_mask = CollisionLayers::ALL;
    ///
    /// assert!(CollisionLayers::should_collide(
    ///     CollisionLayers::CHARACTER, character_mask,
    ///     CollisionLayers::DYNAMIC, prop_mask,
    /// ));
    /// ```
    pub fn should_collide(layer_a: u32, mask_a: u32, layer_b: u32, mask_b: u32) -> bool {
        // A's layer must be in B's mask AND B's layer must be in A's mask
        (layer_a & mask_b) != 0 && (layer_b & mask_a) != 0
    }

    /// Whether a query with `mask` may report a body on `layer`
    pub fn query_accepts(mask: u32, layer: u32) -> bool {
        (mask & layer) != 0
    }

    /// Helper to create a mask from multiple layers
    ///
    /// # Example
    /// ```
    /// use rust_physics::physics::CollisionLayers;
    ///
    /// let mask = CollisionLayers::mask(&[
    ///     CollisionLayers::STATIC,
    ///     CollisionLayers::DYNAMIC,
    /// ]);
    /// assert_eq!(mask, 0b110);
    /// ```
    pub fn mask(layers: &[u32]) -> u32 {
        layers.iter().fold(0, |acc, &layer| acc | layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_collide_mutual() {
        let character_layer = CollisionLayers::CHARACTER;
        let character_mask = CollisionLayers::DYNAMIC;

        let prop_layer = CollisionLayers::DYNAMIC;
        let prop_mask = CollisionLayers::CHARACTER;

        assert!(CollisionLayers::should_collide(
            character_layer, character_mask,
            prop_layer, prop_mask
        ));
    }

    #[test]
    fn test_should_not_collide_one_way() {
        // Character wants the prop, the prop only accepts projectiles
        let character_layer = CollisionLayers::CHARACTER;
        let character_mask = CollisionLayers::DYNAMIC;

        let prop_layer = CollisionLayers::DYNAMIC;
        let prop_mask = CollisionLayers::PROJECTILE;

        assert!(!CollisionLayers::should_collide(
            character_layer, character_mask,
            prop_layer, prop_mask
        ));
    }

    #[test]
    fn test_mask_creation() {
        let mask = CollisionLayers::mask(&[
            CollisionLayers::DEFAULT,
            CollisionLayers::STATIC,
            CollisionLayers::TRIGGER
        ]);

        assert_eq!(
            mask,
            CollisionLayers::DEFAULT | CollisionLayers::STATIC | CollisionLayers::TRIGGER
        );
    }

    #[test]
    fn test_custom_layers_do_not_overlap_builtins() {
        assert_eq!(CollisionLayers::custom(0), 1 << 8);
        assert_eq!(CollisionLayers::custom(23), 1 << 31);
        assert_eq!(CollisionLayers::custom(0) & 0xFF, 0);
    }

    #[test]
    fn test_query_accepts() {
        assert!(CollisionLayers::query_accepts(CollisionLayers::ALL, CollisionLayers::DEBRIS));
        assert!(!CollisionLayers::query_accepts(CollisionLayers::STATIC, CollisionLayers::DEBRIS));
    }
}
