//! Physics error types

use super::types::EntityId;

/// Errors reported by the physics façade and its backends
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// The native world could not be created
    #[error("Physics initialization failed: {0}")]
    InitializationFailed(String),

    /// An operation required an initialized backend
    #[error("Physics backend is not initialized")]
    NotInitialized,

    /// The requested engine is not compiled in or not known
    #[error("Unsupported physics engine: {0}")]
    UnsupportedEngine(String),

    /// A rigid body description was rejected
    #[error("Invalid rigid body for entity {entity}: {reason}")]
    InvalidBody {
        /// Entity the body belongs to
        entity: EntityId,
        /// What was wrong
        reason: String,
    },

    /// A shape description was rejected
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// The entity already has a body
    #[error("Entity {0} already has a rigid body")]
    DuplicateBody(EntityId),

    /// The entity has no body
    #[error("Entity {0} has no rigid body")]
    BodyNotFound(EntityId),

    /// World settings were rejected
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),
}

impl From<crate::config::ConfigError> for PhysicsError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
