//! Component trait and implementations

/// Marker trait for components
pub trait Component: 'static + Send + Sync {}

// Physics configuration doubles as component data
impl Component for crate::physics::types::RigidBody {}
impl Component for crate::physics::types::ColliderConfig {}
