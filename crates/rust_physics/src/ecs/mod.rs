//! Entity-Component-System implementation
//!
//! A small host world: slotmap-backed entities, typed component storage,
//! world resources and an event journal the physics bridge drains once per
//! frame.

pub mod world;
pub mod entity;
pub mod component;
pub mod components;
pub mod resources;
pub mod systems;

pub use world::{World, WorldEvent};
pub use entity::Entity;
pub use component::Component;
