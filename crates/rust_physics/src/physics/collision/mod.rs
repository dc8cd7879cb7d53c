//! Geometric collision primitives used by the built-in solver
//!
//! # Module Organization
//!
//! - [`primitives`] - Basic geometric primitives (spheres, oriented boxes, triangles)
//! - [`mesh`] - Triangle mesh templates in model space and their world-space copies
//! - [`contact`] - Contact generation between primitives (narrow phase)
//!
//! Shapes are stored in model space and transformed to world space only
//! while a step or a query needs them.

pub mod primitives;
pub mod mesh;
pub mod contact;

pub use primitives::{BoundingSphere, OrientedBox, Triangle};
pub use mesh::{CollisionMeshTemplate, WorldSpaceCollisionMesh};
pub use contact::Contact;
