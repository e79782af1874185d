//! Component Definitions
//!
//! The declarative side of a component: canonical definitions, the transient
//! proposal assembled from agent text, and the builtin catalog.

pub mod builtin;
pub mod definition;
pub mod proposed;

pub use builtin::{builtin_definitions, is_builtin_id};
pub use definition::{ComponentDefinition, ConfigField, ConfigSchema, FieldType, Origin};
pub use proposed::ProposedDefinition;
