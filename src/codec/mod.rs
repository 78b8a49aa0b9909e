//! Logical type codec.
//!
//! A [`UserType`] converts between a logical value (what callers and entity
//! accessors hold) and the backend-native value handed to binders. Types are
//! looked up by id through a [`UserTypeRegistry`]:
//!
//! 1. the active dialect's overrides,
//! 2. the global types ([`ScalarType`]),
//! 3. a container type synthesized from `list<T>`, `set<T>`, `array<T>` or
//!    `map<K,V>` and cached per id.
//!
//! The registry is composed from an explicit list of [`UserTypeProvider`]s.

mod container;
mod registry;
mod scalar;

use std::fmt;
use std::sync::Arc;

use crate::error::CodecError;
use crate::value::Value;

pub use container::{CollectionKind, CollectionType, MapType};
pub use registry::UserTypeRegistry;
pub use scalar::{GlobalUserTypes, ScalarType};

/// A named logical type with its native representation.
pub trait UserType: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Native value to logical value.
    fn decode(&self, native: &Value) -> Result<Value, CodecError>;

    /// Logical value to native value.
    fn encode(&self, logical: &Value) -> Result<Value, CodecError>;
}

/// Source of user types, either global or scoped to one dialect.
pub trait UserTypeProvider {
    /// `None` for global types.
    fn dialect_id(&self) -> Option<&str>;

    fn user_types(&self) -> Vec<Arc<dyn UserType>>;
}
