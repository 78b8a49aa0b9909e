//! Authoring metadata: entities, fields, type references, and views.
//!
//! Authoring is loaded once at start-up (the loader lives outside this crate;
//! every type here deserializes with serde) and is immutable afterwards.
//!
//! # Example
//!
//! ```ignore
//! use strata::authoring::{EntityAuthoring, FieldDef, ViewDef};
//!
//! let order = EntityAuthoring::entity("Order", "orders")
//!     .field("id", FieldDef::scalar("uuid").key().auto_generated())
//!     .field("tenantId", FieldDef::scalar("string"))
//!     .view(ViewDef::new("order_default").map("tenantId", "tenant_id"));
//! ```

mod entity;
mod registry;
mod type_ref;
mod view;

pub use entity::{EntityAuthoring, EntityKind, FieldDef, GOVERNANCE_KEY_ATTR};
pub use registry::{AuthoringRegistry, InMemoryAuthoringRegistry};
pub use type_ref::TypeRef;
pub use view::{
    default_column, MappingDetail, MappingMode, MappingSpec, NativeQuery, ViewDef,
    SCHEMA_PLACEHOLDER,
};
