//! # strata
//!
//! A backend-agnostic persistence engine: one typed query and write model
//! compiled to relational SQL or to document-store commands.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Authoring (entities, fields, views)               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  Query ── normalize ── validate (PropertyTypeResolver)   │
//! │  Payload ── DmlPlanner ── DmlAst                         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [NativeDialect]
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ SqlStatement (Postgres,  │   │ DocumentStatement        │
//! │ ANSI)                    │   │ (filter / pipeline)      │
//! └──────────────────────────┘   └──────────────────────────┘
//!                          │
//!                          ▼ [Backend: UserType encode + Binder]
//! ┌─────────────────────────────────────────────────────────┐
//! │            SqlDriver / DocumentDriver                    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`engine::DataEngine`] sequences all of it and owns transaction
//! propagation through an explicit [`engine::TxContext`].

pub mod authoring;
pub mod bind;
pub mod codec;
pub mod compile;
pub mod config;
pub mod dialect;
pub mod dml;
pub mod document;
pub mod engine;
pub mod error;
pub mod query;
pub mod sql;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::authoring::{
        AuthoringRegistry, EntityAuthoring, FieldDef, InMemoryAuthoringRegistry, NativeQuery,
        TypeRef, ViewDef,
    };
    pub use crate::dialect::NativeDialect;
    pub use crate::document::{DocumentBackend, DocumentDialect, DocumentDriver};
    pub use crate::engine::{
        DataEngine, EngineContext, EngineHandle, EntityViewRef, HelperRegistry, Propagation,
    };
    pub use crate::query::{filters, Page, Query, QueryElement, SortField};
    pub use crate::sql::{Dialect, SqlBackend, SqlCompiler, SqlDriver};
    pub use crate::value::{Document, Value};
}

pub use error::{Error, Result};
pub use value::Value;
