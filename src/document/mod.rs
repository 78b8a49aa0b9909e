//! Document-store family.
//!
//! Queries become filter documents (or aggregation pipelines when a view
//! carries a native pipeline); writes become insert, `$set` and upsert
//! documents. Filter values are encoded and bound exactly like stored
//! values, so a uuid compares as the string it is stored as.

pub mod backend;
pub mod binders;
pub mod dialect;
mod render;
pub mod row;
pub mod statement;
pub mod types;

/// Dialect id the document binders and user types are registered under.
pub const DIALECT_ID: &str = "document";

pub use backend::{DocumentBackend, DocumentDriver, DocumentTx, UpdateOutcome};
pub use binders::{document_binders, DocumentBinders};
pub use dialect::{DocumentDialect, COUNT_FIELD};
pub use row::DocumentRow;
pub use statement::{DocumentStatement, Stage, StatementKind};
pub use types::{document_user_types, DocumentJsonType, DocumentUserTypes};
