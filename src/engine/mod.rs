//! Orchestration: the [`DataEngine`], its backend seam, transaction
//! contexts, entity helpers and row adapters.

pub mod backend;
pub mod context;
mod data_engine;
pub mod handle;
pub mod helpers;
pub mod propagation;
pub mod row;

pub use backend::{Backend, DriverResult, RowSink};
pub use context::TxContext;
pub use data_engine::{resolve_schema, DataEngine, EngineContext};
pub use handle::{EngineHandle, EntityViewRef};
pub use helpers::{Accessor, DocumentHelpers, EntityHelpers, HelperRegistry, Mutator, RowDecoder};
pub use propagation::Propagation;
pub use row::{MapRow, PrefixedRow, RowAdapter, ViewMappedRow};
