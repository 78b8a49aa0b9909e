//! Error taxonomy.
//!
//! Validation, planning, binding, and transaction-state errors are raised
//! before any backend I/O, so they never leave a half-applied write behind.
//! Backend errors wrap the driver failure untouched.

use std::fmt;

use crate::query::Operator;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    TransactionState(#[from] TransactionStateError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Authoring(#[from] AuthoringError),

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Where a property path was used inside a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathUsage {
    Filter,
    Sort,
    GroupBy,
}

impl fmt::Display for PathUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathUsage::Filter => "filter",
            PathUsage::Sort => "sort",
            PathUsage::GroupBy => "groupBy",
        })
    }
}

/// Unknown or blank property path. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Blank property path in {usage} for entity '{entity}'")]
    BlankPath { usage: PathUsage, entity: String },

    #[error("Unknown scalar field path '{path}' in {usage} for entity '{entity}'")]
    UnknownPath {
        path: String,
        usage: PathUsage,
        entity: String,
    },
}

/// The query or write cannot be turned into a statement.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("Missing query param: {0}")]
    MissingParam(String),

    #[error("Unresolved query param: {0}")]
    UnresolvedParam(String),

    #[error("Composite key not supported for updateById: {0}")]
    CompositeKey(String),

    #[error("Insert into '{0}' has no columns")]
    EmptyInsert(String),

    #[error("Update of '{0}' has no set columns")]
    EmptyUpdate(String),

    #[error("Upsert into '{0}' has no conflict columns")]
    NoConflictColumns(String),

    #[error("Upsert conflict column not found among inserted columns: {0}")]
    UnknownConflictColumn(String),

    #[error("{op} is not supported by dialect: {dialect}")]
    UnsupportedOperator { op: Operator, dialect: String },

    #[error("Upsert is not supported by dialect: {0}")]
    UnsupportedUpsert(String),

    #[error("{0} requires a non-null value")]
    NullOperand(String),

    #[error("{op} expects {expected}")]
    InvalidOperand { op: Operator, expected: &'static str },

    #[error("Seek pagination requires sort fields")]
    SeekWithoutSort,

    #[error("Seek page 'after' is missing a value for sort field: {0}")]
    MissingSeekValue(String),

    #[error("Entity '{0}' has no table or collection source")]
    NoSource(String),

    #[error("View '{0}' has an unusable native query: {1}")]
    InvalidNativeQuery(String, String),

    #[error("View '{0}' uses a schema placeholder but the engine handle has no namespace")]
    MissingNamespace(String),

    #[error("No {helper} registered for entity type '{entity}'")]
    MissingHelper { helper: &'static str, entity: String },

    #[error("Payload is not of the type registered for entity '{0}'")]
    PayloadType(String),

    #[error("Statement has {markers} parameter markers but {binds} binds")]
    BindCountMismatch { markers: usize, binds: usize },
}

/// No binder accepted a target/value/type combination.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "No binder for dialect '{dialect}' (target={target_type}, value={value_type}, userTypeId={type_id})"
)]
pub struct BindingError {
    pub dialect: String,
    pub target_type: &'static str,
    pub value_type: String,
    pub type_id: String,
}

/// Propagation rule violated by the caller's transaction context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransactionStateError {
    #[error("Propagation MANDATORY requires an active transaction")]
    NoActiveTransaction,

    #[error("Propagation NEVER forbids an active transaction")]
    ActiveTransaction,
}

/// Failure reported by the underlying driver.
#[derive(Debug, thiserror::Error)]
#[error("backend error during {operation}: {source}")]
pub struct BackendError {
    pub operation: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl BackendError {
    pub fn new(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Encode/decode failures of the logical type codec.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Unknown userTypeId: {id} (dialectId={dialect})")]
    UnknownType { id: String, dialect: String },

    #[error("Cannot decode {found} as '{type_id}': {message}")]
    Decode {
        type_id: String,
        found: String,
        message: String,
    },

    #[error("Cannot encode {found} as '{type_id}'")]
    Encode { type_id: String, found: String },
}

impl CodecError {
    pub(crate) fn decode(type_id: &str, found: &crate::Value, message: impl Into<String>) -> Self {
        CodecError::Decode {
            type_id: type_id.to_string(),
            found: found.kind().to_string(),
            message: message.into(),
        }
    }
}

/// Authoring metadata lookups and type reference parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthoringError {
    #[error("Unknown authoring type: {0}")]
    UnknownEntity(String),

    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("Invalid type reference '{0}': {1}")]
    InvalidTypeRef(String, String),

    #[error("Entity '{0}' of kind ENTITY requires a source")]
    MissingSource(String),
}

/// Malformed canonical wire form.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    #[error("Invalid query JSON: {0}")]
    Syntax(String),

    #[error("Unknown filter element: {0}")]
    UnknownElement(String),

    #[error("Operator '{0}' expects an object body")]
    OperatorBody(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid {0}: expected {1}")]
    Shape(&'static str, &'static str),
}
