//! Binders place an already-encoded value into a backend target: a
//! positional parameter slot for SQL, a field path for documents.
//!
//! Binders are registered per dialect id or globally. Resolution walks the
//! dialect's binders in registration order, then the global ones, and takes
//! the first whose target type and value kind match and whose
//! [`Binder::supports`] accepts. Having no match is an error, never a silent
//! skip.

mod registry;

use std::fmt;

use crate::dml::Bind;
use crate::error::Error;
use crate::value::{Value, ValueKind};

pub use registry::{BinderProvider, BinderRegistry};

/// Statement section a value is bound into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Filter,
    Insert,
    UpdateSet,
    UpsertSet,
    UpsertFilter,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpKind::Filter => "FILTER",
            OpKind::Insert => "INSERT",
            OpKind::UpdateSet => "UPDATE_SET",
            OpKind::UpsertSet => "UPSERT_SET",
            OpKind::UpsertFilter => "UPSERT_FILTER",
        })
    }
}

/// Where inside the target the value goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// 1-based parameter index.
    Position(usize),
    /// Dot path inside a document.
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindContext {
    pub op: OpKind,
    pub locator: Locator,
}

impl BindContext {
    pub fn position(op: OpKind, index: usize) -> Self {
        Self {
            op,
            locator: Locator::Position(index),
        }
    }

    pub fn path(op: OpKind, path: impl Into<String>) -> Self {
        Self {
            op,
            locator: Locator::Path(path.into()),
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self.locator {
            Locator::Position(i) => Some(i),
            Locator::Path(_) => None,
        }
    }

    pub fn dot_path(&self) -> Option<&str> {
        match &self.locator {
            Locator::Path(p) => Some(p),
            Locator::Position(_) => None,
        }
    }
}

/// Places values into targets of type `T`.
pub trait Binder<T>: Send + Sync {
    /// Encoded value kind this binder accepts; `None` accepts any.
    fn value_kind(&self) -> Option<ValueKind> {
        None
    }

    fn supports(&self, _ctx: &BindContext, _bind: &Bind, _encoded: &Value) -> bool {
        true
    }

    fn bind(
        &self,
        target: &mut T,
        ctx: &BindContext,
        bind: &Bind,
        encoded: &Value,
    ) -> Result<(), Error>;
}

/// Logical type id with any container wrapper removed, e.g. `uuid` for
/// `list<uuid>`.
pub fn element_type_id(type_id: &str) -> Option<&str> {
    let t = type_id.trim();
    ["list<", "set<", "array<"]
        .iter()
        .find_map(|prefix| t.strip_prefix(prefix))
        .and_then(|rest| rest.strip_suffix('>'))
        .map(str::trim)
}
