//! Row adapters: uniform read access to one result row or document.
//!
//! Row decoders read property paths (`status`, `customer.name`) without
//! knowing how the backend labelled them. [`ViewMappedRow`] translates paths
//! to labels through the view mapping; [`MapRow`] is the plain backing store
//! for rows the drivers hand back as documents.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::authoring::{MappingMode, ViewDef};
use crate::codec::UserTypeRegistry;
use crate::error::{CodecError, Error};
use crate::value::{Document, Value};

/// Read access to one row.
pub trait RowAdapter {
    fn user_types(&self) -> &UserTypeRegistry;

    /// Native value at `path`; `Null` when absent.
    fn raw(&self, path: &str) -> Value;

    /// Whether the row carries `path` at all, null or not.
    fn has(&self, path: &str) -> bool;

    fn is_null(&self, path: &str) -> bool {
        self.raw(path).is_null()
    }

    /// Decode the value at `path` through the registered user type.
    fn decode(&self, path: &str, type_id: &str) -> Result<Value, Error> {
        Ok(self.user_types().decode(type_id, &self.raw(path))?)
    }

    /// Adapter over the nested object at `prefix` (e.g. `customer.`), or
    /// `None` when the object is absent.
    fn object(&self, prefix: &str) -> Option<Box<dyn RowAdapter + '_>>;

    /// Map stored at `path`. JSON text is parsed.
    fn map(&self, path: &str) -> Result<Option<Document>, Error> {
        match self.decode(path, "json")? {
            Value::Null => Ok(None),
            Value::Map(m) => Ok(Some(m)),
            other => Err(CodecError::decode("json", &other, format!("not a map at '{path}'")).into()),
        }
    }
}

/// Row backed by a document. Paths resolve as a literal key first, then as
/// a dot path through nested maps.
#[derive(Debug)]
pub struct MapRow<'t> {
    doc: Document,
    user_types: &'t UserTypeRegistry,
}

impl<'t> MapRow<'t> {
    pub fn new(doc: Document, user_types: &'t UserTypeRegistry) -> Self {
        Self { doc, user_types }
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.doc.get(path) {
            return Some(v);
        }
        let (head, rest) = path.split_once('.')?;
        self.doc.get(head)?.get_path(rest)
    }
}

impl RowAdapter for MapRow<'_> {
    fn user_types(&self) -> &UserTypeRegistry {
        self.user_types
    }

    fn raw(&self, path: &str) -> Value {
        self.lookup(path).cloned().unwrap_or(Value::Null)
    }

    fn has(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    fn object(&self, prefix: &str) -> Option<Box<dyn RowAdapter + '_>> {
        Some(Box::new(PrefixedRow::new(self, prefix)))
    }
}

/// Prepends a prefix to every path before delegating.
pub struct PrefixedRow<'a> {
    base: &'a dyn RowAdapter,
    prefix: String,
}

impl<'a> PrefixedRow<'a> {
    pub fn new(base: &'a dyn RowAdapter, prefix: impl Into<String>) -> Self {
        Self {
            base,
            prefix: prefix.into(),
        }
    }

    fn full(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }
}

impl RowAdapter for PrefixedRow<'_> {
    fn user_types(&self) -> &UserTypeRegistry {
        self.base.user_types()
    }

    fn raw(&self, path: &str) -> Value {
        self.base.raw(&self.full(path))
    }

    fn has(&self, path: &str) -> bool {
        self.base.has(&self.full(path))
    }

    fn object(&self, prefix: &str) -> Option<Box<dyn RowAdapter + '_>> {
        Some(Box::new(PrefixedRow::new(self.base, self.full(prefix))))
    }
}

/// Resolves property paths to row labels through a view.
///
/// A path resolves to its declared label, else to itself when the row has
/// it, else to the last segment of its mapped column (`t.status` reads
/// `status`). Objects mapped in blob mode are decoded from their JSON
/// column and read as documents.
pub struct ViewMappedRow<'a> {
    base: &'a dyn RowAdapter,
    view: &'a ViewDef,
    labels: Cow<'a, BTreeMap<String, String>>,
    prefix: String,
}

impl<'a> ViewMappedRow<'a> {
    pub fn new(base: &'a dyn RowAdapter, view: &'a ViewDef) -> Self {
        Self {
            base,
            view,
            labels: Cow::Owned(view.labels()),
            prefix: String::new(),
        }
    }

    fn label_for(&self, path: &str) -> String {
        self.label_for_full(&format!("{}{}", self.prefix, path))
    }

    fn label_for_full(&self, full: &str) -> String {
        if let Some(label) = self.labels.get(full) {
            return label.clone();
        }
        if self.base.has(full) {
            return full.to_string();
        }
        self.view
            .explicit_ref(full)
            .and_then(label_from_ref)
            .unwrap_or_else(|| full.to_string())
    }
}

fn label_from_ref(target: &str) -> Option<String> {
    let t = target.trim();
    let last = match t.rfind('.') {
        Some(dot) if dot + 1 < t.len() => &t[dot + 1..],
        _ => t,
    };
    if last.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        return None;
    }
    Some(last.to_string())
}

impl RowAdapter for ViewMappedRow<'_> {
    fn user_types(&self) -> &UserTypeRegistry {
        self.base.user_types()
    }

    fn raw(&self, path: &str) -> Value {
        self.base.raw(&self.label_for(path))
    }

    fn has(&self, path: &str) -> bool {
        self.base.has(&self.label_for(path))
    }

    fn object(&self, prefix: &str) -> Option<Box<dyn RowAdapter + '_>> {
        let next = format!("{}{}", self.prefix, prefix);
        let root = next.trim_end_matches('.');
        if !root.is_empty() && self.view.mode(root) == MappingMode::Blob {
            let label = self.label_for_full(root);
            return match self.base.decode(&label, "json") {
                Ok(Value::Map(doc)) => Some(Box::new(MapRow::new(doc, self.user_types()))),
                _ => None,
            };
        }
        Some(Box::new(ViewMappedRow {
            base: self.base,
            view: self.view,
            labels: Cow::Borrowed(&*self.labels),
            prefix: next,
        }))
    }
}
