//! Row adapter for documents read through a view.

use crate::authoring::{MappingMode, ViewDef};
use crate::codec::UserTypeRegistry;
use crate::dml::PathPolicy;
use crate::engine::row::{MapRow, RowAdapter};
use crate::value::Value;

/// Resolves property paths through explicit view mappings; unmapped paths
/// read the document under the property's own name.
pub struct DocumentRow<'a> {
    base: &'a dyn RowAdapter,
    view: &'a ViewDef,
    prefix: String,
}

impl<'a> DocumentRow<'a> {
    pub fn new(base: &'a dyn RowAdapter, view: &'a ViewDef) -> Self {
        Self {
            base,
            view,
            prefix: String::new(),
        }
    }

    fn resolve(&self, path: &str) -> String {
        PathPolicy::Explicit.column(self.view, &format!("{}{}", self.prefix, path))
    }
}

impl RowAdapter for DocumentRow<'_> {
    fn user_types(&self) -> &UserTypeRegistry {
        self.base.user_types()
    }

    fn raw(&self, path: &str) -> Value {
        self.base.raw(&self.resolve(path))
    }

    fn has(&self, path: &str) -> bool {
        self.base.has(&self.resolve(path))
    }

    fn object(&self, prefix: &str) -> Option<Box<dyn RowAdapter + '_>> {
        let next = format!("{}{}", self.prefix, prefix);
        let root = next.trim_end_matches('.');
        if !root.is_empty() && self.view.mode(root) == MappingMode::Blob {
            let stored = PathPolicy::Explicit.column(self.view, root);
            return match self.base.decode(&stored, "json") {
                Ok(Value::Map(doc)) => Some(Box::new(MapRow::new(doc, self.user_types()))),
                _ => None,
            };
        }
        Some(Box::new(DocumentRow {
            base: self.base,
            view: self.view,
            prefix: next,
        }))
    }
}
