//! Binder registration and lookup.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{BindContext, Binder};
use crate::dml::Bind;
use crate::error::{BindingError, Error};
use crate::value::Value;

/// A type-erased `Arc<dyn Binder<T>>` tagged with `T`.
struct Entry {
    target: TypeId,
    binder: Box<dyn Any + Send + Sync>,
}

impl Entry {
    fn new<T: 'static>(binder: Arc<dyn Binder<T>>) -> Self {
        Self {
            target: TypeId::of::<T>(),
            binder: Box::new(binder),
        }
    }

    fn binder<T: 'static>(&self) -> Option<&Arc<dyn Binder<T>>> {
        if self.target != TypeId::of::<T>() {
            return None;
        }
        self.binder.downcast_ref::<Arc<dyn Binder<T>>>()
    }
}

/// Contributes binders, either globally or for one dialect.
pub trait BinderProvider {
    fn register(&self, registry: &mut BinderRegistry);
}

/// Binders grouped per dialect id plus a global group.
#[derive(Default)]
pub struct BinderRegistry {
    by_dialect: HashMap<String, Vec<Entry>>,
    global: Vec<Entry>,
}

impl fmt::Debug for BinderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dialects: HashMap<&str, usize> = self
            .by_dialect
            .iter()
            .map(|(d, entries)| (d.as_str(), entries.len()))
            .collect();
        f.debug_struct("BinderRegistry")
            .field("by_dialect", &dialects)
            .field("global", &self.global.len())
            .finish()
    }
}

impl BinderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_providers<'a>(providers: impl IntoIterator<Item = &'a dyn BinderProvider>) -> Self {
        let mut registry = Self::new();
        for provider in providers {
            provider.register(&mut registry);
        }
        registry
    }

    /// Register a binder for one dialect, after the ones already present.
    pub fn register<T: 'static>(&mut self, dialect: &str, binder: Arc<dyn Binder<T>>) -> &mut Self {
        self.by_dialect
            .entry(dialect.to_string())
            .or_default()
            .push(Entry::new(binder));
        self
    }

    pub fn register_global<T: 'static>(&mut self, binder: Arc<dyn Binder<T>>) -> &mut Self {
        self.global.push(Entry::new(binder));
        self
    }

    /// Bind with the first matching binder.
    pub fn bind<T: 'static>(
        &self,
        dialect: &str,
        target: &mut T,
        ctx: &BindContext,
        bind: &Bind,
        encoded: &Value,
    ) -> Result<(), Error> {
        let scoped = self.by_dialect.get(dialect).map(Vec::as_slice).unwrap_or_default();
        let binder = scoped
            .iter()
            .chain(self.global.iter())
            .filter_map(Entry::binder::<T>)
            .find(|b| {
                b.value_kind().map_or(true, |k| k == encoded.kind()) && b.supports(ctx, bind, encoded)
            })
            .ok_or_else(|| BindingError {
                dialect: dialect.to_string(),
                target_type: short_type_name::<T>(),
                value_type: encoded.kind().to_string(),
                type_id: bind.type_id.clone(),
            })?;
        binder.bind(target, ctx, bind, encoded)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}
