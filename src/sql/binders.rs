//! Positional parameter binding for SQL drivers.
//!
//! Encoded values become [`SqlArg`]s in a [`BoundParams`] slot list. The
//! global binders cover every dialect; Postgres adds `jsonb` and typed
//! arrays on top.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bind::{element_type_id, BindContext, Binder, BinderProvider, BinderRegistry};
use crate::dml::Bind;
use crate::error::Error;
use crate::value::{Value, ValueKind};

/// A driver-ready argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Plain(Value),
    Timestamp(DateTime<Utc>),
    /// Container serialized as JSON text.
    JsonText(String),
    /// `jsonb` parameter; `None` is SQL NULL.
    Jsonb(Option<String>),
    /// Native array with the element's database type name.
    Array {
        element_type: &'static str,
        items: Vec<Value>,
    },
}

/// 1-based parameter slots of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams {
    slots: Vec<Option<SqlArg>>,
}

impl BoundParams {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            slots: Vec::with_capacity(n),
        }
    }

    /// Fill slot `index` (1-based).
    pub fn set(&mut self, index: usize, arg: SqlArg) {
        let i = index.saturating_sub(1);
        if self.slots.len() <= i {
            self.slots.resize(i + 1, None);
        }
        self.slots[i] = Some(arg);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Arguments in slot order; unfilled slots bind NULL.
    pub fn into_args(self) -> Vec<SqlArg> {
        self.slots
            .into_iter()
            .map(|s| s.unwrap_or(SqlArg::Plain(Value::Null)))
            .collect()
    }
}

fn slot(ctx: &BindContext) -> usize {
    ctx.index().unwrap_or(1)
}

struct InstantBinder;

impl Binder<BoundParams> for InstantBinder {
    fn value_kind(&self) -> Option<ValueKind> {
        Some(ValueKind::Instant)
    }

    fn bind(&self, target: &mut BoundParams, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        if let Value::Instant(t) = encoded {
            target.set(slot(ctx), SqlArg::Timestamp(*t));
        }
        Ok(())
    }
}

/// Lists and sets of dialects without native arrays travel as JSON text.
struct ContainerJsonBinder;

impl Binder<BoundParams> for ContainerJsonBinder {
    fn value_kind(&self) -> Option<ValueKind> {
        Some(ValueKind::List)
    }

    fn supports(&self, _ctx: &BindContext, bind: &Bind, _encoded: &Value) -> bool {
        element_type_id(&bind.type_id).is_some()
    }

    fn bind(&self, target: &mut BoundParams, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        target.set(slot(ctx), SqlArg::JsonText(encoded.to_json().to_string()));
        Ok(())
    }
}

struct PlainBinder;

impl Binder<BoundParams> for PlainBinder {
    fn bind(&self, target: &mut BoundParams, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        target.set(slot(ctx), SqlArg::Plain(encoded.clone()));
        Ok(())
    }
}

/// Binders shared by every SQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlBinders;

impl BinderProvider for SqlBinders {
    fn register(&self, registry: &mut BinderRegistry) {
        registry
            .register_global::<BoundParams>(Arc::new(InstantBinder))
            .register_global::<BoundParams>(Arc::new(ContainerJsonBinder))
            .register_global::<BoundParams>(Arc::new(PlainBinder));
    }
}

struct PgJsonbBinder;

impl Binder<BoundParams> for PgJsonbBinder {
    fn supports(&self, _ctx: &BindContext, bind: &Bind, _encoded: &Value) -> bool {
        bind.type_id == "json"
    }

    fn bind(&self, target: &mut BoundParams, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        let text = match encoded {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_json().to_string()),
        };
        target.set(slot(ctx), SqlArg::Jsonb(text));
        Ok(())
    }
}

struct PgArrayBinder;

impl PgArrayBinder {
    fn element_type(type_id: &str) -> Option<&'static str> {
        match element_type_id(type_id)? {
            "string" => Some("text"),
            "int" => Some("int4"),
            "long" => Some("int8"),
            "double" => Some("float8"),
            "bool" => Some("bool"),
            "uuid" => Some("uuid"),
            _ => None,
        }
    }
}

impl Binder<BoundParams> for PgArrayBinder {
    fn value_kind(&self) -> Option<ValueKind> {
        Some(ValueKind::List)
    }

    fn supports(&self, _ctx: &BindContext, bind: &Bind, _encoded: &Value) -> bool {
        Self::element_type(&bind.type_id).is_some()
    }

    fn bind(&self, target: &mut BoundParams, ctx: &BindContext, bind: &Bind, encoded: &Value) -> Result<(), Error> {
        let element_type = Self::element_type(&bind.type_id).unwrap_or("text");
        target.set(
            slot(ctx),
            SqlArg::Array {
                element_type,
                items: encoded.to_list(),
            },
        );
        Ok(())
    }
}

/// Postgres overrides: `jsonb` for `json`, native arrays for scalar lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresBinders;

impl BinderProvider for PostgresBinders {
    fn register(&self, registry: &mut BinderRegistry) {
        registry
            .register::<BoundParams>("postgres", Arc::new(PgJsonbBinder))
            .register::<BoundParams>("postgres", Arc::new(PgArrayBinder));
    }
}

/// Registry with the global SQL binders and the Postgres overrides.
pub fn default_binders() -> BinderRegistry {
    BinderRegistry::from_providers([&SqlBinders as &dyn BinderProvider, &PostgresBinders])
}
