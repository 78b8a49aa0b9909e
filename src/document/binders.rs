//! Binders placing encoded values into documents at a dot path.
//!
//! Coercing binders run first and hand their result to the path binder.
//! Uuids are stored as strings; instants are stored as instants whether
//! they arrive as instants, RFC 3339 text or epoch millis.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::bind::{BindContext, Binder, BinderProvider, BinderRegistry};
use crate::dml::Bind;
use crate::error::{CodecError, Error};
use crate::value::{set_path, Document, Value};

use super::DIALECT_ID;

fn bound_path(ctx: &BindContext) -> Option<&str> {
    ctx.dot_path().filter(|p| !p.trim().is_empty())
}

fn type_in(bind: &Bind, ids: &[&str]) -> bool {
    let t = bind.type_id.trim().to_ascii_lowercase();
    ids.contains(&t.as_str())
}

fn put(target: &mut Document, ctx: &BindContext, value: Value) {
    if let Some(path) = bound_path(ctx) {
        set_path(target, path, value);
    }
}

/// `_id` and `id` hold uuids as strings.
struct IdBinder;

impl Binder<Document> for IdBinder {
    fn supports(&self, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> bool {
        matches!(bound_path(ctx), Some("_id" | "id"))
            && matches!(encoded, Value::Uuid(_) | Value::String(_))
    }

    fn bind(&self, target: &mut Document, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        put(target, ctx, uuid_text(encoded));
        Ok(())
    }
}

struct UuidBinder;

impl Binder<Document> for UuidBinder {
    fn supports(&self, ctx: &BindContext, bind: &Bind, _encoded: &Value) -> bool {
        bound_path(ctx).is_some() && type_in(bind, &["uuid", "list<uuid>", "set<uuid>"])
    }

    fn bind(&self, target: &mut Document, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        put(target, ctx, uuid_text(encoded));
        Ok(())
    }
}

fn uuid_text(v: &Value) -> Value {
    match v {
        Value::Uuid(u) => Value::String(u.to_string()),
        Value::List(items) => Value::List(items.iter().map(uuid_text).collect()),
        other => other.clone(),
    }
}

struct InstantBinder;

impl Binder<Document> for InstantBinder {
    fn supports(&self, ctx: &BindContext, bind: &Bind, _encoded: &Value) -> bool {
        bound_path(ctx).is_some() && type_in(bind, &["instant", "list<instant>", "set<instant>"])
    }

    fn bind(&self, target: &mut Document, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        let value = instant(encoded)?;
        put(target, ctx, value);
        Ok(())
    }
}

fn instant(v: &Value) -> Result<Value, CodecError> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|t| Value::Instant(t.with_timezone(&Utc)))
            .map_err(|e| CodecError::decode("instant", v, e.to_string())),
        Value::Int(_) | Value::Long(_) => {
            let ms = v.as_i64().unwrap_or_default();
            Utc.timestamp_millis_opt(ms)
                .single()
                .map(Value::Instant)
                .ok_or_else(|| CodecError::decode("instant", v, "epoch millis out of range"))
        }
        Value::List(items) => items.iter().map(instant).collect::<Result<_, _>>().map(Value::List),
        other => Ok(other.clone()),
    }
}

/// Writes the value at the context path, creating intermediate documents.
struct PathBinder;

impl Binder<Document> for PathBinder {
    fn supports(&self, ctx: &BindContext, _bind: &Bind, _encoded: &Value) -> bool {
        bound_path(ctx).is_some()
    }

    fn bind(&self, target: &mut Document, ctx: &BindContext, _bind: &Bind, encoded: &Value) -> Result<(), Error> {
        put(target, ctx, encoded.clone());
        Ok(())
    }
}

/// Document binders, registered under the document dialect id.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentBinders;

impl BinderProvider for DocumentBinders {
    fn register(&self, registry: &mut BinderRegistry) {
        registry
            .register::<Document>(DIALECT_ID, Arc::new(IdBinder))
            .register::<Document>(DIALECT_ID, Arc::new(UuidBinder))
            .register::<Document>(DIALECT_ID, Arc::new(InstantBinder))
            .register::<Document>(DIALECT_ID, Arc::new(PathBinder));
    }
}

pub fn document_binders() -> BinderRegistry {
    BinderRegistry::from_providers([&DocumentBinders as &dyn BinderProvider])
}
