//! Container types synthesized from `list<T>`, `set<T>`, `array<T>` and
//! `map<K,V>` ids.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::UserType;
use crate::error::CodecError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    /// Deduplicated, first occurrence wins.
    Set,
    Array,
}

/// Homogeneous collection whose elements go through an inner type.
#[derive(Debug)]
pub struct CollectionType {
    id: String,
    kind: CollectionKind,
    elem: Arc<dyn UserType>,
}

impl CollectionType {
    pub fn new(id: impl Into<String>, kind: CollectionKind, elem: Arc<dyn UserType>) -> Self {
        Self {
            id: id.into(),
            kind,
            elem,
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Accepts lists, JSON arrays, JSON array text, or a single value.
    fn items(&self, v: &Value) -> Vec<Value> {
        match v {
            Value::String(s) if s.trim_start().starts_with('[') => {
                match serde_json::from_str::<serde_json::Value>(s) {
                    Ok(json @ serde_json::Value::Array(_)) => Value::from_json(&json).to_list(),
                    _ => vec![v.clone()],
                }
            }
            other => other.to_list(),
        }
    }

    fn collect(&self, items: Vec<Value>) -> Value {
        if self.kind != CollectionKind::Set {
            return Value::List(items);
        }
        let mut unique: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Value::List(unique)
    }
}

impl UserType for CollectionType {
    fn id(&self) -> &str {
        &self.id
    }

    fn decode(&self, native: &Value) -> Result<Value, CodecError> {
        if native.is_null() {
            return Ok(Value::Null);
        }
        let items = self
            .items(native)
            .iter()
            .map(|item| self.elem.decode(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.collect(items))
    }

    fn encode(&self, logical: &Value) -> Result<Value, CodecError> {
        if logical.is_null() {
            return Ok(Value::Null);
        }
        let items = self
            .items(logical)
            .iter()
            .map(|item| self.elem.encode(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.collect(items))
    }
}

/// String-keyed map whose keys and values go through inner types.
#[derive(Debug)]
pub struct MapType {
    id: String,
    key: Arc<dyn UserType>,
    value: Arc<dyn UserType>,
}

impl MapType {
    pub fn new(id: impl Into<String>, key: Arc<dyn UserType>, value: Arc<dyn UserType>) -> Self {
        Self {
            id: id.into(),
            key,
            value,
        }
    }

    fn entries(&self, v: &Value) -> Result<BTreeMap<String, Value>, CodecError> {
        let not_a_map = || CodecError::decode(&self.id, v, "not a map");
        match v {
            Value::Map(m) => Ok(m.clone()),
            Value::Json(json @ serde_json::Value::Object(_)) => match Value::from_json(json) {
                Value::Map(m) => Ok(m),
                _ => Err(not_a_map()),
            },
            Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
                Ok(json @ serde_json::Value::Object(_)) => match Value::from_json(&json) {
                    Value::Map(m) => Ok(m),
                    _ => Err(not_a_map()),
                },
                _ => Err(not_a_map()),
            },
            _ => Err(not_a_map()),
        }
    }

    fn convert(
        &self,
        v: &Value,
        f: impl Fn(&dyn UserType, &Value) -> Result<Value, CodecError>,
    ) -> Result<Value, CodecError> {
        if v.is_null() {
            return Ok(Value::Null);
        }
        let mut out = BTreeMap::new();
        for (k, item) in self.entries(v)? {
            let key = f(self.key.as_ref(), &Value::String(k))?;
            out.insert(key.to_string(), f(self.value.as_ref(), &item)?);
        }
        Ok(Value::Map(out))
    }
}

impl UserType for MapType {
    fn id(&self) -> &str {
        &self.id
    }

    fn decode(&self, native: &Value) -> Result<Value, CodecError> {
        self.convert(native, |t, v| t.decode(v))
    }

    fn encode(&self, logical: &Value) -> Result<Value, CodecError> {
        self.convert(logical, |t, v| t.encode(v))
    }
}
