//! Built-in scalar logical types.
//!
//! Decoding is deliberately loose: numeric kinds convert into each other when
//! lossless, numeric and boolean text is parsed, and a blank string decodes to
//! null.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use super::{UserType, UserTypeProvider};
use crate::error::CodecError;
use crate::value::Value;

/// The global scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Int,
    Long,
    Bool,
    Double,
    Uuid,
    Instant,
    Json,
}

impl ScalarType {
    pub const ALL: [ScalarType; 8] = [
        ScalarType::String,
        ScalarType::Int,
        ScalarType::Long,
        ScalarType::Bool,
        ScalarType::Double,
        ScalarType::Uuid,
        ScalarType::Instant,
        ScalarType::Json,
    ];

    pub fn type_id(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Int => "int",
            ScalarType::Long => "long",
            ScalarType::Bool => "bool",
            ScalarType::Double => "double",
            ScalarType::Uuid => "uuid",
            ScalarType::Instant => "instant",
            ScalarType::Json => "json",
        }
    }

    fn coerce(self, v: &Value) -> Result<Value, CodecError> {
        if v.is_null() {
            return Ok(Value::Null);
        }
        // Scalars wrapped in a JSON payload decode like their plain form.
        if let Value::Json(j) = v {
            if !matches!(self, ScalarType::Json) && !j.is_object() && !j.is_array() {
                return self.coerce(&Value::from_json(j));
            }
        }
        let id = self.type_id();
        let fail = |msg: &str| CodecError::decode(id, v, msg);
        match self {
            ScalarType::String => match v {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::List(_) | Value::Map(_) | Value::Json(_) => Err(fail("not a scalar")),
                other => Ok(Value::String(other.to_string())),
            },
            ScalarType::Int => {
                let n = integral(v).map_err(|m| fail(&m))?;
                match n {
                    None => Ok(Value::Null),
                    Some(n) => i32::try_from(n)
                        .map(Value::Int)
                        .map_err(|_| fail("out of range for int")),
                }
            }
            ScalarType::Long => Ok(integral(v).map_err(|m| fail(&m))?.into()),
            ScalarType::Double => match v {
                Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|e| fail(&e.to_string())),
                other => other
                    .as_f64()
                    .map(Value::Double)
                    .ok_or_else(|| fail("not numeric")),
            },
            ScalarType::Bool => match v {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "" => Ok(Value::Null),
                    "true" | "1" => Ok(Value::Bool(true)),
                    "false" | "0" => Ok(Value::Bool(false)),
                    _ => Err(fail("not a boolean")),
                },
                other => match other.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(fail("not a boolean")),
                },
            },
            ScalarType::Uuid => match v {
                Value::Uuid(u) => Ok(Value::Uuid(*u)),
                Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
                Value::String(s) => Uuid::parse_str(s.trim())
                    .map(Value::Uuid)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not a uuid")),
            },
            ScalarType::Instant => match v {
                Value::Instant(t) => Ok(Value::Instant(*t)),
                Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
                Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                    .map(|t| Value::Instant(t.with_timezone(&Utc)))
                    .map_err(|e| fail(&e.to_string())),
                other => match other.as_i64() {
                    Some(ms) => Utc
                        .timestamp_millis_opt(ms)
                        .single()
                        .map(Value::Instant)
                        .ok_or_else(|| fail("epoch millis out of range")),
                    None => Err(fail("not an instant")),
                },
            },
            ScalarType::Json => Ok(match v {
                Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
                    Ok(parsed) => Value::from_json(&parsed),
                    Err(_) => Value::String(s.clone()),
                },
                Value::Json(j) => Value::from_json(j),
                other => other.clone(),
            }),
        }
    }
}

fn integral(v: &Value) -> Result<Option<i64>, String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(None);
            }
            if let Ok(n) = t.parse::<i64>() {
                return Ok(Some(n));
            }
            match t.parse::<f64>() {
                Ok(d) if d.fract() == 0.0 => Ok(Some(d as i64)),
                _ => Err(format!("'{t}' is not an integer")),
            }
        }
        other => other
            .as_i64()
            .map(Some)
            .ok_or_else(|| "not an integer".to_string()),
    }
}

impl UserType for ScalarType {
    fn id(&self) -> &str {
        self.type_id()
    }

    fn decode(&self, native: &Value) -> Result<Value, CodecError> {
        self.coerce(native)
    }

    fn encode(&self, logical: &Value) -> Result<Value, CodecError> {
        match self {
            // Non-string JSON is stored as JSON text.
            ScalarType::Json => Ok(match logical {
                Value::Null => Value::Null,
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_json().to_string()),
            }),
            other => other.coerce(logical).map_err(|_| CodecError::Encode {
                type_id: other.id().to_string(),
                found: logical.kind().to_string(),
            }),
        }
    }
}

/// Provider of the global scalar types.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalUserTypes;

impl UserTypeProvider for GlobalUserTypes {
    fn dialect_id(&self) -> Option<&str> {
        None
    }

    fn user_types(&self) -> Vec<Arc<dyn UserType>> {
        ScalarType::ALL
            .iter()
            .map(|t| Arc::new(*t) as Arc<dyn UserType>)
            .collect()
    }
}
