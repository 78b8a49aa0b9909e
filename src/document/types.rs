//! User type overrides for the document family.

use std::sync::Arc;

use crate::codec::{GlobalUserTypes, UserType, UserTypeProvider, UserTypeRegistry};
use crate::error::CodecError;
use crate::value::Value;

use super::DIALECT_ID;

/// `json` kept as native maps and lists so path operators can reach inside.
///
/// JSON text from legacy data decodes as parsed JSON when it parses and is
/// otherwise left as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentJsonType;

impl UserType for DocumentJsonType {
    fn id(&self) -> &str {
        "json"
    }

    fn decode(&self, native: &Value) -> Result<Value, CodecError> {
        Ok(match native {
            Value::Json(j) => Value::from_json(j),
            Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
                Ok(parsed @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                    Value::from_json(&parsed)
                }
                _ => Value::String(s.clone()),
            },
            other => other.clone(),
        })
    }

    fn encode(&self, logical: &Value) -> Result<Value, CodecError> {
        Ok(match logical {
            Value::Json(j) => Value::from_json(j),
            other => other.clone(),
        })
    }
}

/// Provider of the document-family overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentUserTypes;

impl UserTypeProvider for DocumentUserTypes {
    fn dialect_id(&self) -> Option<&str> {
        Some(DIALECT_ID)
    }

    fn user_types(&self) -> Vec<Arc<dyn UserType>> {
        vec![Arc::new(DocumentJsonType)]
    }
}

/// Global scalars plus the document overrides.
pub fn document_user_types() -> UserTypeRegistry {
    UserTypeRegistry::new(
        DIALECT_ID,
        [&GlobalUserTypes as &dyn UserTypeProvider, &DocumentUserTypes],
    )
}
