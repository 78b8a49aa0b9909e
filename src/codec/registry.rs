//! Type lookup: dialect override, then global, then synthesized container.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::container::{CollectionKind, CollectionType, MapType};
use super::scalar::GlobalUserTypes;
use super::{UserType, UserTypeProvider};
use crate::authoring::TypeRef;
use crate::error::CodecError;
use crate::value::Value;

/// User types visible to one dialect.
#[derive(Debug)]
pub struct UserTypeRegistry {
    dialect_id: String,
    overrides: HashMap<String, Arc<dyn UserType>>,
    global: HashMap<String, Arc<dyn UserType>>,
    synthesized: DashMap<String, Arc<dyn UserType>>,
}

impl UserTypeRegistry {
    /// Compose from providers. Providers scoped to another dialect are
    /// ignored; later registrations win within a scope.
    pub fn new<'a>(
        dialect_id: impl Into<String>,
        providers: impl IntoIterator<Item = &'a dyn UserTypeProvider>,
    ) -> Self {
        let dialect_id = dialect_id.into();
        let mut overrides = HashMap::new();
        let mut global = HashMap::new();
        for provider in providers {
            let scope = match provider.dialect_id() {
                None => &mut global,
                Some(d) if d == dialect_id => &mut overrides,
                Some(_) => continue,
            };
            for ut in provider.user_types() {
                scope.insert(ut.id().to_string(), ut);
            }
        }
        Self {
            dialect_id,
            overrides,
            global,
            synthesized: DashMap::new(),
        }
    }

    /// Global scalar types only.
    pub fn with_defaults(dialect_id: impl Into<String>) -> Self {
        Self::new(dialect_id, [&GlobalUserTypes as &dyn UserTypeProvider])
    }

    pub fn dialect_id(&self) -> &str {
        &self.dialect_id
    }

    pub fn get(&self, type_id: &str) -> Result<Arc<dyn UserType>, CodecError> {
        let id = type_id.trim();
        if let Some(ut) = self.overrides.get(id).or_else(|| self.global.get(id)) {
            return Ok(ut.clone());
        }
        if let Some(ut) = self.synthesized.get(id) {
            return Ok(ut.clone());
        }
        // Built outside the map lock: synthesis recurses into `get`.
        let built = self.synthesize(id)?;
        Ok(self
            .synthesized
            .entry(id.to_string())
            .or_insert(built)
            .clone())
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.get(type_id).is_ok()
    }

    pub fn encode(&self, type_id: &str, logical: &Value) -> Result<Value, CodecError> {
        self.get(type_id)?.encode(logical)
    }

    pub fn decode(&self, type_id: &str, native: &Value) -> Result<Value, CodecError> {
        self.get(type_id)?.decode(native)
    }

    fn synthesize(&self, id: &str) -> Result<Arc<dyn UserType>, CodecError> {
        let unknown = || CodecError::UnknownType {
            id: id.to_string(),
            dialect: self.dialect_id.clone(),
        };
        let parsed = TypeRef::parse(id).map_err(|_| unknown())?;
        let collection = |kind, elem: &TypeRef| -> Result<Arc<dyn UserType>, CodecError> {
            let elem = self.get(&elem.type_id())?;
            Ok(Arc::new(CollectionType::new(id, kind, elem)))
        };
        match &parsed {
            TypeRef::List(e) => collection(CollectionKind::List, e),
            TypeRef::Set(e) => collection(CollectionKind::Set, e),
            TypeRef::Array(e) => collection(CollectionKind::Array, e),
            TypeRef::Map(k, v) => {
                let key = self.get(&k.type_id())?;
                let value = self.get(&v.type_id())?;
                Ok(Arc::new(MapType::new(id, key, value)))
            }
            TypeRef::Scalar(s) if s != id => self.get(s),
            _ => Err(unknown()),
        }
    }
}
