//! Per-entity helpers: reading fields off a payload, writing generated keys
//! back, and materializing payloads from rows.
//!
//! Payloads are passed as `&dyn Any`; each helper downcasts to the concrete
//! type it was registered for. Helpers are registered explicitly at start-up
//! under the entity type name.
//!
//! [`DocumentHelpers`] handles entities carried as plain [`Document`]s and
//! is what the tests and schemaless callers use.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::authoring::{AuthoringRegistry, EntityAuthoring, TypeRef};
use crate::engine::row::RowAdapter;
use crate::error::{Error, PlanningError};
use crate::value::{set_path, Document, Value};

/// Reads fields off a payload.
pub trait Accessor: Send + Sync {
    /// Value of a top-level field; `Null` when absent or unset.
    fn get(&self, entity: &dyn Any, field: &str) -> Value;

    /// Whether the payload marks `field` as explicitly null, meaning "write
    /// null" rather than "leave unchanged".
    fn is_explicit_null(&self, _entity: &dyn Any, _field: &str) -> bool {
        false
    }

    /// Nested payload of a reference field, read with the referenced
    /// entity's accessor.
    fn child<'a>(&self, _entity: &'a dyn Any, _field: &str) -> Option<&'a dyn Any> {
        None
    }
}

/// Writes values back into a payload.
pub trait Mutator: Send + Sync {
    fn set(&self, entity: &mut dyn Any, field: &str, value: Value) -> Result<(), Error>;
}

/// Materializes one payload from a row.
pub trait RowDecoder: Send + Sync {
    fn read(&self, row: &dyn RowAdapter) -> Result<Box<dyn Any + Send>, Error>;
}

/// Helpers registered for one entity type. Any of them may be missing; the
/// operations that need one fail with [`PlanningError::MissingHelper`].
#[derive(Clone, Default)]
pub struct EntityHelpers {
    pub accessor: Option<Arc<dyn Accessor>>,
    pub mutator: Option<Arc<dyn Mutator>>,
    pub decoder: Option<Arc<dyn RowDecoder>>,
}

impl EntityHelpers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accessor(mut self, accessor: Arc<dyn Accessor>) -> Self {
        self.accessor = Some(accessor);
        self
    }

    pub fn with_mutator(mut self, mutator: Arc<dyn Mutator>) -> Self {
        self.mutator = Some(mutator);
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn RowDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }
}

impl std::fmt::Debug for EntityHelpers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHelpers")
            .field("accessor", &self.accessor.is_some())
            .field("mutator", &self.mutator.is_some())
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}

/// Helpers keyed by entity type name.
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    by_type: HashMap<String, EntityHelpers>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_name: impl Into<String>, helpers: EntityHelpers) -> &mut Self {
        self.by_type.insert(type_name.into(), helpers);
        self
    }

    /// Register [`DocumentHelpers`] for every entity of the registry.
    pub fn register_documents(&mut self, authoring: &dyn AuthoringRegistry) -> &mut Self {
        for ea in authoring.all_entities() {
            let helpers = DocumentHelpers::from_authoring(ea, authoring).into_helpers();
            self.register(ea.type_name.clone(), helpers);
        }
        self
    }

    pub fn accessor(&self, ea: &EntityAuthoring) -> Result<&dyn Accessor, PlanningError> {
        self.get(ea)
            .and_then(|h| h.accessor.as_deref())
            .ok_or_else(|| missing("accessor", ea))
    }

    pub fn mutator(&self, ea: &EntityAuthoring) -> Result<&dyn Mutator, PlanningError> {
        self.get(ea)
            .and_then(|h| h.mutator.as_deref())
            .ok_or_else(|| missing("mutator", ea))
    }

    pub fn decoder(&self, ea: &EntityAuthoring) -> Result<&dyn RowDecoder, PlanningError> {
        self.get(ea)
            .and_then(|h| h.decoder.as_deref())
            .ok_or_else(|| missing("row decoder", ea))
    }

    fn get(&self, ea: &EntityAuthoring) -> Option<&EntityHelpers> {
        self.by_type.get(&ea.type_name)
    }
}

fn missing(helper: &'static str, ea: &EntityAuthoring) -> PlanningError {
    PlanningError::MissingHelper {
        helper,
        entity: ea.type_name.clone(),
    }
}

/// Helpers for entities carried as [`Document`]s.
///
/// A key holding `Value::Null` is an explicit null. Reference fields are
/// nested documents. Rows decode field by field through each field's type;
/// fields the row does not carry are left out.
#[derive(Debug, Clone)]
pub struct DocumentHelpers {
    type_name: String,
    fields: Vec<DocumentField>,
}

#[derive(Debug, Clone)]
enum DocumentField {
    Plain { name: String, type_id: String },
    Nested { name: String, children: Vec<(String, String)> },
}

impl DocumentHelpers {
    pub fn from_authoring(ea: &EntityAuthoring, authoring: &dyn AuthoringRegistry) -> Self {
        let fields = ea
            .fields
            .iter()
            .map(|(name, def)| match &def.ty {
                TypeRef::Ref(target) => DocumentField::Nested {
                    name: name.clone(),
                    children: authoring
                        .entity(target)
                        .map(|child| {
                            child
                                .fields
                                .iter()
                                .filter(|(_, f)| !matches!(f.ty, TypeRef::Ref(_)))
                                .map(|(n, f)| (n.clone(), f.ty.type_id()))
                                .collect()
                        })
                        .unwrap_or_default(),
                },
                other => DocumentField::Plain {
                    name: name.clone(),
                    type_id: other.type_id(),
                },
            })
            .collect();
        Self {
            type_name: ea.type_name.clone(),
            fields,
        }
    }

    pub fn into_helpers(self) -> EntityHelpers {
        let h = Arc::new(self);
        EntityHelpers::new()
            .with_accessor(h.clone())
            .with_mutator(h.clone())
            .with_decoder(h)
    }

    fn doc<'a>(&self, entity: &'a dyn Any) -> Option<&'a Document> {
        entity.downcast_ref::<Document>()
    }
}

impl Accessor for DocumentHelpers {
    fn get(&self, entity: &dyn Any, field: &str) -> Value {
        self.doc(entity)
            .and_then(|d| d.get(field))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn is_explicit_null(&self, entity: &dyn Any, field: &str) -> bool {
        matches!(self.doc(entity).and_then(|d| d.get(field)), Some(Value::Null))
    }

    fn child<'a>(&self, entity: &'a dyn Any, field: &str) -> Option<&'a dyn Any> {
        match self.doc(entity)?.get(field)? {
            Value::Map(m) => Some(m as &dyn Any),
            _ => None,
        }
    }
}

impl Mutator for DocumentHelpers {
    fn set(&self, entity: &mut dyn Any, field: &str, value: Value) -> Result<(), Error> {
        let doc = entity
            .downcast_mut::<Document>()
            .ok_or_else(|| PlanningError::PayloadType(self.type_name.clone()))?;
        set_path(doc, field, value);
        Ok(())
    }
}

impl RowDecoder for DocumentHelpers {
    fn read(&self, row: &dyn RowAdapter) -> Result<Box<dyn Any + Send>, Error> {
        let mut out = Document::new();
        for field in &self.fields {
            match field {
                DocumentField::Plain { name, type_id } => {
                    if row.has(name) {
                        out.insert(name.clone(), row.decode(name, type_id)?);
                    }
                }
                DocumentField::Nested { name, children } => {
                    let Some(child) = row.object(&format!("{name}.")) else {
                        continue;
                    };
                    let mut nested = Document::new();
                    for (child_name, type_id) in children {
                        if child.has(child_name) {
                            nested.insert(child_name.clone(), child.decode(child_name, type_id)?);
                        }
                    }
                    if !nested.is_empty() {
                        out.insert(name.clone(), Value::Map(nested));
                    }
                }
            }
        }
        Ok(Box::new(out))
    }
}
