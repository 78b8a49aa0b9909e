//! Authoring lookups.

use std::collections::HashMap;
use std::sync::Arc;

use super::entity::EntityAuthoring;
use super::view::ViewDef;
use crate::error::AuthoringError;

/// Immutable entity/view registry consumed by the engine.
pub trait AuthoringRegistry: Send + Sync {
    fn entity(&self, type_name: &str) -> Result<&EntityAuthoring, AuthoringError>;

    fn view(&self, view_id: &str) -> Result<&ViewDef, AuthoringError>;

    /// Entity owning a view.
    fn entity_for_view(&self, view_id: &str) -> Result<&EntityAuthoring, AuthoringError>;

    fn all_entities(&self) -> Vec<&EntityAuthoring>;
}

/// Registry built once from a list of entities. Views are indexed globally
/// by id.
#[derive(Debug, Default)]
pub struct InMemoryAuthoringRegistry {
    entities: HashMap<String, EntityAuthoring>,
    view_owner: HashMap<String, String>,
}

impl InMemoryAuthoringRegistry {
    pub fn new(entities: impl IntoIterator<Item = EntityAuthoring>) -> Result<Self, AuthoringError> {
        let mut registry = Self::default();
        for ea in entities {
            ea.check()?;
            for view_id in ea.views.keys() {
                registry
                    .view_owner
                    .insert(view_id.clone(), ea.type_name.clone());
            }
            registry.entities.insert(ea.type_name.clone(), ea);
        }
        Ok(registry)
    }

    pub fn into_shared(self) -> Arc<dyn AuthoringRegistry> {
        Arc::new(self)
    }

    pub fn all_views(&self) -> impl Iterator<Item = &ViewDef> {
        self.entities.values().flat_map(|ea| ea.views.values())
    }
}

impl AuthoringRegistry for InMemoryAuthoringRegistry {
    fn entity(&self, type_name: &str) -> Result<&EntityAuthoring, AuthoringError> {
        self.entities
            .get(type_name)
            .ok_or_else(|| AuthoringError::UnknownEntity(type_name.to_string()))
    }

    fn view(&self, view_id: &str) -> Result<&ViewDef, AuthoringError> {
        self.entity_for_view(view_id)?
            .views
            .get(view_id)
            .ok_or_else(|| AuthoringError::UnknownView(view_id.to_string()))
    }

    fn entity_for_view(&self, view_id: &str) -> Result<&EntityAuthoring, AuthoringError> {
        let owner = self
            .view_owner
            .get(view_id)
            .ok_or_else(|| AuthoringError::UnknownView(view_id.to_string()))?;
        self.entity(owner)
    }

    fn all_entities(&self) -> Vec<&EntityAuthoring> {
        self.entities.values().collect()
    }
}
