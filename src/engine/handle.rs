//! Engine identity and the entity/view pair an operation targets.

use serde::{Deserialize, Serialize};

/// Identity of one configured engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineHandle {
    pub id: String,
    /// Substituted for `{schema}` in native view queries that ask for it.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub multi_tenant: bool,
}

impl EngineHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: None,
            multi_tenant: false,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn multi_tenant(mut self, on: bool) -> Self {
        self.multi_tenant = on;
        self
    }
}

/// Entity type plus the view an operation reads or writes through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityViewRef {
    pub type_name: String,
    pub view_id: String,
}

impl EntityViewRef {
    pub fn new(type_name: impl Into<String>, view_id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            view_id: view_id.into(),
        }
    }
}
