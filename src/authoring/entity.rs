//! Entity metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::type_ref::TypeRef;
use super::view::ViewDef;
use crate::error::AuthoringError;

/// Attribute naming the governance keys of a field.
pub const GOVERNANCE_KEY_ATTR: &str = "governanceKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    /// Backed by a table or collection.
    #[default]
    Entity,
    /// Embedded value object without its own source.
    Value,
}

/// One field of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub auto_generated: bool,
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

impl FieldDef {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            key: false,
            auto_generated: false,
            attrs: BTreeMap::new(),
        }
    }

    pub fn scalar(type_id: &str) -> Self {
        Self::new(TypeRef::scalar(type_id))
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// Governance keys from the `governanceKey` attribute (string or list).
    pub fn governance_keys(&self) -> Vec<String> {
        match self.attrs.get(GOVERNANCE_KEY_ATTR) {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::String(s)) => non_blank(s).into_iter().collect(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => non_blank(s),
                    other => non_blank(&other.to_string()),
                })
                .collect(),
            Some(other) => non_blank(&other.to_string()).into_iter().collect(),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Declarative description of an entity: fields and named views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityAuthoring {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub kind: EntityKind,
    #[serde(default)]
    pub source: Option<String>,
    /// Fields in declaration order.
    #[serde(with = "ordered_fields")]
    pub fields: Vec<(String, FieldDef)>,
    #[serde(default)]
    pub views: BTreeMap<String, ViewDef>,
}

impl EntityAuthoring {
    pub fn entity(type_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            kind: EntityKind::Entity,
            source: Some(source.into()),
            fields: Vec::new(),
            views: BTreeMap::new(),
        }
    }

    pub fn value(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            kind: EntityKind::Value,
            source: None,
            fields: Vec::new(),
            views: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.push((name.into(), def));
        self
    }

    pub fn view(mut self, view: ViewDef) -> Self {
        self.views.insert(view.id.clone(), view);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Names of the key fields, in declaration order.
    pub fn key_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.key)
            .map(|(n, _)| n.as_str())
    }

    /// The single key field, or `None` for composite or missing keys.
    pub fn single_key_field(&self) -> Option<&str> {
        let mut keys = self.key_fields();
        let first = keys.next()?;
        keys.next().is_none().then_some(first)
    }

    /// Non-blank source, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Structural checks performed when the entity is registered.
    pub fn check(&self) -> Result<(), AuthoringError> {
        if self.kind == EntityKind::Entity && self.source().is_none() {
            return Err(AuthoringError::MissingSource(self.type_name.clone()));
        }
        Ok(())
    }
}

/// Fields are written as a JSON/TOML table whose key order is the field order.
mod ordered_fields {
    use super::FieldDef;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        fields: &[(String, FieldDef)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (name, def) in fields {
            map.serialize_entry(name, def)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, FieldDef)>, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Vec<(String, FieldDef)>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field name to field definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, def)) = access.next_entry::<String, FieldDef>()? {
                    out.push((name, def));
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}
