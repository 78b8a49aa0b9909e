//! Views: property path to column/document-path mappings plus an optional
//! native base query.

use std::collections::BTreeMap;

use inflector::cases::snakecase::to_snake_case;
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the engine namespace when
/// [`NativeQuery::schema`] is set.
pub const SCHEMA_PLACEHOLDER: &str = "{schema}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    #[default]
    Structured,
    /// Nested object stored as one opaque value.
    Blob,
}

/// Mapping of one property path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingSpec {
    Column(String),
    Detailed(MappingDetail),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MappingDetail {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MappingMode>,
    /// Child field mappings used to flatten a referenced entity.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, MappingSpec>,
}

impl MappingSpec {
    /// Column or document path; `ref` wins over `column`.
    pub fn target(&self) -> Option<&str> {
        match self {
            MappingSpec::Column(c) => Some(c.as_str()),
            MappingSpec::Detailed(d) => d.reference.as_deref().or(d.column.as_deref()),
        }
        .filter(|t| !t.trim().is_empty())
    }

    pub fn nested_fields(&self) -> Option<&BTreeMap<String, MappingSpec>> {
        match self {
            MappingSpec::Detailed(d) if !d.fields.is_empty() => Some(&d.fields),
            _ => None,
        }
    }

    fn detail(&self) -> Option<&MappingDetail> {
        match self {
            MappingSpec::Detailed(d) => Some(d),
            MappingSpec::Column(_) => None,
        }
    }
}

/// Native base query of a view.
///
/// For the SQL family `sql` is SQL text (a full `SELECT`/`WITH` or a `FROM ...`
/// fragment) and `projection` a select list. For the document family `sql` is
/// a filter document or a list of aggregation stages, and `projection` extra
/// stages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NativeQuery {
    #[serde(default)]
    pub sql: Option<serde_json::Value>,
    #[serde(default)]
    pub projection: Option<serde_json::Value>,
    /// Substitute [`SCHEMA_PLACEHOLDER`] with the engine namespace.
    #[serde(default)]
    pub schema: bool,
}

impl NativeQuery {
    pub fn sql(text: impl Into<String>) -> Self {
        Self {
            sql: Some(serde_json::Value::String(text.into())),
            projection: None,
            schema: false,
        }
    }

    pub fn sql_text(&self) -> Option<&str> {
        self.sql.as_ref().and_then(|v| v.as_str())
    }

    pub fn projection_text(&self) -> Option<&str> {
        self.projection
            .as_ref()
            .and_then(|v| v.as_str())
            .filter(|p| !p.trim().is_empty())
    }
}

/// A named view over an entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewDef {
    pub id: String,
    #[serde(default)]
    pub mapping: BTreeMap<String, MappingSpec>,
    #[serde(default, rename = "native", alias = "sqlView")]
    pub native: Option<NativeQuery>,
}

impl ViewDef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mapping: BTreeMap::new(),
            native: None,
        }
    }

    /// Map a property path to a column or document path.
    pub fn map(mut self, path: impl Into<String>, column: impl Into<String>) -> Self {
        self.mapping
            .insert(path.into(), MappingSpec::Column(column.into()));
        self
    }

    pub fn map_spec(mut self, path: impl Into<String>, spec: MappingSpec) -> Self {
        self.mapping.insert(path.into(), spec);
        self
    }

    /// Map a reference field by flattening the listed child fields.
    pub fn map_nested<I, K, V>(mut self, field: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = children
            .into_iter()
            .map(|(k, v)| (k.into(), MappingSpec::Column(v.into())))
            .collect();
        self.mapping.insert(
            field.into(),
            MappingSpec::Detailed(MappingDetail {
                fields,
                ..MappingDetail::default()
            }),
        );
        self
    }

    pub fn with_native(mut self, native: NativeQuery) -> Self {
        self.native = Some(native);
        self
    }

    /// Explicitly mapped target of a path, or `None`.
    ///
    /// Looks up the path as a key first, then `parent.child` through the
    /// parent's nested `fields`.
    pub fn explicit_ref(&self, path: &str) -> Option<&str> {
        if let Some(target) = self.mapping.get(path).and_then(MappingSpec::target) {
            return Some(target);
        }
        let (parent, child) = path.split_once('.')?;
        self.mapping
            .get(parent)?
            .nested_fields()?
            .get(child)?
            .target()
    }

    /// Explicit target or, failing that, the snake_case form of each segment.
    pub fn ref_path(&self, path: &str) -> String {
        match self.explicit_ref(path) {
            Some(target) => target.to_string(),
            None => default_column(path),
        }
    }

    pub fn label(&self, path: &str) -> Option<&str> {
        self.mapping
            .get(path)
            .and_then(MappingSpec::detail)
            .and_then(|d| d.label.as_deref())
    }

    pub fn mode(&self, path: &str) -> MappingMode {
        self.mapping
            .get(path)
            .and_then(MappingSpec::detail)
            .and_then(|d| d.mode)
            .unwrap_or_default()
    }

    /// All declared labels, nested ones keyed as `parent.child`.
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (path, spec) in &self.mapping {
            let Some(detail) = spec.detail() else { continue };
            if let Some(label) = &detail.label {
                out.insert(path.clone(), label.clone());
            }
            for (child, child_spec) in &detail.fields {
                if let Some(label) = child_spec.detail().and_then(|d| d.label.as_ref()) {
                    out.insert(format!("{path}.{child}"), label.clone());
                }
            }
        }
        out
    }
}

/// Default column policy: snake_case each dotted segment.
pub fn default_column(path: &str) -> String {
    path.split('.')
        .map(to_snake_case)
        .collect::<Vec<_>>()
        .join(".")
}
