//! TOML-based configuration for strata.
//!
//! Supports a config file (strata.toml) with environment variable expansion
//! in string values that name external resources.
//!
//! Example configuration:
//! ```toml
//! [engine]
//! dialect = "postgres"          # postgres | ansi | document
//! default_propagation = "required"
//!
//! [handle]
//! id = "orders-db"
//! namespace = "${ORDERS_SCHEMA}"
//! multi_tenant = true
//!
//! [planner]
//! tenant_boundary_keys = ["tenant"]
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{EngineHandle, Propagation};
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub handle: HandleSettings,
    pub planner: PlannerSettings,
}

/// Backend family selected by `[engine] dialect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFamily {
    Sql(Dialect),
    Document,
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// `postgres`, `ansi`, or `document`.
    pub dialect: String,

    /// Propagation used by `DataEngine::transaction`.
    pub default_propagation: Propagation,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dialect: "postgres".to_string(),
            default_propagation: Propagation::Required,
        }
    }
}

impl EngineSettings {
    pub fn family(&self) -> Result<BackendFamily, SettingsError> {
        let name = self.dialect.trim();
        if name.eq_ignore_ascii_case(crate::document::DIALECT_ID) {
            return Ok(BackendFamily::Document);
        }
        name.parse::<Dialect>()
            .map(BackendFamily::Sql)
            .map_err(|_| SettingsError::UnsupportedDialect(self.dialect.clone()))
    }
}

/// Engine identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandleSettings {
    pub id: String,

    /// Substituted for `{schema}` in native view queries (supports
    /// ${ENV_VAR} expansion).
    pub namespace: Option<String>,

    pub multi_tenant: bool,
}

impl Default for HandleSettings {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            namespace: None,
            multi_tenant: false,
        }
    }
}

impl HandleSettings {
    /// Build the engine handle, expanding environment variables in the
    /// namespace.
    pub fn to_handle(&self) -> Result<EngineHandle, SettingsError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(SettingsError::InvalidConfig("handle.id must not be blank".into()));
        }
        let mut handle = EngineHandle::new(id).multi_tenant(self.multi_tenant);
        if let Some(ns) = &self.namespace {
            let ns = expand_env_vars(ns)?;
            if !ns.trim().is_empty() {
                handle = handle.with_namespace(ns.trim());
            }
        }
        Ok(handle)
    }
}

/// Write planner configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Governance keys whose fields are insert-only.
    pub tenant_boundary_keys: Vec<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `STRATA_CONFIG`
    /// 2. `./strata.toml`
    /// 3. `~/.config/strata/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("STRATA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("strata.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("strata").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = std::iter::from_fn(|| chars.next_if(|&ch| ch != '}')).collect();
            chars.next(); // closing '}'
            name
        } else {
            std::iter::from_fn(|| chars.next_if(|&ch| ch.is_alphanumeric() || ch == '_')).collect()
        };
        if var_name.is_empty() {
            result.push('$');
            continue;
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
