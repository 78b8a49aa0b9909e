//! Configuration module for strata.
//!
//! Handles engine selection, engine identity, and planner settings.

mod settings;

pub use settings::{
    expand_env_vars, BackendFamily, EngineSettings, HandleSettings, PlannerSettings, Settings,
    SettingsError,
};
