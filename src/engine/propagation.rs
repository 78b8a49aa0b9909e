//! Transaction propagation modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a unit of work relates to the transaction already in its context.
///
/// | Mode | Existing transaction | No transaction |
/// |------|----------------------|----------------|
/// | `Required` | join | open one |
/// | `Supports` | join | run without |
/// | `Mandatory` | join | error |
/// | `RequiresNew` | open another | open one |
/// | `Never` | error | run without |
/// | `Nested` | join | open one |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    #[default]
    Required,
    Supports,
    Mandatory,
    RequiresNew,
    Never,
    /// Behaves as `Required`; savepoints are not used.
    Nested,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Propagation::Required => "required",
            Propagation::Supports => "supports",
            Propagation::Mandatory => "mandatory",
            Propagation::RequiresNew => "requires_new",
            Propagation::Never => "never",
            Propagation::Nested => "nested",
        })
    }
}

impl FromStr for Propagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "required" => Ok(Propagation::Required),
            "supports" => Ok(Propagation::Supports),
            "mandatory" => Ok(Propagation::Mandatory),
            "requires_new" | "requiresnew" => Ok(Propagation::RequiresNew),
            "never" => Ok(Propagation::Never),
            "nested" => Ok(Propagation::Nested),
            other => Err(format!("unknown propagation: {other}")),
        }
    }
}
