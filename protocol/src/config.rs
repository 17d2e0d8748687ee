//! Hook configuration file schema.
//!
//! ```toml
//! [engine]
//! enforce_timeouts = true
//! cascade_failure_threshold = 0.5
//!
//! [[hooks]]
//! name = "scope-filter"
//! chain = "pre_inject"
//! priority = 90
//! timeout_ms = 1000
//! handler = "scope-filter"
//! ```

use crate::chain::ChainType;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Top-level hook configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub hooks: Vec<HookBinding>,
}

/// Engine-wide execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Race each handler against its timeout budget. When false, durations
    /// are only measured.
    pub enforce_timeouts: bool,

    /// Fraction of faulted hooks above which a completed chain is flagged
    /// as a cascading failure.
    pub cascade_failure_threshold: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            enforce_timeouts: true,
            cascade_failure_threshold: 0.5,
        }
    }
}

/// Binds a named handler from the host's catalog to a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookBinding {
    pub name: String,
    pub chain: ChainType,
    pub priority: ConfigNumber,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: ConfigNumber,

    /// Handler id looked up in the catalog.
    pub handler: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub description: String,
}

/// A number as written in the config file.
///
/// Kept untyped so that `priority = 50.5` reaches the validator and fails
/// there with a named error instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigNumber {
    Integer(i64),
    Float(f64),
}

impl ConfigNumber {
    /// Returns the value if it was written as an integer.
    pub fn as_integer(self) -> Option<i64> {
        match self {
            ConfigNumber::Integer(value) => Some(value),
            ConfigNumber::Float(_) => None,
        }
    }
}

impl fmt::Display for ConfigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigNumber::Integer(value) => write!(f, "{value}"),
            ConfigNumber::Float(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ConfigNumber {
    fn from(value: i64) -> Self {
        ConfigNumber::Integer(value)
    }
}

fn default_timeout_ms() -> ConfigNumber {
    ConfigNumber::Integer(5000)
}

fn default_true() -> bool {
    true
}
