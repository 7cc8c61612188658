//! Container configuration loading
//!
//! The persisted widget configuration: the conditional toggle plus the
//! ordered condition list, using the wire names the authoring form saves.

use crate::types::Rule;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted configuration for one conditional container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    /// Whether the container filters its content at all. The authoring form
    /// stores the checkbox as a list, so both `true` and `[true]` appear in
    /// saved configurations.
    #[serde(default)]
    pub use_as_conditional_container: Toggle,

    /// Ordered condition list; the first matching condition decides.
    #[serde(default)]
    pub conditions: Vec<Rule>,
}

impl ContainerConfig {
    /// True when the conditional behavior is enabled
    pub fn is_conditional(&self) -> bool {
        self.use_as_conditional_container.is_enabled()
    }

    /// Parse a configuration from its persisted JSON form
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(Into::into)
    }

    /// Load a configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Checkbox state as persisted by the authoring form: a plain bool, or a
/// list of bools that counts as enabled when any element is true
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle {
    Flag(bool),
    Flags(Vec<bool>),
}

impl Toggle {
    pub fn enabled() -> Self {
        Toggle::Flag(true)
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Toggle::Flag(flag) => *flag,
            Toggle::Flags(flags) => flags.iter().any(|flag| *flag),
        }
    }
}

impl Default for Toggle {
    fn default() -> Self {
        Toggle::Flag(false)
    }
}
