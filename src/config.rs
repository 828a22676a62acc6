//! Host configuration.

use std::path::Path;

use plughost_vst3::{RegistryConfig, ViewSize};
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Reported to plugins through `IHostApplication::getName`.
    pub host_name: String,

    /// Generated ids are `<prefix>_<n>`.
    pub id_prefix: String,

    /// Editor size when the view does not report one.
    pub default_editor_size: ViewSize,

    /// Pending parameter changes per instance; the oldest is dropped when full.
    pub parameter_queue_capacity: usize,

    pub max_parameter_changes_per_block: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        let engine = RegistryConfig::default();
        Self {
            host_name: engine.host_name,
            id_prefix: engine.id_prefix,
            default_editor_size: engine.default_editor_size,
            parameter_queue_capacity: engine.parameter_queue_capacity,
            max_parameter_changes_per_block: engine.max_parameter_changes_per_block,
        }
    }
}

impl HostConfig {
    /// Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub(crate) fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            host_name: self.host_name.clone(),
            id_prefix: self.id_prefix.clone(),
            default_editor_size: self.default_editor_size,
            parameter_queue_capacity: self.parameter_queue_capacity,
            max_parameter_changes_per_block: self.max_parameter_changes_per_block,
        }
    }
}
