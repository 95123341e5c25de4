use drillcore::FlowError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Capacity of the telemetry broadcast channel.
    pub telemetry_buffer: usize,
    /// Resolve every interactive target against the registry when a graph
    /// is loaded, turning missing props into authoring errors.
    pub validate_targets_at_load: bool,
    /// Log steps no start step can reach.
    pub warn_on_unreachable: bool,
}

impl RuntimeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            telemetry_buffer: 1024,
            validate_targets_at_load: true,
            warn_on_unreachable: true,
        }
    }
}
