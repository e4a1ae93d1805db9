//! Instrumentation configuration.

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Options recognized by the instrumentation core, supplied by the composing application
/// (e.g., deserialized from its configuration file).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TelemetryOptions {
    /// Master switch. When disabled, no observers are registered and no heartbeat runs.
    pub enabled: bool,
    /// Whether to attach the serialized payload to the `Serialize` stage span.
    pub include_serialized_message: bool,
    /// Marks the endpoint as a transient instance in the heartbeat identity attributes.
    pub transient_instance: bool,
    /// Cadence of the heartbeat root spans.
    #[serde(rename = "HeartbeatIntervalDuration")]
    pub heartbeat_interval: Duration,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            include_serialized_message: true,
            transient_instance: false,
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}
