//! Identity of the endpoint hosting the instrumented pipelines.

use std::{env, net::UdpSocket};

/// Attributes describing the process and host, attached to pipeline root spans and to
/// the heartbeat identity beat.
#[derive(Debug, Clone, Default)]
pub struct EndpointIdentity {
    /// Host machine name.
    pub machine_name: String,
    /// Base directory the process runs from.
    pub base_directory: String,
    /// Deployment environment name (e.g. `Production`).
    pub environment_name: String,
    /// IPv4 address the endpoint is reachable on; `0.0.0.0` when unknown.
    pub ipv4_address: String,
    /// Name of the entry executable.
    pub entry_name: String,
    /// Named queue URIs this endpoint is configured with, e.g.
    /// `("InboxWorkQueueUri", "queue://orders-inbox")`.
    pub queue_uris: Vec<(String, String)>,
}

impl EndpointIdentity {
    /// Gathers identity attributes from the environment on a best-effort basis. Fields
    /// that cannot be determined fall back to neutral values; use the builder methods
    /// to override them.
    pub fn detect() -> Self {
        let machine_name = env::var("HOSTNAME")
            .or_else(|_| env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "localhost".to_owned());
        let base_directory = env::current_dir()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entry_name = env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "(unknown)".to_owned());

        Self {
            machine_name,
            base_directory,
            environment_name: env::var("ENVIRONMENT_NAME").unwrap_or_else(|_| "Production".to_owned()),
            ipv4_address: detect_ipv4_address(),
            entry_name,
            queue_uris: Vec::new(),
        }
    }

    /// Overrides the environment name.
    #[must_use]
    pub fn with_environment_name(mut self, name: impl Into<String>) -> Self {
        self.environment_name = name.into();
        self
    }

    /// Registers a named queue URI.
    #[must_use]
    pub fn with_queue_uri(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.queue_uris.push((name.into(), uri.into()));
        self
    }
}

/// Determines the outbound IPv4 address by the local address of a connected UDP socket.
/// No packets are sent; falls back to `0.0.0.0`.
fn detect_ipv4_address() -> String {
    let address = UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string());
    address.unwrap_or_else(|_| "0.0.0.0".to_owned())
}
