//! Client-side session configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub implementation_name: String,
    pub implementation_version: String,
    pub request_timeout: Duration,
    pub keep_alive_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            implementation_name: "mcplex-client".to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: Duration::from_secs(30),
            keep_alive_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl ClientConfig {
    pub fn named(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            implementation_name: name.into(),
            implementation_version: version.into(),
            ..Self::default()
        }
    }
}
