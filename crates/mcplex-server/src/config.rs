//! Server-side session configuration (spec §1 ambient stack addition).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub implementation_name: String,
    pub implementation_version: String,
    /// Caps request payload size; `None` means no limit, matching the
    /// transport layer's own default.
    pub max_message_bytes: Option<usize>,
    pub keep_alive_interval: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub rate_limit: Option<RateLimitConfig>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub per: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            implementation_name: "mcplex-server".to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            max_message_bytes: Some(10 * 1024 * 1024),
            keep_alive_interval: Some(Duration::from_secs(30)),
            idle_timeout: Some(Duration::from_secs(600)),
            rate_limit: None,
        }
    }
}

impl ServerConfig {
    pub fn named(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            implementation_name: name.into(),
            implementation_version: version.into(),
            ..Self::default()
        }
    }

    pub fn with_rate_limit(mut self, max_requests: u32, per: Duration) -> Self {
        self.rate_limit = Some(RateLimitConfig { max_requests, per });
        self
    }

    pub fn with_max_message_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_message_bytes = limit;
        self
    }
}
