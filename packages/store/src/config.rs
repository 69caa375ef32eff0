use std::time::Duration;

use common::config::RetryConfig;
use serde::Deserialize;

/// Settings handed to every repository and table adapter at construction.
#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConfig {
    /// Timeout applied to each remote call, in milliseconds. Default: 10000.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Ids sent per round-trip by `delete_multiple`. Default: 50.
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,
    /// Age after which the cached snapshot is reloaded. Default: never.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Probe connectivity before each write and refuse when offline. Default: false.
    #[serde(default)]
    pub gate_writes_on_connectivity: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_delete_batch_size() -> usize {
    50
}

impl RepositoryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            delete_batch_size: default_delete_batch_size(),
            cache_ttl_secs: None,
            gate_writes_on_connectivity: false,
            retry: RetryConfig::default(),
        }
    }
}
