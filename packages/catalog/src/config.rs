use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use store::RepositoryConfig;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// The signed-in user. Without one, only system defaults are visible and
/// nothing can be written.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectivityConfig {
    /// Seconds between background reachability probes. Default: 30.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

fn default_probe_interval_secs() -> u64 {
    30
}

impl ConnectivityConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`. Default: "info".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CATALOG_CONFIG").unwrap_or_else(|_| "config/catalog".to_string());
        Self::load_from(&config_path)
    }

    /// Defaults, then the optional file at `path`, then `CATALOG__*`
    /// environment variables (e.g. `CATALOG__DATABASE__URL`).
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("database.url", "postgres://localhost:5432/catalog")?
            .set_default("repository.request_timeout_ms", 10_000_i64)?
            .set_default("repository.delete_batch_size", 50_i64)?
            .set_default("connectivity.probe_interval_secs", 30_i64)?
            .set_default("log.level", "info")?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("CATALOG").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
