use serde::Deserialize;

/// How the delay between retry attempts grows.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Same delay before every attempt.
    #[default]
    Fixed,
    /// Doubling delay with up to 25% jitter, capped at `max_delay_ms`.
    Exponential,
}

/// Bounded retry configuration shared by every remote call.
#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    /// Delay between attempts in milliseconds. Default: 2000.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Delay used for auth-related operations. Default: 5000.
    #[serde(default = "default_auth_delay_ms")]
    pub auth_delay_ms: u64,
    /// Delay growth strategy. Default: fixed.
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Upper bound for exponential delays. Default: 30000.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u8 {
    3
}
fn default_delay_ms() -> u64 {
    2000
}
fn default_auth_delay_ms() -> u64 {
    5000
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            auth_delay_ms: default_auth_delay_ms(),
            backoff: BackoffKind::default(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}
