//! Configuration types shared by the transports and the coordinator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff configuration for retrying failed API polls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 500,
            max_backoff_ms: 30_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// How result documents are decoded.
///
/// A value of this type is handed to every transport when it is built; there
/// is no process-wide serializer state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerializerConfig {
    /// Accept documents wrapped as `{ "results": { .. } }`.
    pub unwrap_results_envelope: bool,
    /// Drop the `ProfitLoss` member of a wrapped document before decoding it.
    ///
    /// The wrapped format emits profit/loss keys that do not match the raw
    /// result format.
    pub strip_wrapped_profit_loss: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            unwrap_results_envelope: true,
            strip_wrapped_profit_loss: true,
        }
    }
}

/// Timing and retry configuration for sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between two API polls.
    pub poll_interval: Duration,
    /// Upper bound of a single socket receive; cancellation is observed at
    /// least this often.
    pub receive_timeout: Duration,
    /// How often a watched file is checked for modifications.
    pub watch_interval: Duration,
    /// Backoff applied between failed API polls.
    pub retry: BackoffConfig,
    /// Consecutive failed polls after which an API session unsubscribes
    /// itself. `0` disables the limit.
    pub max_poll_failures: u32,
    /// Decoding rules for result documents.
    pub serializer: SerializerConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            receive_timeout: Duration::from_millis(500),
            watch_interval: Duration::from_millis(250),
            retry: BackoffConfig::default(),
            max_poll_failures: 5,
            serializer: SerializerConfig::default(),
        }
    }
}

/// Credentials and endpoint of the remote results API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; request paths such as `backtests/read` are joined onto it.
    pub base_url: String,
    /// Numeric user id used as the basic-auth user name.
    pub user_id: String,
    /// Access token; never sent in clear, only hashed with the timestamp.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.quantconnect.com/api/v2/".to_string(),
            user_id: String::new(),
            token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}
