//! Session states and the parameters each transport is built from.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ResultType;

/// Subscription state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No background worker is delivering updates.
    #[default]
    Unsubscribed,
    /// Updates are being delivered.
    Subscribed,
}

impl SessionState {
    /// `true` for [`SessionState::Subscribed`].
    #[must_use]
    pub const fn is_subscribed(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

/// Origin of a log line shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Emitted by the monitor itself.
    Monitor,
    /// A log packet of the algorithm.
    Log,
    /// A debug packet of the algorithm.
    Debug,
    /// A failure the user should see.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Monitor => "monitor",
            Self::Log => "log",
            Self::Debug => "debug",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Open a result file, optionally watching it for changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileParams {
    /// Path of the JSON result document.
    pub path: PathBuf,
    /// Re-read the file whenever it changes.
    pub watch: bool,
}

/// Connect to an algorithm pushing result packets over a socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    /// Host name or address, e.g. `localhost`.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Unsubscribe once a backtest reports a progress of 1.
    pub close_after_completed: bool,
}

impl StreamParams {
    /// Parameters for a stream on `host:port` that closes after completion.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            close_after_completed: true,
        }
    }

    /// Endpoint address of the pull socket: `>tcp://{host}:{port}`.
    ///
    /// The leading `>` marks the address as one to connect to rather than
    /// bind on.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let host = self
            .host
            .trim_start_matches('>')
            .trim_start_matches("tcp://")
            .trim_end_matches(':');
        format!(">tcp://{host}:{}", self.port)
    }
}

/// Poll a backtest or live instance through the results API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiParams {
    /// Project the instance belongs to.
    pub project_id: i64,
    /// Backtest id (or live deployment id).
    pub instance_id: String,
    /// Kind of instance to poll.
    pub instance_type: ResultType,
}

/// Parameter variant selecting which transport a session uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionParams {
    /// File transport.
    File(FileParams),
    /// Socket stream transport.
    Stream(StreamParams),
    /// Polled API transport.
    Api(ApiParams),
}

impl From<FileParams> for SessionParams {
    fn from(p: FileParams) -> Self {
        Self::File(p)
    }
}

impl From<StreamParams> for SessionParams {
    fn from(p: StreamParams) -> Self {
        Self::Stream(p)
    }
}

impl From<ApiParams> for SessionParams {
    fn from(p: ApiParams) -> Self {
        Self::Api(p)
    }
}
