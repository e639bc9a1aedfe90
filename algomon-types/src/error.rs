use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the algomon workspace.
///
/// Covers session lifecycle failures, malformed input documents, transport
/// failures (socket and HTTP) and invalid arguments.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MonitorError {
    /// The result file does not exist.
    #[error("File '{path}' does not exist")]
    FileNotFound {
        /// Path as given by the caller.
        path: String,
    },

    /// The result file exists but could not be read.
    #[error("File '{path}' could not be read: {msg}")]
    FileUnreadable {
        /// Path as given by the caller.
        path: String,
        /// Underlying I/O error message.
        msg: String,
    },

    /// The document was read but is not a valid algorithm result.
    #[error("The file is no valid result: {0}")]
    InvalidResult(String),

    /// Connecting the stream socket failed.
    #[error("could not connect to {endpoint}: {msg}")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The results API answered with `success = false`.
    #[error("api request failed: {errors:?}")]
    Api {
        /// Error strings reported by the API.
        errors: Vec<String>,
    },

    /// HTTP transport failure (connect, timeout, status, body decoding).
    #[error("http error: {0}")]
    Http(String),

    /// An operation required an open session.
    #[error("No session exists")]
    NoSession,

    /// Closing the active session failed.
    #[error("Could not close the session: {0}")]
    Shutdown(String),

    /// The requested capability is not implemented by the transport.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// A capability string describing what was requested (e.g. "api/live").
        capability: String,
    },

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Issues with the returned or expected data.
    #[error("data issue: {0}")]
    Data(String),

    /// Serializing a result failed.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl MonitorError {
    /// Helper: build a `FileNotFound` error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Helper: build a `FileUnreadable` error.
    pub fn file_unreadable(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::FileUnreadable {
            path: path.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Connect` error with the endpoint and message.
    pub fn connect(endpoint: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build an `Unsupported` error for a capability string.
    #[must_use]
    pub fn unsupported(cap: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: cap.into(),
        }
    }

    /// Returns true if a retry of the same request may succeed.
    ///
    /// HTTP transport failures and API-level rejections are considered
    /// transient; everything else reflects a permanent condition.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. })
    }
}
