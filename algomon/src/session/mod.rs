//! Transports delivering results into a session.
//!
//! Every transport shares one contract: `initialize` (may fail), `subscribe`,
//! `unsubscribe`, `shutdown` and a readable [`SessionState`]. State changes are
//! reported through the session's [`SessionLink`] at the moment they happen.

/// API polling transport.
pub mod api;
pub(crate) mod backoff;
/// File transport with optional change watching.
pub mod file;
/// Socket stream transport.
pub mod stream;
/// ZeroMQ implementation of the stream socket primitive.
pub mod zmq;

use std::sync::Arc;

use algomon_core::{
    FrameConnector, MonitorConfig, MonitorError, ResultApi, ResultSerializer, SessionLink,
    SessionParams, SessionState,
};

pub use api::ApiSession;
pub use file::FileSession;
pub use stream::StreamSession;

/// Shared dependencies handed to every transport at construction.
#[derive(Clone)]
pub struct SessionEnv {
    /// Timing and retry configuration.
    pub config: MonitorConfig,
    /// Decoder for result documents.
    pub serializer: ResultSerializer,
    /// Socket primitive for stream sessions.
    pub connector: Arc<dyn FrameConnector>,
    /// HTTP client for API sessions; API sessions cannot be built without it.
    pub api: Option<Arc<dyn ResultApi>>,
}

impl SessionEnv {
    /// Environment with the given configuration, the ZeroMQ connector and no
    /// API client.
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            serializer: ResultSerializer::new(config.serializer),
            config,
            connector: Arc::new(zmq::ZmqConnector),
            api: None,
        }
    }
}

impl std::fmt::Debug for SessionEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEnv")
            .field("config", &self.config)
            .field("serializer", &self.serializer)
            .field("api", &self.api.is_some())
            .finish_non_exhaustive()
    }
}

/// One of the three transports.
#[derive(Debug)]
pub enum Session {
    /// Result file.
    File(FileSession),
    /// Pushed socket stream.
    Stream(StreamSession),
    /// Polled results API.
    Api(ApiSession),
}

impl Session {
    /// Build the transport selected by `params`.
    ///
    /// # Errors
    /// Returns `InvalidArg` for API parameters when `env` has no API client.
    pub fn from_params(
        params: SessionParams,
        link: SessionLink,
        env: &SessionEnv,
    ) -> Result<Self, MonitorError> {
        Ok(match params {
            SessionParams::File(p) => Self::File(FileSession::new(p, link, env)),
            SessionParams::Stream(p) => Self::Stream(StreamSession::new(p, link, env)),
            SessionParams::Api(p) => Self::Api(ApiSession::new(p, link, env)?),
        })
    }

    /// Display name of the session.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File(s) => s.name(),
            Self::Stream(s) => s.name(),
            Self::Api(s) => s.name(),
        }
    }

    /// Current subscription state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match self {
            Self::File(s) => s.state(),
            Self::Stream(s) => s.state(),
            Self::Api(s) => s.state(),
        }
    }

    /// Whether the transport supports manual re-subscription.
    #[must_use]
    pub const fn can_subscribe(&self) -> bool {
        match self {
            Self::File(_) | Self::Stream(_) => true,
            Self::Api(_) => false,
        }
    }

    /// First load of the session.
    ///
    /// The file transport reads once and, when watching, arms the watch;
    /// stream and API transports subscribe.
    ///
    /// # Errors
    /// Propagates the transport's failure; the session should then be shut
    /// down.
    pub async fn initialize(&mut self) -> Result<(), MonitorError> {
        match self {
            Self::File(s) => s.initialize().await,
            Self::Stream(s) => s.initialize().await,
            Self::Api(s) => s.initialize(),
        }
    }

    /// Start delivering updates. No-op when already subscribed.
    ///
    /// # Errors
    /// Returns the transport's failure to start (socket connect, unsupported
    /// instance type, unresolvable path).
    pub async fn subscribe(&mut self) -> Result<(), MonitorError> {
        match self {
            Self::File(s) => s.subscribe(),
            Self::Stream(s) => s.subscribe().await,
            Self::Api(s) => s.subscribe(),
        }
    }

    /// Stop delivering updates. Workers exit at their next suspension point.
    pub fn unsubscribe(&mut self) {
        match self {
            Self::File(s) => s.unsubscribe(),
            Self::Stream(s) => s.unsubscribe(),
            Self::Api(s) => s.unsubscribe(),
        }
    }

    /// Tear the session down.
    ///
    /// # Errors
    /// Returns the transport's failure to release its resources.
    pub fn shutdown(&mut self) -> Result<(), MonitorError> {
        match self {
            Self::File(s) => s.shutdown(),
            Self::Stream(s) => s.shutdown(),
            Self::Api(s) => s.shutdown(),
        }
    }
}
