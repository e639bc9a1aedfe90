use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use algomon_types::{AlgorithmResult, LogLevel, MonitorError, ResultContext, SessionState};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

/// Something a transport reports to its coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A (merged) result snapshot.
    Result(ResultContext),
    /// The transport's subscription state changed.
    StateChanged(SessionState),
    /// A log line for the user.
    Log {
        /// Message text.
        message: String,
        /// Origin of the line.
        level: LogLevel,
    },
}

/// A [`SessionEvent`] tagged with the session that produced it.
///
/// The coordinator drops deliveries whose session is no longer the active one.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Id of the producing session.
    pub session_id: u64,
    /// The event.
    pub event: SessionEvent,
}

/// A transport's end of the delivery channel plus its shared state.
///
/// All workers of one session hold clones of the same link, so every
/// delivery of a session goes through one ordered channel.
///
/// The shared state word holds the subscription flag in its lowest bit and a
/// generation counter above it; every transition bumps the generation. Links
/// handed to workers via [`SessionLink::worker`] are pinned to the
/// subscription they were started for and go quiet once it has ended, so a
/// worker that outlives its subscription cannot touch a newer one.
#[derive(Debug, Clone)]
pub struct SessionLink {
    session_id: u64,
    tx: mpsc::UnboundedSender<Delivery>,
    state: Arc<AtomicU64>,
    pinned: Option<u64>,
}

const SUBSCRIBED_BIT: u64 = 1;

const fn word(generation: u64, subscribed: bool) -> u64 {
    (generation << 1) | subscribed as u64
}

impl SessionLink {
    /// Link for `session_id` sending into `tx`; starts unsubscribed.
    #[must_use]
    pub fn new(session_id: u64, tx: mpsc::UnboundedSender<Delivery>) -> Self {
        Self {
            session_id,
            tx,
            state: Arc::new(AtomicU64::new(word(0, false))),
            pinned: None,
        }
    }

    /// A link for a worker of the current subscription.
    ///
    /// Call after subscribing. Once the subscription ends (by any link) the
    /// returned link stops delivering and its state changes are ignored.
    #[must_use]
    pub fn worker(&self) -> Self {
        Self {
            pinned: Some(self.state.load(Ordering::SeqCst) >> 1),
            ..self.clone()
        }
    }

    /// Id of the session this link belongs to.
    #[must_use]
    pub const fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Current subscription state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.state.load(Ordering::SeqCst) & SUBSCRIBED_BIT == 0 {
            SessionState::Unsubscribed
        } else {
            SessionState::Subscribed
        }
    }

    /// `false` for a worker link whose subscription has ended.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.pinned
            .is_none_or(|g| self.state.load(Ordering::SeqCst) == word(g, true))
    }

    /// Transition to `state`, reporting the change on the channel.
    ///
    /// Returns `false` (and reports nothing) if the state did not change, or
    /// if this is a worker link whose subscription already ended.
    pub fn set_state(&self, state: SessionState) -> bool {
        let want = state.is_subscribed();
        let changed = match self.pinned {
            Some(g) => {
                !want
                    && self
                        .state
                        .compare_exchange(
                            word(g, true),
                            word(g + 1, false),
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        )
                        .is_ok()
            }
            None => self
                .state
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
                    ((w & SUBSCRIBED_BIT == 1) != want).then(|| word((w >> 1) + 1, want))
                })
                .is_ok(),
        };
        if changed {
            self.send(SessionEvent::StateChanged(state));
        }
        changed
    }

    /// Deliver a result snapshot.
    ///
    /// Returns `false` if the coordinator is gone or this worker link's
    /// subscription has ended.
    pub fn deliver(&self, context: ResultContext) -> bool {
        self.is_current() && self.send(SessionEvent::Result(context))
    }

    /// Deliver a log line. Returns `false` like [`deliver`](Self::deliver).
    pub fn log(&self, message: impl Into<String>, level: LogLevel) -> bool {
        self.is_current()
            && self.send(SessionEvent::Log {
                message: message.into(),
                level,
            })
    }

    fn send(&self, event: SessionEvent) -> bool {
        self.tx
            .send(Delivery {
                session_id: self.session_id,
                event,
            })
            .is_ok()
    }
}

/// Multipart messages received from a connected pull socket.
#[async_trait]
pub trait FrameSource: Send {
    /// Wait at most `timeout` for the next message.
    ///
    /// Returns `Ok(None)` if nothing arrived in time, otherwise the frames of
    /// one message.
    async fn recv_frames(&mut self, timeout: Duration) -> Result<Option<Vec<Vec<u8>>>, MonitorError>;
}

/// Opens [`FrameSource`]s; the socket primitive of the stream transport.
#[async_trait]
pub trait FrameConnector: Send + Sync {
    /// Connect to `endpoint` (`>tcp://host:port`).
    ///
    /// # Errors
    /// Returns `MonitorError::Connect` if the socket cannot be set up.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameSource>, MonitorError>;
}

/// One poll of a remote backtest.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BacktestSnapshot {
    /// Backtest name.
    pub name: String,
    /// Project name, when known.
    pub project: Option<String>,
    /// Progress in `0..=1`.
    pub progress: Decimal,
    /// The remote reports the backtest as finished.
    pub completed: bool,
    /// Result so far; `None` before the first result is available.
    pub result: Option<AlgorithmResult>,
}

/// Remote results API; the HTTP primitive of the API transport.
#[async_trait]
pub trait ResultApi: Send + Sync {
    /// Read the current state of a backtest.
    ///
    /// # Errors
    /// Returns `MonitorError::Http` for transport failures and
    /// `MonitorError::Api` if the remote rejects the request.
    async fn read_backtest(
        &self,
        project_id: i64,
        backtest_id: &str,
    ) -> Result<BacktestSnapshot, MonitorError>;
}
