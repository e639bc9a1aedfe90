use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use algomon_core::stream::{StopSignal, WorkerHandle, stopped};
use algomon_core::{
    AlgorithmResult, BackoffConfig, Delivery, FileParams, FrameConnector, LogLevel, MonitorConfig,
    MonitorError, MutatorPipeline, ResultApi, ResultContext, ResultMutator, ResultSerializer,
    SerializerConfig, SessionEvent, SessionLink, SessionParams, SessionState, StreamParams,
    merge_result,
};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};

use crate::charts::ChartBook;
use crate::session::zmq::ZmqConnector;
use crate::session::{Session, SessionEnv};

/// Host used when the command line names only a port.
const LOCAL_HOST: &str = "localhost";

/// What the coordinator tells its collaborator (usually a UI).
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A session was opened. Sent even when its initialization failed; a
    /// [`MonitorEvent::SessionClosed`] follows in that case.
    SessionOpened {
        /// Display name of the session.
        name: String,
    },
    /// The active session was closed.
    SessionClosed,
    /// The merged result changed.
    SessionUpdated(ResultContext),
    /// The active session subscribed or unsubscribed.
    StateChanged(SessionState),
    /// A line for the log panel, stamped on receipt.
    LogEntry {
        /// Receipt time.
        time: DateTime<Utc>,
        /// Message text.
        message: String,
        /// Origin of the line.
        level: LogLevel,
    },
    /// No session could be derived from the command line; ask the user.
    ShowNewSession,
}

/// Receives [`MonitorEvent`]s.
///
/// Called from the coordinator's delivery path only, one event at a time.
pub trait Notifier: Send + Sync {
    /// Handle one event.
    fn notify(&self, event: MonitorEvent);
}

/// Notifier forwarding events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl ChannelNotifier {
    /// A notifier and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: MonitorEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Notifier discarding every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: MonitorEvent) {}
}

/// Session to open as derived from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapAction {
    /// Stream on `localhost:<port>`.
    Stream(u16),
    /// Watched result file.
    File(PathBuf),
    /// Nothing usable; prompt for a session.
    Prompt,
}

impl BootstrapAction {
    /// Inspect the last argument.
    ///
    /// An integer selects a local stream, a path ending in `.json` a watched
    /// file; anything else (or no argument) asks for a prompt.
    ///
    /// # Errors
    /// `InvalidArg` if the argument is an integer outside the port range.
    pub fn from_args<I, S>(args: I) -> Result<Self, MonitorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(last) = args.into_iter().last() else {
            return Ok(Self::Prompt);
        };
        let arg = last.as_ref().trim();
        if let Ok(n) = arg.parse::<i64>() {
            return u16::try_from(n)
                .map(Self::Stream)
                .map_err(|_| MonitorError::InvalidArg(format!("'{arg}' is not a valid port")));
        }
        if arg.to_ascii_lowercase().ends_with(".json") {
            return Ok(Self::File(PathBuf::from(arg)));
        }
        Ok(Self::Prompt)
    }
}

struct ActiveSession {
    id: u64,
    session: Session,
    last_result: Option<AlgorithmResult>,
}

#[derive(Default)]
struct CoordinatorState {
    active: Option<ActiveSession>,
}

/// Owner of the single active session.
///
/// Transports deliver into one channel; the coordinator consumes it in order
/// ([`process_next`](Self::process_next) or a loop started with
/// [`spawn_delivery_loop`](Self::spawn_delivery_loop)), merges results into the
/// accumulated one, runs the mutators, updates the chart book and notifies the
/// collaborator. Deliveries of any session other than the active one are
/// dropped.
pub struct SessionCoordinator {
    env: SessionEnv,
    notifier: Arc<dyn Notifier>,
    mutators: MutatorPipeline,
    charts: ChartBook,
    state: Mutex<CoordinatorState>,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    next_session_id: AtomicU64,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("env", &self.env)
            .field("mutators", &self.mutators)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`SessionCoordinator`].
pub struct SessionCoordinatorBuilder {
    config: MonitorConfig,
    connector: Arc<dyn FrameConnector>,
    api: Option<Arc<dyn ResultApi>>,
    notifier: Arc<dyn Notifier>,
    mutators: MutatorPipeline,
}

impl Default for SessionCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCoordinatorBuilder {
    /// Create a builder with defaults.
    ///
    /// Behavior and trade-offs:
    /// - Streams connect through ZeroMQ; API sessions fail to open until an
    ///   API client is registered with [`result_api`](Self::result_api).
    /// - Events go nowhere until a notifier is set.
    /// - The relative benchmark mutator is registered; further mutators run
    ///   after it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
            connector: Arc::new(ZmqConnector),
            api: None,
            notifier: Arc::new(NullNotifier),
            mutators: MutatorPipeline::with_defaults(),
        }
    }

    /// Replace the whole timing and decoding configuration.
    #[must_use]
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Interval between two API polls.
    ///
    /// Behavior and trade-offs:
    /// - Shorter intervals show progress sooner at the cost of more requests
    ///   against a rate-limited API.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Upper bound of one socket receive.
    ///
    /// Behavior and trade-offs:
    /// - Unsubscribing a stream takes effect within this bound; very small
    ///   values wake the listener more often while idle.
    #[must_use]
    pub const fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.receive_timeout = timeout;
        self
    }

    /// How often a watched file is checked for changes.
    #[must_use]
    pub const fn watch_interval(mut self, interval: Duration) -> Self {
        self.config.watch_interval = interval;
        self
    }

    /// Backoff between failed API polls.
    #[must_use]
    pub const fn retry(mut self, retry: BackoffConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Consecutive failed polls after which an API session stops; `0` never
    /// stops.
    #[must_use]
    pub const fn max_poll_failures(mut self, n: u32) -> Self {
        self.config.max_poll_failures = n;
        self
    }

    /// Decoding rules handed to every transport.
    #[must_use]
    pub const fn serializer(mut self, config: SerializerConfig) -> Self {
        self.config.serializer = config;
        self
    }

    /// Socket primitive for stream sessions.
    #[must_use]
    pub fn frame_connector(mut self, connector: Arc<dyn FrameConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Results API client for API sessions.
    #[must_use]
    pub fn result_api(mut self, api: Arc<dyn ResultApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Collaborator receiving [`MonitorEvent`]s.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Append a mutator to the pipeline.
    #[must_use]
    pub fn with_mutator(mut self, mutator: Arc<dyn ResultMutator>) -> Self {
        self.mutators.push(mutator);
        self
    }

    /// Drop all mutators, including the default one.
    #[must_use]
    pub fn without_mutators(mut self) -> Self {
        self.mutators = MutatorPipeline::new();
        self
    }

    /// Build the coordinator.
    ///
    /// # Errors
    /// `InvalidArg` if the poll interval or the receive timeout is zero.
    pub fn build(self) -> Result<SessionCoordinator, MonitorError> {
        if self.config.poll_interval.is_zero() {
            return Err(MonitorError::InvalidArg(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.config.receive_timeout.is_zero() {
            return Err(MonitorError::InvalidArg(
                "receive timeout must be greater than zero".to_string(),
            ));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(SessionCoordinator {
            env: SessionEnv {
                serializer: ResultSerializer::new(self.config.serializer),
                config: self.config,
                connector: self.connector,
                api: self.api,
            },
            notifier: self.notifier,
            mutators: self.mutators,
            charts: ChartBook::new(),
            state: Mutex::new(CoordinatorState::default()),
            tx,
            rx: Mutex::new(rx),
            next_session_id: AtomicU64::new(1),
        })
    }
}

impl SessionCoordinator {
    /// Start building a coordinator.
    #[must_use]
    pub fn builder() -> SessionCoordinatorBuilder {
        SessionCoordinatorBuilder::new()
    }

    /// Open a session, replacing the active one.
    ///
    /// The previous session is shut down first; a failure doing so is reported
    /// as a log entry and the session is dropped regardless. The new session
    /// is announced after initialization returns, also when it failed.
    ///
    /// # Errors
    /// Returns the transport's initialization error; the failed session is
    /// torn down before returning.
    pub async fn open(&self, params: impl Into<SessionParams>) -> Result<(), MonitorError> {
        let params = params.into();
        let mut state = self.state.lock().await;

        if state.active.is_some()
            && let Err(e) = self.close_active(&mut state)
        {
            self.notify_log(e.to_string(), LogLevel::Error);
        }

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let link = SessionLink::new(id, self.tx.clone());
        let mut session = Session::from_params(params, link, &self.env)?;
        let name = session.name().to_string();

        #[cfg(feature = "tracing")]
        tracing::info!(target = "algomon::session", session = %name, id, "opening session");
        let init = session.initialize().await;
        state.active = Some(ActiveSession {
            id,
            session,
            last_result: None,
        });
        self.notifier.notify(MonitorEvent::SessionOpened { name });

        if let Err(e) = init {
            #[cfg(feature = "tracing")]
            tracing::warn!(target = "algomon::session", error = %e, "session initialization failed");
            if let Err(close) = self.close_active(&mut state) {
                self.notify_log(close.to_string(), LogLevel::Error);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Close the active session.
    ///
    /// # Errors
    /// `NoSession` if none is open; `Shutdown` if the transport failed to
    /// close (the session is discarded anyway).
    pub async fn shutdown_session(&self) -> Result<(), MonitorError> {
        let mut state = self.state.lock().await;
        if state.active.is_none() {
            return Err(MonitorError::NoSession);
        }
        self.close_active(&mut state)
    }

    fn close_active(&self, state: &mut CoordinatorState) -> Result<(), MonitorError> {
        let Some(mut active) = state.active.take() else {
            return Ok(());
        };
        #[cfg(feature = "tracing")]
        tracing::info!(target = "algomon::session", session = %active.session.name(), "closing session");
        let was_subscribed = active.session.state().is_subscribed();
        let res = active
            .session
            .shutdown()
            .map_err(|e| MonitorError::Shutdown(e.to_string()));
        self.charts.clear();
        // The transport's own notice carries an id that is no longer active
        // and would be dropped as stale.
        if was_subscribed {
            self.notifier
                .notify(MonitorEvent::StateChanged(SessionState::Unsubscribed));
        }
        self.notifier.notify(MonitorEvent::SessionClosed);
        res
    }

    /// Subscribe or unsubscribe the active session.
    ///
    /// Setting the current state again does nothing.
    ///
    /// # Errors
    /// `NoSession` if none is open, or the transport's subscribe error.
    pub async fn set_subscribed(&self, subscribed: bool) -> Result<(), MonitorError> {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.as_mut() else {
            return Err(MonitorError::NoSession);
        };
        if active.session.state().is_subscribed() == subscribed {
            return Ok(());
        }
        if subscribed {
            active.session.subscribe().await
        } else {
            active.session.unsubscribe();
            Ok(())
        }
    }

    /// `true` if a session is open and subscribed.
    pub async fn is_subscribed(&self) -> bool {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .is_some_and(|a| a.session.state().is_subscribed())
    }

    /// `true` if a session is open and supports manual re-subscription.
    pub async fn can_subscribe(&self) -> bool {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .is_some_and(|a| a.session.can_subscribe())
    }

    /// `true` while a session is open.
    pub async fn has_session(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    /// The merged result of the active session, if it delivered anything.
    pub async fn last_result(&self) -> Option<AlgorithmResult> {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .and_then(|a| a.last_result.clone())
    }

    /// Chart bookkeeping of the active session.
    #[must_use]
    pub const fn charts(&self) -> &ChartBook {
        &self.charts
    }

    /// Write the merged result of the active session to `path`.
    ///
    /// # Errors
    /// `NoSession` if none is open, `Serialize` if encoding fails and
    /// `Other` if the file cannot be written.
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<(), MonitorError> {
        let path = path.as_ref();
        let json = {
            let state = self.state.lock().await;
            let Some(active) = state.active.as_ref() else {
                return Err(MonitorError::NoSession);
            };
            let empty = AlgorithmResult::default();
            self.env
                .serializer
                .serialize(active.last_result.as_ref().unwrap_or(&empty))?
        };
        tokio::fs::write(path, json)
            .await
            .map_err(|e| MonitorError::Other(format!("could not write '{}': {e}", path.display())))
    }

    /// Open the session named on the command line.
    ///
    /// See [`BootstrapAction::from_args`]. Without a usable argument the
    /// collaborator is asked to show the new-session prompt.
    ///
    /// # Errors
    /// Returns argument errors and the opened session's initialization error.
    pub async fn bootstrap<I, S>(&self, args: I) -> Result<BootstrapAction, MonitorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let action = BootstrapAction::from_args(args)?;
        match &action {
            BootstrapAction::Stream(port) => {
                self.open(StreamParams::new(LOCAL_HOST, *port)).await?;
            }
            BootstrapAction::File(path) => {
                self.open(FileParams {
                    path: path.clone(),
                    watch: true,
                })
                .await?;
            }
            BootstrapAction::Prompt => self.notifier.notify(MonitorEvent::ShowNewSession),
        }
        Ok(action)
    }

    /// Wait for the next delivery and handle it.
    ///
    /// Returns `false` once the delivery channel is closed.
    pub async fn process_next(&self) -> bool {
        let next = self.rx.lock().await.recv().await;
        match next {
            Some(delivery) => {
                self.handle_delivery(delivery).await;
                true
            }
            None => false,
        }
    }

    /// Handle every delivery queued right now without waiting for more.
    ///
    /// Returns the number of deliveries handled.
    pub async fn process_pending(&self) -> usize {
        let mut handled = 0;
        loop {
            let next = self.rx.lock().await.try_recv();
            let Ok(delivery) = next else {
                break;
            };
            self.handle_delivery(delivery).await;
            handled += 1;
        }
        handled
    }

    /// Consume deliveries on a background task until the handle is stopped
    /// or dropped.
    pub fn spawn_delivery_loop(self: &Arc<Self>) -> WorkerHandle {
        let (stop, mut stop_rx) = StopSignal::new();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            loop {
                // Only the receive races the stop signal; a delivery taken off
                // the channel is always handled.
                let next = tokio::select! {
                    biased;
                    () = stopped(&mut stop_rx) => break,
                    next = async { this.rx.lock().await.recv().await } => next,
                };
                let Some(delivery) = next else {
                    break;
                };
                this.handle_delivery(delivery).await;
            }
        });
        WorkerHandle::new(task, stop)
    }

    async fn handle_delivery(&self, delivery: Delivery) {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.as_mut().filter(|a| a.id == delivery.session_id) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(target = "algomon::session", session_id = delivery.session_id, "dropping stale delivery");
            return;
        };

        match delivery.event {
            SessionEvent::Result(context) => {
                let acc = active
                    .last_result
                    .get_or_insert_with(|| AlgorithmResult::new(context.result.result_type));
                merge_result(acc, &context.result);
                self.mutators.run(acc);
                self.charts.update(acc);
                let merged = acc.clone();
                self.notifier.notify(MonitorEvent::SessionUpdated(ResultContext {
                    result: merged,
                    ..context
                }));
            }
            SessionEvent::StateChanged(s) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(target = "algomon::session", state = ?s, "session state changed");
                self.notifier.notify(MonitorEvent::StateChanged(s));
            }
            SessionEvent::Log { message, level } => self.notify_log(message, level),
        }
    }

    fn notify_log(&self, message: String, level: LogLevel) {
        self.notifier.notify(MonitorEvent::LogEntry {
            time: Utc::now(),
            message,
            level,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_args() {
        assert_eq!(
            BootstrapAction::from_args(Vec::<String>::new()).unwrap(),
            BootstrapAction::Prompt
        );
        assert_eq!(
            BootstrapAction::from_args(["algomon", "1234"]).unwrap(),
            BootstrapAction::Stream(1234)
        );
        assert_eq!(
            BootstrapAction::from_args(["run.JSON"]).unwrap(),
            BootstrapAction::File(PathBuf::from("run.JSON"))
        );
        assert_eq!(
            BootstrapAction::from_args(["--verbose"]).unwrap(),
            BootstrapAction::Prompt
        );
        assert!(matches!(
            BootstrapAction::from_args(["70000"]),
            Err(MonitorError::InvalidArg(_))
        ));
    }
}
