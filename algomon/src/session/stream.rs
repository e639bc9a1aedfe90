use std::sync::Arc;
use std::time::Duration;

use algomon_core::stream::{StopSignal, WorkerHandle, stopped};
use algomon_core::wire::{StreamPacket, decode_packet};
use algomon_core::{
    AlgorithmResult, FrameConnector, FrameSource, LogLevel, MonitorError, ResultContext,
    SessionLink, SessionState, StreamParams, merge_result,
};
use tokio::sync::{Mutex, mpsc, watch};

use super::SessionEnv;

/// Follows an engine that pushes result packets to a socket.
///
/// Two workers run per subscription:
/// - the listener receives messages with a bounded timeout, decodes them and
///   queues the packets;
/// - the drainer merges queued result packets into the accumulated result and
///   delivers the merged snapshot.
///
/// The accumulated result outlives subscriptions: resubscribing to the same
/// session continues where it stopped.
pub struct StreamSession {
    params: StreamParams,
    name: String,
    link: SessionLink,
    connector: Arc<dyn FrameConnector>,
    receive_timeout: Duration,
    accumulated: Arc<Mutex<AlgorithmResult>>,
    workers: Vec<WorkerHandle>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("params", &self.params)
            .field("state", &self.link.state())
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Build a stream session; no socket is opened until subscribing.
    #[must_use]
    pub fn new(params: StreamParams, link: SessionLink, env: &SessionEnv) -> Self {
        let name = format!("{}:{}", params.host, params.port);
        Self {
            params,
            name,
            link,
            connector: Arc::clone(&env.connector),
            receive_timeout: env.config.receive_timeout,
            accumulated: Arc::new(Mutex::new(AlgorithmResult::default())),
            workers: Vec::new(),
        }
    }

    /// `host:port` of the stream.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current subscription state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.link.state()
    }

    /// Subscribe to the stream.
    ///
    /// # Errors
    /// See [`subscribe`](Self::subscribe).
    pub async fn initialize(&mut self) -> Result<(), MonitorError> {
        self.subscribe().await
    }

    /// Connect the socket and start the listener and drainer.
    ///
    /// # Errors
    /// Returns `MonitorError::Connect` if the socket cannot be set up.
    pub async fn subscribe(&mut self) -> Result<(), MonitorError> {
        if self.state().is_subscribed() {
            return Ok(());
        }
        self.stop_workers();

        let endpoint = self.params.endpoint();
        let source = self.connector.connect(&endpoint).await?;

        let (stop, stop_rx) = StopSignal::new();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        self.link.set_state(SessionState::Subscribed);

        let listener = tokio::spawn(listen(
            source,
            self.receive_timeout,
            queue_tx,
            self.link.worker(),
            stop.clone(),
            stop_rx,
        ));
        let drainer = tokio::spawn(drain(
            queue_rx,
            Arc::clone(&self.accumulated),
            self.name.clone(),
            self.params.close_after_completed,
            self.link.worker(),
            stop.clone(),
            stop.subscribe(),
        ));
        self.workers.push(WorkerHandle::new(listener, stop.clone()));
        self.workers.push(WorkerHandle::new(drainer, stop));
        Ok(())
    }

    /// Stop both workers; the socket closes when the listener exits.
    pub fn unsubscribe(&mut self) {
        self.stop_workers();
        self.link.set_state(SessionState::Unsubscribed);
    }

    /// Stop both workers.
    ///
    /// # Errors
    /// Never fails; the socket is released by the listener.
    pub fn shutdown(&mut self) -> Result<(), MonitorError> {
        self.unsubscribe();
        Ok(())
    }

    fn stop_workers(&mut self) {
        for w in self.workers.drain(..) {
            w.cancel();
        }
    }
}

async fn listen(
    mut source: Box<dyn FrameSource>,
    timeout: Duration,
    queue: mpsc::UnboundedSender<StreamPacket>,
    link: SessionLink,
    stop: StopSignal,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let received = tokio::select! {
            biased;
            () = stopped(&mut stop_rx) => break,
            r = source.recv_frames(timeout) => r,
        };
        match received {
            Ok(None) => {}
            Ok(Some(frames)) => {
                let [payload] = frames.as_slice() else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(target = "algomon::stream", frames = frames.len(), "dropping multipart message");
                    continue;
                };
                match decode_packet(payload) {
                    Ok(Some(packet)) => {
                        if queue.send(packet).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(target = "algomon::stream", "dropping unhandled packet type");
                    }
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(target = "algomon::stream", error = %_e, "dropping malformed packet");
                    }
                }
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(target = "algomon::stream", error = %e, "stream receive failed");
                link.log(format!("Stream receive failed: {e}"), LogLevel::Error);
                link.set_state(SessionState::Unsubscribed);
                stop.trigger();
                break;
            }
        }
    }
}

async fn drain(
    mut queue: mpsc::UnboundedReceiver<StreamPacket>,
    accumulated: Arc<Mutex<AlgorithmResult>>,
    name: String,
    close_after_completed: bool,
    link: SessionLink,
    stop: StopSignal,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let packet = tokio::select! {
            biased;
            () = stopped(&mut stop_rx) => break,
            p = queue.recv() => match p {
                Some(p) => p,
                None => break,
            },
        };

        let (partial, progress, project) = match packet {
            StreamPacket::BacktestResult {
                result,
                progress,
                project,
                ..
            } => (result, Some(progress), project),
            StreamPacket::LiveResult { result } => (result, None, None),
            StreamPacket::Log(message) => {
                link.log(message, LogLevel::Log);
                continue;
            }
            StreamPacket::Debug(message) => {
                link.log(message, LogLevel::Debug);
                continue;
            }
        };

        let snapshot = {
            let mut acc = accumulated.lock().await;
            merge_result(&mut acc, &partial);
            acc.clone()
        };
        let context = ResultContext {
            name: name.clone(),
            project,
            result: snapshot,
            progress,
        };
        let completed = context.completed();
        if !link.deliver(context) {
            break;
        }

        if completed && close_after_completed {
            #[cfg(feature = "tracing")]
            tracing::info!(target = "algomon::stream", session = %name, "backtest completed, closing stream");
            link.set_state(SessionState::Unsubscribed);
            stop.trigger();
            break;
        }
    }
}
