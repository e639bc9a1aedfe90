use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared stop flag observed by one or more workers.
///
/// Cloning yields another handle to the same flag, so a worker can stop its
/// siblings (e.g. a stream drainer stopping the listener on completion).
#[derive(Debug, Clone)]
pub struct StopSignal(Arc<watch::Sender<bool>>);

impl StopSignal {
    /// A fresh, untriggered flag and a receiver for it.
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self(Arc::new(tx)), rx)
    }

    /// Another receiver of this flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }

    /// Raise the flag. Idempotent.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    /// `true` once the flag was raised.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

/// Resolve once the flag behind `rx` is raised or all senders are gone.
pub async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Handle to a background worker of a transport.
///
/// Dropping the handle raises the stop flag and aborts the task if it has not
/// finished yet.
#[derive(Debug)]
pub struct WorkerHandle {
    inner: Option<JoinHandle<()>>,
    stop_tx: Option<StopSignal>,
}

impl WorkerHandle {
    /// Wrap a spawned task and the stop flag it observes.
    #[must_use]
    pub const fn new(task: JoinHandle<()>, stop: StopSignal) -> Self {
        Self {
            inner: Some(task),
            stop_tx: Some(stop),
        }
    }

    /// Request a stop and wait for the task to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop_tx.take() {
            stop.trigger();
        }
        if let Some(task) = self.inner.take() {
            let _ = task.await;
        }
    }

    /// Request a stop without waiting; the task exits at its next suspension
    /// point.
    pub fn cancel(mut self) {
        if let Some(stop) = self.stop_tx.take() {
            stop.trigger();
        }
        // Dropping the JoinHandle detaches the task.
        self.inner.take();
    }

    /// `true` if the task has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            stop.trigger();
        }
        if let Some(task) = self.inner.take()
            && !task.is_finished()
        {
            task.abort();
        }
    }
}
