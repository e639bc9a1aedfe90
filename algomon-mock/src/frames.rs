use std::sync::Arc;
use std::time::Duration;

use algomon_core::{FrameConnector, FrameSource, MonitorError};
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

enum Inbound {
    Message(Vec<Vec<u8>>),
    Fail(MonitorError),
}

#[derive(Default)]
struct Shared {
    // Sender of the currently connected socket.
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    endpoints: Vec<String>,
}

/// Frame connector backed by in-memory channels.
///
/// Every `connect` opens a fresh socket; the controller always feeds the most
/// recent one.
#[derive(Clone, Default)]
pub struct MockFrames {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side handle feeding a [`MockFrames`] socket.
#[derive(Clone)]
pub struct FramesController {
    shared: Arc<Mutex<Shared>>,
}

impl MockFrames {
    /// A connector and its controller.
    #[must_use]
    pub fn new() -> (Arc<Self>, FramesController) {
        let me = Self::default();
        let ctrl = FramesController {
            shared: Arc::clone(&me.shared),
        };
        (Arc::new(me), ctrl)
    }
}

impl FramesController {
    /// Push a single-frame message. Returns `false` if no socket is connected
    /// or it was closed.
    pub async fn push(&self, payload: impl Into<Vec<u8>>) -> bool {
        self.send(Inbound::Message(vec![payload.into()])).await
    }

    /// Push a message made of several frames.
    pub async fn push_multipart(&self, frames: Vec<Vec<u8>>) -> bool {
        self.send(Inbound::Message(frames)).await
    }

    /// Make the next receive fail with `err`.
    pub async fn fail(&self, err: MonitorError) -> bool {
        self.send(Inbound::Fail(err)).await
    }

    /// Endpoints passed to `connect`, in call order.
    pub async fn endpoints(&self) -> Vec<String> {
        self.shared.lock().await.endpoints.clone()
    }

    /// `true` while the most recent socket is still held by a listener.
    pub async fn is_connected(&self) -> bool {
        self.shared
            .lock()
            .await
            .tx
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    async fn send(&self, msg: Inbound) -> bool {
        let tx = self.shared.lock().await.tx.clone();
        tx.is_some_and(|tx| tx.send(msg).is_ok())
    }
}

#[async_trait]
impl FrameConnector for MockFrames {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameSource>, MonitorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut shared = self.shared.lock().await;
        shared.endpoints.push(endpoint.to_string());
        shared.tx = Some(tx);
        Ok(Box::new(MockSource { rx }))
    }
}

struct MockSource {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameSource for MockSource {
    async fn recv_frames(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Vec<Vec<u8>>>, MonitorError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Err(_) | Ok(None) => Ok(None),
            Ok(Some(Inbound::Message(frames))) => Ok(Some(frames)),
            Ok(Some(Inbound::Fail(e))) => Err(e),
        }
    }
}

/// Connector whose `connect` always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingConnector;

#[async_trait]
impl FrameConnector for FailingConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameSource>, MonitorError> {
        Err(MonitorError::connect(endpoint, "connection refused"))
    }
}
