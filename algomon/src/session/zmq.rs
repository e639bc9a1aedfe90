use std::time::Duration;

use algomon_core::{FrameConnector, FrameSource, MonitorError};
use async_trait::async_trait;
use zeromq::{PullSocket, Socket, SocketRecv};

/// Frame connector backed by a ZeroMQ pull socket.
///
/// Endpoints use the connect prefix `>` (e.g. `>tcp://localhost:1234`); the
/// prefix is stripped before dialling. The engine binds the matching push
/// socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqConnector;

#[async_trait]
impl FrameConnector for ZmqConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FrameSource>, MonitorError> {
        let address = endpoint.trim_start_matches('>');
        let mut socket = PullSocket::new();
        socket
            .connect(address)
            .await
            .map_err(|e| MonitorError::connect(endpoint, e.to_string()))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(target = "algomon::stream", endpoint, "pull socket connected");
        Ok(Box::new(ZmqSource { socket }))
    }
}

struct ZmqSource {
    socket: PullSocket,
}

#[async_trait]
impl FrameSource for ZmqSource {
    async fn recv_frames(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<Vec<Vec<u8>>>, MonitorError> {
        match tokio::time::timeout(timeout, self.socket.recv()).await {
            Err(_) => Ok(None),
            Ok(Ok(msg)) => Ok(Some(
                msg.into_vec().into_iter().map(|frame| frame.to_vec()).collect(),
            )),
            Ok(Err(e)) => Err(MonitorError::Other(format!("receive failed: {e}"))),
        }
    }
}
