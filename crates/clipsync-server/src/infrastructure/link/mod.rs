//! [`DeviceLink`] implementations.
//!
//! - [`WsLink`] writes to the sink half of a real WebSocket connection.
//! - [`mock::MockLink`] records frames in memory for unit tests.

pub mod mock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::application::link::{DeviceLink, LinkError};

/// Write half of an accepted WebSocket connection.
pub type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// A device link backed by a WebSocket sink.
///
/// The sink is behind a `tokio::sync::Mutex` because the router and the
/// session heartbeat both write to it.  The lock is held for one frame at a
/// time.
///
/// [`DeviceLink::close`] never waits on the peer: it marks the link closed and
/// hands the Close frame to a background task bounded by `write_wait`.  A peer
/// that stopped reading (full TCP window, sink lock held by a stuck write)
/// cannot stall the caller, which is usually the hub's dispatch task.
pub struct WsLink {
    sink: Arc<Mutex<WsSink>>,
    write_wait: Duration,
    closing: AtomicBool,
    closed: CancellationToken,
}

impl WsLink {
    pub fn new(sink: WsSink, write_wait: Duration) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            write_wait,
            closing: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    /// Resolves once [`DeviceLink::close`] has been called.
    ///
    /// The session read loop selects on this so a device evicted by the
    /// router stops reading immediately instead of waiting for its read
    /// deadline.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    async fn send(&self, message: WsMessage) -> Result<(), LinkError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| LinkError::Transport(e.to_string()))
    }
}

#[async_trait]
impl DeviceLink for WsLink {
    async fn send_text(&self, text: String) -> Result<(), LinkError> {
        self.send(WsMessage::Text(text)).await
    }

    async fn send_ping(&self) -> Result<(), LinkError> {
        self.send(WsMessage::Ping(Vec::new())).await
    }

    async fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        self.closed.cancel();
        // Closing the sink sends a Close frame and flushes it.  A peer that
        // has already gone away makes this fail, which is fine.
        let sink = Arc::clone(&self.sink);
        let write_wait = self.write_wait;
        tokio::spawn(async move {
            match timeout(write_wait, async { sink.lock().await.close().await }).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("close frame not delivered: {e}"),
                Err(_) => debug!("close frame not delivered within {write_wait:?}"),
            }
        });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::time::Instant;
    use tokio::net::TcpListener;

    /// Opens a WebSocket pair over loopback.  Returns the hub-side link and
    /// the peer, which the caller may simply never read.
    async fn link_pair(write_wait: Duration) -> (WsLink, WebSocketStream<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let tcp = TcpStream::connect(addr).await.unwrap();
            tokio_tungstenite::client_async(format!("ws://{addr}/ws"), tcp)
                .await
                .unwrap()
                .0
        });
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let (sink, _stream) = ws.split();
        (WsLink::new(sink, write_wait), peer.await.unwrap())
    }

    #[tokio::test]
    async fn test_close_returns_immediately_when_peer_stops_reading() {
        // Arrange: fill the socket until a write stalls on the silent peer
        let (link, _peer) = link_pair(Duration::from_millis(200)).await;
        let chunk = "x".repeat(256 * 1024);
        let mut stalled = false;
        for _ in 0..1000 {
            if timeout(Duration::from_millis(200), link.send_text(chunk.clone()))
                .await
                .is_err()
            {
                stalled = true;
                break;
            }
        }
        assert!(stalled, "peer never applied backpressure");

        // Act
        let started = Instant::now();
        let closed = timeout(Duration::from_secs(1), link.close()).await;

        // Assert
        assert!(closed.is_ok(), "close waited on the stalled peer");
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(timeout(Duration::from_millis(100), link.closed()).await.is_ok());
        assert!(matches!(
            link.send_text("late".into()).await,
            Err(LinkError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_twice_returns_immediately() {
        let (link, _peer) = link_pair(Duration::from_millis(200)).await;

        link.close().await;
        let second = timeout(Duration::from_millis(100), link.close()).await;

        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_close_sends_close_frame_to_reading_peer() {
        // Arrange
        let (link, mut peer) = link_pair(Duration::from_secs(1)).await;

        // Act
        link.close().await;

        // Assert: the peer sees a Close frame (or the end of the stream)
        let next = timeout(Duration::from_secs(2), peer.next()).await.unwrap();
        assert!(matches!(next, Some(Ok(WsMessage::Close(_))) | None));
    }
}
