//! Per-connection lifecycle: admission, read loop, heartbeat, teardown.
//!
//! # States (for beginners)
//!
//! ```text
//!   Active ──(read deadline / read error / Close frame / oversized frame)──► Closing
//!   Active ──(ping write failed)─────────────────────────────────────────► Closing
//!   Active ──(hub closed the link after a failed relay)──────────────────► Closing
//!   Closing ──(best-effort Close frame, hub.remove)──────────────────────► Closed
//! ```
//!
//! While `Active`, two things run side by side:
//!
//! - the **read loop**, which decodes text frames and submits them to the hub.
//!   Every inbound frame, pongs included, resets the read deadline
//!   (`pong_wait`).
//! - the **heartbeat task**, which pings the device every `ping_period`.  The
//!   first tick of the interval fires immediately and is skipped.
//!
//! Whichever finishes first decides why the session ends; the other is
//! cancelled.  Teardown always goes through [`Hub::remove`], which closes the
//! link exactly once no matter how many paths noticed the failure.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::time::{interval, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use clipsync_core::{decode_envelope, DeviceId};

use crate::application::hub::Hub;
use crate::application::link::DeviceLink;
use crate::application::registry::Device;
use crate::domain::config::ServerConfig;
use crate::infrastructure::link::WsLink;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closing,
    Closed,
}

/// Why a session left the `Active` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Nothing arrived within the read deadline.
    ReadDeadline(Duration),
    /// The device sent a Close frame or the stream ended.
    PeerClosed,
    /// The transport failed while reading (includes oversized frames).
    ReadError(String),
    /// A heartbeat ping could not be written.
    PingFailed(String),
    /// The hub closed the link, usually after a failed relay write.
    Evicted,
    /// The hub dispatch task is gone.
    HubStopped,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ReadDeadline(d) => write!(f, "no frame within {d:?}"),
            SessionEnd::PeerClosed => f.write_str("closed by peer"),
            SessionEnd::ReadError(e) => write!(f, "read error: {e}"),
            SessionEnd::PingFailed(e) => write!(f, "heartbeat failed: {e}"),
            SessionEnd::Evicted => f.write_str("link closed by hub"),
            SessionEnd::HubStopped => f.write_str("hub stopped"),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One admitted device connection.
pub struct Session {
    id: DeviceId,
    hub: Arc<Hub>,
    link: Arc<WsLink>,
    config: Arc<ServerConfig>,
    state: SessionState,
}

impl Session {
    /// Splits `ws`, registers the device with the hub and returns the session
    /// together with the read half of the socket.
    ///
    /// Returns `None` if the hub refused the device; the socket is closed in
    /// that case.
    pub async fn admit(
        hub: Arc<Hub>,
        ws: WebSocketStream<TcpStream>,
        hostname: String,
        config: Arc<ServerConfig>,
    ) -> Option<(Self, SplitStream<WebSocketStream<TcpStream>>)> {
        let id = DeviceId::generate();
        let (sink, stream) = ws.split();
        let link = Arc::new(WsLink::new(sink, config.write_wait));

        let device = Device::new(id.clone(), hostname, link.clone());
        if let Err(e) = hub.admit(device).await {
            warn!("device {id}: admission failed: {e}");
            link.close().await;
            return None;
        }

        let session = Self {
            id,
            hub,
            link,
            config,
            state: SessionState::Active,
        };
        Some((session, stream))
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session until it ends, then tears it down.
    pub async fn run(mut self, stream: SplitStream<WebSocketStream<TcpStream>>) -> SessionEnd {
        let link: Arc<dyn DeviceLink> = self.link.clone();
        let mut heartbeat = tokio::spawn(heartbeat_loop(
            self.id.clone(),
            link,
            self.config.ping_period,
            self.config.write_wait,
        ));

        let end = tokio::select! {
            end = read_loop(&self.hub, &self.id, stream, self.config.pong_wait) => end,
            joined = &mut heartbeat => match joined {
                Ok(end) => end,
                Err(e) => SessionEnd::PingFailed(e.to_string()),
            },
            _ = self.link.closed() => SessionEnd::Evicted,
        };
        heartbeat.abort();

        self.transition(SessionState::Closing, &end);
        self.hub.remove(&self.id).await;
        // Already closed by `remove` unless another path removed it first.
        // Either way this returns at once; the Close frame goes out in the
        // background, bounded by the write deadline.
        self.link.close().await;
        self.transition(SessionState::Closed, &end);
        end
    }

    fn transition(&mut self, next: SessionState, end: &SessionEnd) {
        debug!("device {}: {:?} -> {next:?} ({end})", self.id, self.state);
        self.state = next;
    }
}

// ── Read loop ─────────────────────────────────────────────────────────────────

async fn read_loop(
    hub: &Hub,
    id: &DeviceId,
    mut stream: SplitStream<WebSocketStream<TcpStream>>,
    pong_wait: Duration,
) -> SessionEnd {
    loop {
        let frame = match timeout(pong_wait, stream.next()).await {
            Err(_) => return SessionEnd::ReadDeadline(pong_wait),
            Ok(None) => return SessionEnd::PeerClosed,
            Ok(Some(Err(e))) => return SessionEnd::ReadError(e.to_string()),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => match decode_envelope(&text) {
                Ok(envelope) => {
                    debug!("device {id}: received {}", envelope.event.kind());
                    // Whatever senderId the device put in the frame is
                    // discarded; the hub attributes it to this connection.
                    if hub.submit(id.clone(), envelope.event).await.is_err() {
                        return SessionEnd::HubStopped;
                    }
                }
                Err(e) => warn!("device {id}: {e}; frame dropped"),
            },
            WsMessage::Binary(data) => {
                debug!("device {id}: binary frame ({} bytes) ignored", data.len());
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {
                debug!("device {id}: keepalive frame");
            }
            WsMessage::Close(_) => return SessionEnd::PeerClosed,
            WsMessage::Frame(_) => {}
        }
    }
}

// ── Heartbeat ─────────────────────────────────────────────────────────────────

/// Pings `link` every `ping_period` until a ping fails or times out.
pub async fn heartbeat_loop(
    id: DeviceId,
    link: Arc<dyn DeviceLink>,
    ping_period: Duration,
    write_wait: Duration,
) -> SessionEnd {
    let mut ticker = interval(ping_period);
    ticker.tick().await; // Skip the immediate first tick.

    loop {
        ticker.tick().await;
        match timeout(write_wait, link.send_ping()).await {
            Ok(Ok(())) => debug!("device {id}: ping sent"),
            Ok(Err(e)) => return SessionEnd::PingFailed(e.to_string()),
            Err(_) => {
                return SessionEnd::PingFailed(format!("timed out after {write_wait:?}"))
            }
        }
    }
}

/// Admits and runs one upgraded connection, logging how it ended.
pub async fn serve_device(
    hub: Arc<Hub>,
    ws: WebSocketStream<TcpStream>,
    hostname: String,
    config: Arc<ServerConfig>,
) {
    let Some((session, stream)) = Session::admit(hub, ws, hostname, config).await else {
        return;
    };
    let id = session.id().clone();
    let end = session.run(stream).await;
    info!("device {id}: session ended: {end}");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
