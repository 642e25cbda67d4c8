//! WebSocket server: accept loop, authorization and health probe.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Answering `GET /health` with `200 OK` without touching the hub.
//! 3. Upgrading `GET /ws?apiKey=…&hostname=…` to a WebSocket.  A wrong key is
//!    refused with `403 Forbidden: Invalid API Key`, any other path with
//!    `404`, before the device ever reaches the registry.
//! 4. Handing each upgraded connection to its own session task.
//! 5. Stopping when the `running` flag is cleared.
//!
//! # Why peek for `/health`?
//!
//! The WebSocket handshake rejects any request that is not an Upgrade before
//! the header callback runs, so a plain HTTP probe would only ever see a
//! `400`.  The accept path therefore peeks at the request line first and
//! serves health probes itself.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error, info, warn};

use clipsync_core::protocol::timing::MAX_MESSAGE_SIZE;

use crate::application::hub::Hub;
use crate::domain::config::ServerConfig;
use crate::infrastructure::session::serve_device;

/// Path devices connect to.
pub const WS_PATH: &str = "/ws";

/// Hostname recorded for devices that do not send one.
pub const UNKNOWN_HOSTNAME: &str = "Unknown";

const HEALTH_REQUEST_PREFIXES: [&[u8]; 2] = [b"GET /health ", b"GET /health?"];
const HEALTH_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

// ── Authorization ─────────────────────────────────────────────────────────────

/// Why an upgrade request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotFound,
    Forbidden,
}

impl Rejection {
    fn into_response(self) -> ErrorResponse {
        let (status, body) = match self {
            Rejection::NotFound => (StatusCode::NOT_FOUND, "Not Found"),
            Rejection::Forbidden => (StatusCode::FORBIDDEN, "Forbidden: Invalid API Key"),
        };
        let mut response = ErrorResponse::new(Some(body.to_string()));
        *response.status_mut() = status;
        response
    }
}

/// Checks the request target of an upgrade request.
///
/// Returns the device's hostname (or [`UNKNOWN_HOSTNAME`]) when the path is
/// [`WS_PATH`] and the `apiKey` query parameter equals `api_key`.
pub fn authorize(path: &str, query: Option<&str>, api_key: &str) -> Result<String, Rejection> {
    if path != WS_PATH {
        return Err(Rejection::NotFound);
    }

    let mut presented_key = None;
    let mut hostname = None;
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "apiKey" if presented_key.is_none() => presented_key = Some(value.into_owned()),
            "hostname" if hostname.is_none() => hostname = Some(value.into_owned()),
            _ => {}
        }
    }

    if presented_key.as_deref() != Some(api_key) {
        return Err(Rejection::Forbidden);
    }
    Ok(hostname
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string()))
}

// ── Server ────────────────────────────────────────────────────────────────────

/// A bound hub listener.
pub struct Server {
    listener: TcpListener,
    hub: Arc<Hub>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Binds the listener on `config.bind_addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(config: ServerConfig, hub: Arc<Hub>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;
        Ok(Self {
            listener,
            hub,
            config: Arc::new(config),
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Accepts connections until `running` is set to `false`.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        info!("clipsync hub listening on {}", self.local_addr()?);

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            // Short timeout so the `running` flag is checked regularly.
            match timeout(Duration::from_millis(200), self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("connection from {peer_addr}");
                    let hub = Arc::clone(&self.hub);
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, hub, config).await;
                    });
                }
                Ok(Err(e)) => error!("accept error: {e}"),
                Err(_) => {}
            }
        }

        Ok(())
    }
}

/// Creates a hub, starts its dispatch task and serves until `running` is
/// cleared.
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let (hub, rx) = Hub::new(&config);
    tokio::spawn(Arc::clone(&hub).run(rx));
    Server::bind(config, hub).await?.run(running).await
}

// ── Per-connection handling ───────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: Arc<Hub>,
    config: Arc<ServerConfig>,
) {
    match is_health_probe(&stream, config.write_wait).await {
        Ok(true) => {
            if let Err(e) = serve_health(stream, config.write_wait).await {
                debug!("health probe from {peer_addr}: {e:#}");
            }
            return;
        }
        Ok(false) => {}
        Err(e) => {
            debug!("connection from {peer_addr} dropped: {e:#}");
            return;
        }
    }

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(MAX_MESSAGE_SIZE);

    let mut hostname = None;
    let api_key = config.api_key.as_str();
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        match authorize(request.uri().path(), request.uri().query(), api_key) {
            Ok(name) => {
                hostname = Some(name);
                Ok(response)
            }
            Err(rejection) => {
                warn!("refused {} from {peer_addr}: {rejection:?}", request.uri().path());
                Err(rejection.into_response())
            }
        }
    };

    let ws = match timeout(
        config.write_wait,
        accept_hdr_async_with_config(stream, callback, Some(ws_config)),
    )
    .await
    {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            debug!("handshake with {peer_addr} failed: {e}");
            return;
        }
        Err(_) => {
            debug!("handshake with {peer_addr} timed out");
            return;
        }
    };

    let hostname = hostname.unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string());
    info!("device connected from {peer_addr} ({hostname})");
    serve_device(hub, ws, hostname, config).await;
}

/// Peeks at the request line without consuming it.
async fn is_health_probe(stream: &TcpStream, wait: Duration) -> anyhow::Result<bool> {
    let mut buf = [0u8; 16];
    let n = timeout(wait, stream.peek(&mut buf))
        .await
        .context("no request received")?
        .context("peek failed")?;
    Ok(HEALTH_REQUEST_PREFIXES
        .iter()
        .any(|prefix| buf[..n].starts_with(prefix)))
}

/// Consumes the probe's request headers and answers `200 OK`.
async fn serve_health(mut stream: TcpStream, wait: Duration) -> anyhow::Result<()> {
    let mut request = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") && request.len() < 8 * 1024 {
        let n = timeout(wait, stream.read(&mut chunk))
            .await
            .context("health request timed out")??;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
    }
    stream.write_all(HEALTH_RESPONSE).await?;
    stream.shutdown().await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
