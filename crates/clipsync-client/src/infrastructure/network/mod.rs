//! Network layer: the agent's connection to the hub.
//!
//! # Connection lifecycle (for beginners)
//!
//! ```text
//!        ┌──────────────┐  connect ok   ┌───────────┐
//!   ┌───►│  Connecting  │──────────────►│ Connected │
//!   │    └──────┬───────┘               └─────┬─────┘
//!   │           │ connect failed              │ read deadline, transport
//!   │           ▼                             │ error, hub closed, write
//!   │    ┌──────────────┐◄────────────────────┘ timeout
//!   └────│ Disconnected │  wait backoff (1s, 2s, 4s … 30s)
//!        └──────────────┘
//! ```
//!
//! While connected, four duties run as separate tasks in one `JoinSet`:
//!
//! | Duty       | What it does                                           |
//! |------------|--------------------------------------------------------|
//! | listener   | Reads frames, applies them to [`SyncState`]            |
//! | poller     | Reads the OS clipboard every `poll_interval`           |
//! | heartbeat  | Pings the hub every `ping_period`                      |
//! | commands   | Executes [`AgentCommand`]s from the console            |
//!
//! All four watch the same per-connection `CancellationToken`, a child of the
//! agent's shutdown token.  When any duty ends, the token is cancelled and
//! the set is drained before the agent backs off, so no duty from an old
//! connection can outlive it.
//!
//! Faults are never fatal: the agent keeps retrying until it is told to shut
//! down.  Its progress is published through a `tokio::sync::watch` channel
//! as [`AgentStatus`].

pub mod connection;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_with_config, tungstenite, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use clipsync_core::protocol::timing::MAX_RELAYED_MESSAGE_SIZE;
use clipsync_core::{DeviceId, ProtocolError};

use crate::application::backoff::Backoff;
use crate::application::clipboard::ClipboardAccess;
use crate::application::sync_state::SyncState;
use crate::domain::config::AgentConfig;

/// Capacity of the console → agent command queue.
const COMMAND_QUEUE_CAPACITY: usize = 32;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type SharedState = Arc<Mutex<SyncState>>;

/// Locks the shared state.  A panic while holding the lock cannot leave the
/// plain-data state half-updated in a way that matters, so poisoning is
/// ignored.
pub(crate) fn lock_state(state: &SharedState) -> MutexGuard<'_, SyncState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that end one connection attempt.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme '{0}', expected ws or wss")]
    UnsupportedScheme(String),

    #[error("connect failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection closed by hub")]
    Closed,

    #[error("no frame from hub within {0:?}")]
    ReadDeadline(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("connection task failed: {0}")]
    Task(String),

    #[error("agent has stopped")]
    Stopped,
}

// ── Status and commands ───────────────────────────────────────────────────────

/// Where the agent is in its connect/reconnect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatus {
    pub state: ConnectionState,
    /// Why the last connection attempt or connection ended.
    pub last_error: Option<String>,
    /// Delay before the next attempt; set only while waiting to reconnect.
    pub retry_in: Option<Duration>,
    /// Consecutive failed attempts since the last successful connect.
    pub failures: u32,
}

impl Default for AgentStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_error: None,
            retry_in: None,
            failures: 0,
        }
    }
}

/// Requests from the console (or tests) to the running agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    AcceptOffer,
    RejectOffer,
    ToggleSync,
    /// Offer the file at `path` to `target` (`None` for every device).
    OfferFile {
        target: Option<DeviceId>,
        path: PathBuf,
    },
    /// Close the connection and stop reconnecting.
    Shutdown,
}

impl AgentCommand {
    fn name(&self) -> &'static str {
        match self {
            AgentCommand::AcceptOffer => "accept",
            AgentCommand::RejectOffer => "reject",
            AgentCommand::ToggleSync => "sync",
            AgentCommand::OfferFile { .. } => "offer",
            AgentCommand::Shutdown => "quit",
        }
    }
}

// ── Handle ────────────────────────────────────────────────────────────────────

/// Cloneable front end to a running [`SyncAgent`].
#[derive(Clone)]
pub struct AgentHandle {
    commands: mpsc::Sender<AgentCommand>,
    status: watch::Receiver<AgentStatus>,
    state: SharedState,
    shutdown: CancellationToken,
}

impl AgentHandle {
    /// Queues a command for the agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Stopped`] once the agent has exited.
    pub async fn send(&self, command: AgentCommand) -> Result<(), AgentError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AgentError::Stopped)
    }

    /// The latest published status.
    pub fn status(&self) -> AgentStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<AgentStatus> {
        self.status.clone()
    }

    /// A copy of the agent's sync state.
    pub fn state(&self) -> SyncState {
        lock_state(&self.state).clone()
    }

    /// Stops the agent without going through the command queue.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

/// Keeps one device connected to the hub and its clipboard in step.
pub struct SyncAgent {
    config: Arc<AgentConfig>,
    clipboard: Arc<dyn ClipboardAccess>,
    state: SharedState,
    status: watch::Sender<AgentStatus>,
    commands: Arc<AsyncMutex<mpsc::Receiver<AgentCommand>>>,
    shutdown: CancellationToken,
}

impl SyncAgent {
    /// Creates an agent and the handle used to drive it.
    pub fn new(config: AgentConfig, clipboard: Arc<dyn ClipboardAccess>) -> (Self, AgentHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (status_tx, status_rx) = watch::channel(AgentStatus::default());
        let state: SharedState = Arc::new(Mutex::new(SyncState::new()));
        let shutdown = CancellationToken::new();

        let agent = Self {
            config: Arc::new(config),
            clipboard,
            state: Arc::clone(&state),
            status: status_tx,
            commands: Arc::new(AsyncMutex::new(command_rx)),
            shutdown: shutdown.clone(),
        };
        let handle = AgentHandle {
            commands: command_tx,
            status: status_rx,
            state,
            shutdown,
        };
        (agent, handle)
    }

    /// Connects, serves, and reconnects until shut down.
    pub async fn run(self) {
        let mut backoff = Backoff::new(self.config.backoff_base, self.config.backoff_max);
        let mut last_error: Option<String> = None;

        while !self.shutdown.is_cancelled() {
            self.publish(ConnectionState::Connecting, last_error.clone(), None, backoff.attempts());

            let connected = tokio::select! {
                result = self.connect() => result,
                _ = self.shutdown.cancelled() => break,
            };

            let result = match connected {
                Ok(ws) => {
                    backoff.reset();
                    last_error = None;
                    info!("connected to {} as '{}'", self.config.server_url, self.config.hostname);
                    self.publish(ConnectionState::Connected, None, None, 0);
                    connection::serve(ws, self.connection_context()).await
                }
                Err(e) => Err(e),
            };

            if self.shutdown.is_cancelled() {
                break;
            }

            let error = result.err().unwrap_or(AgentError::Closed);
            warn!("disconnected: {error}");
            last_error = Some(error.to_string());

            let delay = backoff.next_delay();
            info!("reconnecting in {delay:?}");
            self.publish(
                ConnectionState::Disconnected,
                last_error.clone(),
                Some(delay),
                backoff.attempts(),
            );

            if !self.wait_offline(delay).await {
                break;
            }
        }

        self.publish(ConnectionState::Disconnected, last_error, None, backoff.attempts());
        info!("agent stopped");
    }

    async fn connect(&self) -> Result<WsStream, AgentError> {
        let url = hub_url(&self.config)?;
        debug!("connecting to {}", self.config.server_url);

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(MAX_RELAYED_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(MAX_RELAYED_MESSAGE_SIZE);

        match timeout(
            self.config.write_wait,
            connect_async_with_config(url.as_str(), Some(ws_config), false),
        )
        .await
        {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(AgentError::Connect(e)),
            Err(_) => Err(AgentError::ConnectTimeout(self.config.write_wait)),
        }
    }

    /// Sleeps for `delay` while still answering commands that need no
    /// connection.  Returns `false` if the agent should stop.
    async fn wait_offline(&self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        let mut commands = self.commands.lock().await;
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                _ = self.shutdown.cancelled() => return false,
                command = commands.recv(), if commands_open => match command {
                    Some(AgentCommand::Shutdown) => {
                        info!("shutdown requested");
                        self.shutdown.cancel();
                        return false;
                    }
                    Some(AgentCommand::ToggleSync) => {
                        lock_state(&self.state).toggle_sync();
                    }
                    Some(other) => warn!("not connected; '{}' ignored", other.name()),
                    None => commands_open = false,
                },
            }
        }
    }

    fn connection_context(&self) -> connection::Context {
        connection::Context {
            config: Arc::clone(&self.config),
            clipboard: Arc::clone(&self.clipboard),
            state: Arc::clone(&self.state),
            commands: Arc::clone(&self.commands),
            shutdown: self.shutdown.clone(),
        }
    }

    fn publish(
        &self,
        state: ConnectionState,
        last_error: Option<String>,
        retry_in: Option<Duration>,
        failures: u32,
    ) {
        self.status.send_replace(AgentStatus {
            state,
            last_error,
            retry_in,
            failures,
        });
    }
}

/// Builds the hub URL with the `apiKey` and `hostname` query parameters.
///
/// # Errors
///
/// Returns an error if `server_url` does not parse or is not `ws`/`wss`.
pub fn hub_url(config: &AgentConfig) -> Result<Url, AgentError> {
    let mut url = Url::parse(&config.server_url)?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(AgentError::UnsupportedScheme(other.to_string())),
    }
    url.query_pairs_mut()
        .append_pair("apiKey", &config.api_key)
        .append_pair("hostname", &config.hostname);
    Ok(url)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clipboard::MemoryClipboard;

    fn config(url: &str) -> AgentConfig {
        AgentConfig {
            server_url: url.to_string(),
            api_key: "s3cret".to_string(),
            hostname: "my pc".to_string(),
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_hub_url_appends_encoded_query() {
        // Arrange
        let config = config("ws://hub.local:8080/ws");

        // Act
        let url = hub_url(&config).unwrap();

        // Assert
        assert_eq!(url.path(), "/ws");
        assert_eq!(url.query(), Some("apiKey=s3cret&hostname=my+pc"));
    }

    #[test]
    fn test_hub_url_rejects_http_scheme() {
        let result = hub_url(&config("http://hub.local/ws"));
        assert!(matches!(result, Err(AgentError::UnsupportedScheme(s)) if s == "http"));
    }

    #[test]
    fn test_hub_url_rejects_garbage() {
        assert!(matches!(
            hub_url(&config("not a url")),
            Err(AgentError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_new_agent_starts_disconnected_with_sync_enabled() {
        let (_agent, handle) = SyncAgent::new(
            config("ws://127.0.0.1:1/ws"),
            Arc::new(MemoryClipboard::new()),
        );

        assert_eq!(handle.status(), AgentStatus::default());
        assert!(handle.state().sync_enabled());
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_immediately() {
        // Arrange
        let (agent, handle) = SyncAgent::new(
            config("ws://127.0.0.1:1/ws"),
            Arc::new(MemoryClipboard::new()),
        );
        handle.shutdown();

        // Act
        let finished = timeout(Duration::from_secs(1), agent.run()).await;

        // Assert
        assert!(finished.is_ok());
        assert_eq!(handle.status().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_send_after_agent_dropped_reports_stopped() {
        let (agent, handle) = SyncAgent::new(
            config("ws://127.0.0.1:1/ws"),
            Arc::new(MemoryClipboard::new()),
        );
        drop(agent);

        let result = handle.send(AgentCommand::ToggleSync).await;

        assert!(matches!(result, Err(AgentError::Stopped)));
    }
}
