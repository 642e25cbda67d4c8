//! The four duties that run while the agent is connected.
//!
//! [`serve`] splits the socket, sends `request_devices` once, spawns the
//! duties into a `JoinSet`, and waits for the first one to finish.  Then it
//! cancels the rest, drains the set, and closes the socket.

use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::{spawn_blocking, JoinSet};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clipsync_core::{decode_envelope, encode_envelope, Envelope, Event};

use super::{lock_state, AgentCommand, AgentError, SharedState, WsStream};
use crate::application::clipboard::ClipboardAccess;
use crate::domain::config::AgentConfig;

/// What a connection borrows from its agent.
pub(crate) struct Context {
    pub(crate) config: Arc<AgentConfig>,
    pub(crate) clipboard: Arc<dyn ClipboardAccess>,
    pub(crate) state: SharedState,
    pub(crate) commands: Arc<AsyncMutex<mpsc::Receiver<AgentCommand>>>,
    /// The agent's shutdown token; each connection uses a child of it.
    pub(crate) shutdown: CancellationToken,
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// Write half of the socket, shared by every duty that sends.
#[derive(Clone)]
struct Outbound {
    sink: Arc<AsyncMutex<SplitSink<WsStream, WsMessage>>>,
    write_wait: Duration,
}

impl Outbound {
    fn new(sink: SplitSink<WsStream, WsMessage>, write_wait: Duration) -> Self {
        Self {
            sink: Arc::new(AsyncMutex::new(sink)),
            write_wait,
        }
    }

    async fn send_event(&self, event: Event) -> Result<(), AgentError> {
        let kind = event.kind();
        let text = encode_envelope(&Envelope::new(event))?;
        self.write(WsMessage::Text(text)).await?;
        debug!("sent {kind}");
        Ok(())
    }

    async fn write(&self, message: WsMessage) -> Result<(), AgentError> {
        let mut sink = self.sink.lock().await;
        match timeout(self.write_wait, sink.send(message)).await {
            Ok(result) => result.map_err(AgentError::from),
            Err(_) => Err(AgentError::WriteTimeout(self.write_wait)),
        }
    }

    /// Sends a Close frame; failures are irrelevant at this point.
    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Ok(Err(e)) = timeout(self.write_wait, sink.close()).await {
            debug!("close frame not delivered: {e}");
        }
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

/// Runs one connection until a duty ends or the agent shuts down.
///
/// Returns `Ok(())` when the agent's shutdown token was cancelled, otherwise
/// the error that ended the first duty.
pub(crate) async fn serve(ws: WsStream, ctx: Context) -> Result<(), AgentError> {
    let (sink, stream) = ws.split();
    let outbound = Outbound::new(sink, ctx.config.write_wait);

    outbound.send_event(Event::RequestDevices).await?;

    let token = ctx.shutdown.child_token();
    let mut duties: JoinSet<Result<(), AgentError>> = JoinSet::new();

    duties.spawn(until_cancelled(
        token.clone(),
        listen(
            stream,
            Arc::clone(&ctx.clipboard),
            Arc::clone(&ctx.state),
            ctx.config.pong_wait,
        ),
    ));
    duties.spawn(until_cancelled(
        token.clone(),
        poll_clipboard(
            outbound.clone(),
            Arc::clone(&ctx.clipboard),
            Arc::clone(&ctx.state),
            ctx.config.poll_interval,
        ),
    ));
    duties.spawn(until_cancelled(
        token.clone(),
        heartbeat(outbound.clone(), ctx.config.ping_period),
    ));
    duties.spawn(until_cancelled(
        token.clone(),
        handle_commands(
            Arc::clone(&ctx.commands),
            outbound.clone(),
            Arc::clone(&ctx.state),
            ctx.shutdown.clone(),
        ),
    ));

    let first = duties.join_next().await;
    token.cancel();
    while duties.join_next().await.is_some() {}
    outbound.close().await;

    match first {
        Some(Ok(result)) => result,
        Some(Err(e)) => Err(AgentError::Task(e.to_string())),
        None => Ok(()),
    }
}

async fn until_cancelled<F>(token: CancellationToken, duty: F) -> Result<(), AgentError>
where
    F: Future<Output = Result<(), AgentError>>,
{
    tokio::select! {
        _ = token.cancelled() => Ok(()),
        result = duty => result,
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

async fn listen(
    mut stream: SplitStream<WsStream>,
    clipboard: Arc<dyn ClipboardAccess>,
    state: SharedState,
    pong_wait: Duration,
) -> Result<(), AgentError> {
    loop {
        let frame = match timeout(pong_wait, stream.next()).await {
            Err(_) => return Err(AgentError::ReadDeadline(pong_wait)),
            Ok(None) => return Err(AgentError::Closed),
            Ok(Some(Err(e))) => return Err(AgentError::Transport(e)),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => apply_frame(&text, &clipboard, &state).await,
            WsMessage::Binary(data) => debug!("binary frame ({} bytes) ignored", data.len()),
            WsMessage::Ping(_) | WsMessage::Pong(_) => debug!("keepalive frame"),
            WsMessage::Close(_) => return Err(AgentError::Closed),
            WsMessage::Frame(_) => {}
        }
    }
}

/// Decodes one text frame, applies it to the state, and writes the OS
/// clipboard when the state says so.  Malformed frames are dropped.
pub(crate) async fn apply_frame(
    text: &str,
    clipboard: &Arc<dyn ClipboardAccess>,
    state: &SharedState,
) {
    let envelope = match decode_envelope(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("{e}; frame dropped");
            return;
        }
    };
    debug!("received {}", envelope.event.kind());

    let write = lock_state(state).apply_inbound(envelope);
    let Some(content) = write else {
        return;
    };

    let len = content.len();
    let writer = Arc::clone(clipboard);
    match spawn_blocking(move || writer.write(&content)).await {
        Ok(Ok(())) => debug!("clipboard updated ({len} bytes)"),
        Ok(Err(e)) => warn!("{e}"),
        Err(e) => warn!("clipboard write task failed: {e}"),
    }
}

// ── Poller ────────────────────────────────────────────────────────────────────

async fn poll_clipboard(
    outbound: Outbound,
    clipboard: Arc<dyn ClipboardAccess>,
    state: SharedState,
    period: Duration,
) -> Result<(), AgentError> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(event) = poll_once(&clipboard, &state).await {
            outbound.send_event(event).await?;
        }
    }
}

/// Reads the OS clipboard once and returns the update to send, if any.
///
/// Read failures are logged at `debug` and retried on the next tick.
pub(crate) async fn poll_once(
    clipboard: &Arc<dyn ClipboardAccess>,
    state: &SharedState,
) -> Option<Event> {
    let reader = Arc::clone(clipboard);
    let content = match spawn_blocking(move || reader.read()).await {
        Ok(Ok(content)) => content,
        Ok(Err(e)) => {
            debug!("{e}");
            return None;
        }
        Err(e) => {
            debug!("clipboard read task failed: {e}");
            return None;
        }
    };
    lock_state(state).on_local_clipboard(&content)
}

// ── Heartbeat ─────────────────────────────────────────────────────────────────

async fn heartbeat(outbound: Outbound, period: Duration) -> Result<(), AgentError> {
    let mut ticker = interval(period);
    ticker.tick().await; // Skip the immediate first tick.

    loop {
        ticker.tick().await;
        outbound.write(WsMessage::Ping(Vec::new())).await?;
        debug!("ping sent");
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn handle_commands(
    commands: Arc<AsyncMutex<mpsc::Receiver<AgentCommand>>>,
    outbound: Outbound,
    state: SharedState,
    shutdown: CancellationToken,
) -> Result<(), AgentError> {
    let mut commands = commands.lock().await;
    while let Some(command) = commands.recv().await {
        execute(command, &outbound, &state, &shutdown).await?;
    }

    // Every handle is gone; the connection itself stays up.
    std::future::pending::<()>().await;
    Ok(())
}

async fn execute(
    command: AgentCommand,
    outbound: &Outbound,
    state: &SharedState,
    shutdown: &CancellationToken,
) -> Result<(), AgentError> {
    match command {
        AgentCommand::AcceptOffer => {
            let ack = lock_state(state).accept_offer();
            if let Some(ack) = ack {
                outbound.send_event(ack).await?;
            }
        }
        AgentCommand::RejectOffer => {
            let ack = lock_state(state).reject_offer();
            if let Some(ack) = ack {
                outbound.send_event(ack).await?;
            }
        }
        AgentCommand::ToggleSync => {
            lock_state(state).toggle_sync();
        }
        AgentCommand::OfferFile { target, path } => match file_metadata(&path).await {
            Ok((filename, filesize)) => {
                let offer = lock_state(state).offer_file(target, filename, filesize);
                outbound.send_event(offer).await?;
            }
            Err(e) => warn!("cannot offer {}: {e}", path.display()),
        },
        AgentCommand::Shutdown => {
            info!("shutdown requested");
            shutdown.cancel();
        }
    }
    Ok(())
}

/// Base name and size of a regular file.
pub(crate) async fn file_metadata(path: &Path) -> io::Result<(String, u64)> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
    }
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file name is not valid UTF-8"))?;
    Ok((filename.to_string(), metadata.len()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
