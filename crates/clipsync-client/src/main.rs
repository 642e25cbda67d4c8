//! clipsync agent entry point.
//!
//! Connects to a clipsync hub and keeps this machine's clipboard in step
//! with every other connected device.  Reconnects automatically.
//!
//! # Usage
//!
//! ```text
//! clipsync-client [OPTIONS] --server-url <URL> --api-key <KEY>
//!
//! Options:
//!   --server-url <URL>        Hub endpoint, e.g. ws://hub:8080/ws
//!   --api-key <KEY>           Shared secret
//!   --hostname <NAME>         Name shown to other devices [default: OS hostname]
//!   --poll-interval-ms <MS>   Clipboard poll interval [default: 2000]
//!   --memory-clipboard        Use an in-memory clipboard (headless hosts)
//! ```
//!
//! # Environment
//!
//! `.env` in the working directory is loaded first, then
//! `~/.config/clipsync/.env`.  Variables already set are never overwritten,
//! and CLI args take precedence over both.
//!
//! | Variable            | Description              |
//! |---------------------|--------------------------|
//! | `SERVER_WS_URL`     | Hub endpoint, required   |
//! | `CLIPBOARD_API_KEY` | Shared secret, required  |
//! | `CLIPSYNC_HOSTNAME` | Display name             |
//!
//! Type `help` on stdin for console commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use clipsync_client::application::clipboard::ClipboardAccess;
use clipsync_client::application::console::{parse_command, ConsoleCommand, ConsoleError, HELP};
use clipsync_client::domain::config::{local_hostname, AgentConfig};
use clipsync_client::infrastructure::clipboard::{MemoryClipboard, SystemClipboard};
use clipsync_client::infrastructure::network::hub_url;
use clipsync_client::infrastructure::{
    AgentCommand, AgentHandle, AgentStatus, ConnectionState, SyncAgent,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// clipsync agent.
#[derive(Debug, Parser)]
#[command(
    name = "clipsync-client",
    about = "Keeps this machine's clipboard in sync through a clipsync hub",
    version
)]
struct Cli {
    /// Hub WebSocket endpoint.
    #[arg(long, env = "SERVER_WS_URL")]
    server_url: String,

    /// Shared secret configured on the hub.
    #[arg(long, env = "CLIPBOARD_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Name shown to other devices.  Defaults to the OS hostname.
    #[arg(long, env = "CLIPSYNC_HOSTNAME")]
    hostname: Option<String>,

    /// How often to read the local clipboard, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Keep the clipboard in memory instead of using the OS clipboard.
    #[arg(long)]
    memory_clipboard: bool,
}

impl Cli {
    /// Converts the parsed CLI arguments into an [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not a `ws`/`wss` URL, the API key is
    /// empty, or the poll interval is zero.
    fn into_agent_config(self) -> anyhow::Result<AgentConfig> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("CLIPBOARD_API_KEY must not be empty");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("--poll-interval-ms must be greater than zero");
        }

        let hostname = self
            .hostname
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(local_hostname);

        let config = AgentConfig {
            server_url: self.server_url,
            api_key: self.api_key,
            hostname,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..AgentConfig::default()
        };
        hub_url(&config).with_context(|| format!("invalid SERVER_WS_URL '{}'", config.server_url))?;
        Ok(config)
    }
}

/// Loads `.env` from the working directory, then from
/// `~/.config/clipsync/.env`.  Returns the files that were found.
fn load_env_files() -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    if let Ok(path) = dotenvy::dotenv() {
        loaded.push(path);
    }
    if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home).join(".config/clipsync/.env");
        if dotenvy::from_path(&path).is_ok() {
            loaded.push(path);
        }
    }
    loaded
}

// ── Console ───────────────────────────────────────────────────────────────────

fn describe_status(status: &AgentStatus) -> String {
    let mut line = match status.state {
        ConnectionState::Connected => "connected".to_string(),
        ConnectionState::Connecting => "connecting".to_string(),
        ConnectionState::Disconnected => "disconnected".to_string(),
    };
    if let Some(delay) = status.retry_in {
        line.push_str(&format!(", retrying in {delay:?}"));
    }
    if let Some(error) = &status.last_error {
        line.push_str(&format!(" (last error: {error})"));
    }
    line
}

async fn run_console_line(line: &str, handle: &AgentHandle) {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(ConsoleError::Empty) => return,
        Err(e) => {
            println!("{e}");
            return;
        }
    };

    let agent_command = match command {
        ConsoleCommand::Accept => AgentCommand::AcceptOffer,
        ConsoleCommand::Reject => AgentCommand::RejectOffer,
        ConsoleCommand::ToggleSync => AgentCommand::ToggleSync,
        ConsoleCommand::Offer { target, path } => AgentCommand::OfferFile { target, path },
        ConsoleCommand::Quit => AgentCommand::Shutdown,
        ConsoleCommand::Devices => {
            let devices = handle.state().devices();
            if devices.is_empty() {
                println!("no devices known yet");
            }
            for device in devices {
                println!("{}  {}", device.id, device.hostname);
            }
            return;
        }
        ConsoleCommand::History => {
            for (index, entry) in handle.state().history().iter().enumerate() {
                println!("{index:>2}: {}", preview(entry));
            }
            return;
        }
        ConsoleCommand::Status => {
            let state = handle.state();
            println!("{}", describe_status(&handle.status()));
            println!(
                "sync {}",
                if state.sync_enabled() { "enabled" } else { "disabled" }
            );
            if let Some(offer) = state.pending_offer() {
                println!(
                    "pending offer: '{}' ({} bytes) from {}",
                    offer.filename,
                    offer.filesize,
                    state.device_name(&offer.offering_device_id)
                );
            }
            return;
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            return;
        }
    };

    if let Err(e) = handle.send(agent_command).await {
        warn!("{e}");
    }
}

/// First line of `entry`, cut to 60 characters.
fn preview(entry: &str) -> String {
    let first_line = entry.lines().next().unwrap_or_default();
    let mut shown: String = first_line.chars().take(60).collect();
    if shown.len() < entry.len() {
        shown.push('…');
    }
    shown
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_files = load_env_files();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    for path in &env_files {
        info!("loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let use_memory_clipboard = cli.memory_clipboard;
    let config = cli.into_agent_config()?;

    let clipboard: Arc<dyn ClipboardAccess> = if use_memory_clipboard {
        info!("using in-memory clipboard");
        Arc::new(MemoryClipboard::new())
    } else {
        Arc::new(
            SystemClipboard::new()
                .context("failed to open the OS clipboard; try --memory-clipboard")?,
        )
    };

    info!(
        "clipsync agent '{}' starting; hub {}",
        config.hostname, config.server_url
    );
    let (agent, handle) = SyncAgent::new(config, clipboard);
    let mut agent_task = tokio::spawn(agent.run());

    let signal_handle = handle.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                signal_handle.shutdown();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            joined = &mut agent_task => {
                joined.context("agent task failed")?;
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => run_console_line(&line, &handle).await,
                Ok(None) => {
                    debug!("stdin closed; console disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("stdin unreadable: {e}; console disabled");
                    stdin_open = false;
                }
            },
        }
    }

    info!("clipsync agent stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
