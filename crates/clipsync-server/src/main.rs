//! clipsync hub entry point.
//!
//! Accepts WebSocket connections from clipsync agents, keeps the shared
//! clipboard value and its history, and relays clipboard updates and
//! file-transfer handshakes between devices.
//!
//! # Usage
//!
//! ```text
//! clipsync-server [OPTIONS] --api-key <KEY>
//!
//! Options:
//!   --port    <PORT>  Listener port [default: 8080]
//!   --bind    <ADDR>  Listener address [default: 0.0.0.0]
//!   --api-key <KEY>   Shared secret devices must present
//! ```
//!
//! # Environment variable overrides
//!
//! A `.env` file in the working directory is loaded first.  CLI args take
//! precedence over environment variables.
//!
//! | Variable            | Default   | Description                   |
//! |---------------------|-----------|-------------------------------|
//! | `PORT`              | `8080`    | Listener port                 |
//! | `CLIPSYNC_BIND`     | `0.0.0.0` | Listener address              |
//! | `CLIPBOARD_API_KEY` | (none)    | Shared secret, required       |

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipsync_server::domain::ServerConfig;
use clipsync_server::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// clipsync hub.
#[derive(Debug, Parser)]
#[command(
    name = "clipsync-server",
    about = "Clipboard synchronization hub for clipsync agents",
    version
)]
struct Cli {
    /// TCP port to listen on.  Devices connect to ws://host:PORT/ws.
    #[arg(long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// IP address to bind to.
    #[arg(long, default_value = "0.0.0.0", env = "CLIPSYNC_BIND")]
    bind: String,

    /// Shared secret every device must send as the `apiKey` query parameter.
    #[arg(long, env = "CLIPBOARD_API_KEY", hide_env_values = true)]
    api_key: String,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not an IP address or the API key is
    /// empty.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;

        if self.api_key.trim().is_empty() {
            anyhow::bail!("CLIPBOARD_API_KEY must not be empty");
        }

        Ok(ServerConfig {
            bind_addr,
            api_key: self.api_key,
            ..ServerConfig::default()
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loaded before the subscriber so RUST_LOG may come from .env.  A missing
    // file is not an error.
    let env_file = dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(path) = env_file {
        info!("loaded environment from {}", path.display());
    }

    let config = Cli::parse().into_server_config()?;
    info!("clipsync hub starting on {}", config.bind_addr);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(config, running).await?;

    info!("clipsync hub stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_port_is_8080() {
        let cli = Cli::parse_from(["clipsync-server", "--api-key", "k"]);
        assert_eq!(cli.port, 8080);
    }

    #[test]
    fn test_cli_default_bind_is_all_interfaces() {
        let cli = Cli::parse_from(["clipsync-server", "--api-key", "k"]);
        assert_eq!(cli.bind, "0.0.0.0");
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["clipsync-server", "--api-key", "k", "--port", "9000"]);
        assert_eq!(cli.port, 9000);
    }

    #[test]
    fn test_into_server_config_builds_bind_addr() {
        // Arrange
        let cli = Cli::parse_from([
            "clipsync-server",
            "--api-key",
            "secret",
            "--bind",
            "127.0.0.1",
            "--port",
            "9100",
        ]);

        // Act
        let config = cli.into_server_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9100");
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.queue_capacity, 256);
    }

    #[test]
    fn test_into_server_config_invalid_bind_returns_error() {
        let cli = Cli {
            port: 8080,
            bind: "not.an.ip".to_string(),
            api_key: "k".to_string(),
        };
        assert!(cli.into_server_config().is_err());
    }

    #[test]
    fn test_into_server_config_empty_key_returns_error() {
        let cli = Cli {
            port: 8080,
            bind: "0.0.0.0".to_string(),
            api_key: "  ".to_string(),
        };
        assert!(cli.into_server_config().is_err());
    }
}
