//! Hub configuration types.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments; tests build it directly, usually
//! with shortened timeouts.

use std::net::SocketAddr;
use std::time::Duration;

use clipsync_core::protocol::timing::{PING_PERIOD, PONG_WAIT, WRITE_WAIT};

/// Default capacity of the hub dispatch queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// All runtime configuration for the hub.
///
/// # Example
///
/// ```rust
/// use clipsync_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Shared secret every device must present as the `apiKey` query
    /// parameter.  Compared verbatim.
    pub api_key: String,

    /// Deadline for a single frame write (relay, welcome, ping).
    pub write_wait: Duration,

    /// Read deadline.  A device that sends nothing at all (not even a pong)
    /// for this long is disconnected.
    pub pong_wait: Duration,

    /// Heartbeat period.  Must be shorter than `pong_wait`.
    pub ping_period: Duration,

    /// Capacity of the bounded queue feeding the hub dispatch task.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    /// | Field          | Default        |
    /// |----------------|----------------|
    /// | bind_addr      | `0.0.0.0:8080` |
    /// | api_key        | empty          |
    /// | write_wait     | 10 s           |
    /// | pong_wait      | 60 s           |
    /// | ping_period    | 54 s           |
    /// | queue_capacity | 256            |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            api_key: String::new(),
            write_wait: WRITE_WAIT,
            pong_wait: PONG_WAIT,
            ping_period: PING_PERIOD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
