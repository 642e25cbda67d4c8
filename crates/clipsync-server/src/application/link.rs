//! The hub's view of a single device connection.
//!
//! The registry and the router never touch a WebSocket directly.  They hold
//! an `Arc<dyn DeviceLink>` per device, which the infrastructure layer backs
//! with a real socket ([`crate::infrastructure::link::WsLink`]) and tests back
//! with an in-memory recorder ([`crate::infrastructure::link::mock::MockLink`]).
//!
//! Write deadlines are applied by the caller (`tokio::time::timeout`), so one
//! slow device never holds up anyone else's write.  `close` must return
//! without waiting on the peer.

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by [`DeviceLink`] writes.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The link was already closed by an earlier failure or removal.
    #[error("link is closed")]
    Closed,

    /// The underlying transport rejected the write.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Write side of one device connection.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Sends one text frame.
    async fn send_text(&self, text: String) -> Result<(), LinkError>;

    /// Sends a heartbeat ping.
    async fn send_ping(&self) -> Result<(), LinkError>;

    /// Closes the link.  Best effort and idempotent: closing an already closed
    /// link does nothing.  Returns promptly; any peer handshake happens in
    /// the background.
    async fn close(&self);
}
