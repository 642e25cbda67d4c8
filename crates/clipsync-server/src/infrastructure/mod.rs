//! Infrastructure layer for clipsync-server.
//!
//! Everything that touches a socket lives here:
//!
//! - `ws_server` binds the listener, answers health probes, authorizes and
//!   upgrades connections.
//! - `session` runs one connection: read loop, heartbeat, teardown.
//! - `link` implements the hub's `DeviceLink` trait for real sockets (and for
//!   tests).
//!
//! Routing rules and clipboard state are *not* here; see the application
//! layer.

pub mod link;
pub mod session;
pub mod ws_server;

pub use ws_server::{run_server, Server};
