//! Infrastructure layer for clipsync-client.
//!
//! - `clipboard` implements the application layer's `ClipboardAccess` port
//!   for the real OS clipboard and for memory.
//! - `network` owns the WebSocket connection to the hub and the reconnect
//!   loop.

pub mod clipboard;
pub mod network;

pub use network::{AgentCommand, AgentError, AgentHandle, AgentStatus, ConnectionState, SyncAgent};
