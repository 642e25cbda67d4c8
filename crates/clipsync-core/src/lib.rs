//! # clipsync-core
//!
//! Shared library for clipsync containing the wire protocol, the JSON codec,
//! connection timing constants, and the bounded clipboard history.
//!
//! This crate is used by both the hub (`clipsync-server`) and the device agent
//! (`clipsync-client`).  It has no dependencies on sockets, async runtimes, or
//! the OS clipboard.
//!
//! # Architecture overview (for beginners)
//!
//! clipsync keeps one clipboard value in step across several machines.  Each
//! machine runs an agent that holds a WebSocket open to a central hub.  When
//! the user copies something, the agent sends it to the hub, and the hub
//! relays it to every other connected device.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`protocol`** – How events travel over the network.  Every frame is a
//!   JSON object with a `"type"` tag, a `"data"` payload, and (on relayed
//!   frames) the `"senderId"` of the device that produced it.
//!
//! - **`domain`** – Pure data types with no I/O.  The most important piece is
//!   the `ClipboardHistory`: the current value plus a bounded,
//!   most-recent-first list of previous values.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `clipsync_core::Event` instead of `clipsync_core::protocol::messages::Event`.
pub use domain::clipboard::{ClipboardHistory, ClipboardStore, MAX_HISTORY};
pub use protocol::codec::{decode_envelope, encode_envelope, history_within, ProtocolError};
pub use protocol::messages::{DeviceId, DeviceInfo, Envelope, Event};
