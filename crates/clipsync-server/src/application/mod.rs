//! Application layer for clipsync-server.
//!
//! The application layer knows *what* the hub does: who is connected, who
//! receives which event, and which clipboard value is current.  It delegates
//! *how* bytes reach a device to the [`link::DeviceLink`] trait, implemented
//! in the infrastructure layer.
//!
//! # What does NOT belong here?
//!
//! - Accepting sockets or performing the WebSocket handshake
//! - Heartbeats and read deadlines (see `infrastructure::session`)

pub mod hub;
pub mod link;
pub mod registry;
pub mod router;

pub use hub::{Dispatch, Hub, HubError};
pub use link::{DeviceLink, LinkError};
pub use registry::{Device, Registry};
pub use router::{delivery_set, Routed, Router};
