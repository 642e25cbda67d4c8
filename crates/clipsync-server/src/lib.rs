//! clipsync-server library crate.
//!
//! The hub accepts WebSocket connections from device agents, keeps the shared
//! clipboard value and its history, and relays events between devices.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Device agents (JSON over WebSocket)
//!         ↕
//! [clipsync-server]
//!   ├── domain/           ServerConfig
//!   ├── application/
//!   │     ├── link        DeviceLink trait (how the hub writes to a device)
//!   │     ├── registry    connected devices, RwLock-guarded
//!   │     ├── router      delivery rules + bounded-time fan-out
//!   │     └── hub         dispatch loop, the single clipboard writer
//!   └── infrastructure/
//!         ├── link/       WsLink (real socket) and MockLink (tests)
//!         ├── session     per-connection read loop and heartbeat
//!         └── ws_server   accept loop, auth, /health
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `clipsync-core`; it only sees
//!   devices through the [`application::link::DeviceLink`] trait, so every
//!   routing rule can be unit-tested with [`infrastructure::link::mock::MockLink`].
//! - `infrastructure` owns sockets and tokio tasks.
//!
//! # For beginners: who talks to whom?
//!
//! Each connection gets a *read task* that decodes frames and pushes them onto
//! the hub's bounded queue.  One *dispatch task* drains that queue, updates the
//! clipboard store, and fans events out to the other devices.  Because only
//! the dispatch task writes the clipboard store, two devices racing to set the
//! clipboard are ordered by their arrival on the queue.

/// Domain layer: runtime configuration.
pub mod domain;

/// Application layer: registry, routing rules and the hub dispatch loop.
pub mod application;

/// Infrastructure layer: WebSocket server, sessions and device links.
pub mod infrastructure;
