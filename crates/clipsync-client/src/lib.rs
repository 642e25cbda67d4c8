//! # clipsync-client
//!
//! The clipsync agent.  It keeps one machine's clipboard in step with every
//! other machine connected to the same hub.
//!
//! # Architecture (for beginners)
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  main.rs: CLI, .env loading, stdin console                 │
//! ├────────────────────────────────────────────────────────────┤
//! │  infrastructure/                                           │
//! │    network/    SyncAgent: connect, duties, reconnect       │
//! │    clipboard/  arboard or in-memory ClipboardAccess        │
//! ├────────────────────────────────────────────────────────────┤
//! │  application/                                              │
//! │    sync_state  echo suppression, offers, device names      │
//! │    backoff     1s → 30s reconnect delays                   │
//! │    console     command parsing                             │
//! │    clipboard   ClipboardAccess port                        │
//! ├────────────────────────────────────────────────────────────┤
//! │  domain/       AgentConfig                                 │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dependencies point downwards only.  The application layer never touches a
//! socket or the OS clipboard, so its rules are tested without either.

pub mod application;
pub mod domain;
pub mod infrastructure;
