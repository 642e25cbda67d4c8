//! Domain layer for clipsync-server.
//!
//! Plain configuration types with no dependencies on sockets or the tokio
//! runtime.  The infrastructure layer fills them in from CLI arguments and
//! environment variables.

pub mod config;

pub use config::ServerConfig;
