//! Domain layer for clipsync-client: runtime configuration.

pub mod config;

pub use config::AgentConfig;
