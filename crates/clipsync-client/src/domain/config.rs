//! Agent configuration.

use std::time::Duration;

use clipsync_core::protocol::timing::{PING_PERIOD, POLL_INTERVAL, PONG_WAIT, WRITE_WAIT};

/// First reconnect delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Upper bound on the reconnect delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Hostname sent when the OS hostname cannot be read.
pub const FALLBACK_HOSTNAME: &str = "UnknownHost";

/// Everything the agent needs to connect and keep the clipboard in step.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hub endpoint, e.g. `ws://hub.local:8080/ws`.
    pub server_url: String,
    /// Shared secret sent as the `apiKey` query parameter.
    pub api_key: String,
    /// Display name sent as the `hostname` query parameter.
    pub hostname: String,
    /// How often the OS clipboard is polled.
    pub poll_interval: Duration,
    /// First reconnect delay.
    pub backoff_base: Duration,
    /// Upper bound on the reconnect delay.
    pub backoff_max: Duration,
    /// Connect and write deadline.
    pub write_wait: Duration,
    /// Read deadline; the hub pings well within it.
    pub pong_wait: Duration,
    /// How often the agent pings the hub.
    pub ping_period: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".to_string(),
            api_key: String::new(),
            hostname: FALLBACK_HOSTNAME.to_string(),
            poll_interval: POLL_INTERVAL,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            write_wait: WRITE_WAIT,
            pong_wait: PONG_WAIT,
            ping_period: PING_PERIOD,
        }
    }
}

/// The OS hostname, or [`FALLBACK_HOSTNAME`] when it is not valid UTF-8 or
/// empty.
pub fn local_hostname() -> String {
    gethostname::gethostname()
        .to_str()
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_HOSTNAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings_match_protocol() {
        let config = AgentConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(30));
        assert!(config.ping_period < config.pong_wait);
    }

    #[test]
    fn test_local_hostname_is_never_empty() {
        assert!(!local_hostname().is_empty());
    }
}
