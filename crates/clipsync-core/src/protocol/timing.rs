//! Connection timing and size limits shared by the hub and the agent.
//!
//! Both ends of a connection run the same keepalive scheme:
//!
//! ```text
//! every PING_PERIOD  ──► send Ping
//! any inbound frame  ──► read deadline = now + PONG_WAIT
//! deadline passes    ──► connection is dead, tear it down
//! ```
//!
//! `PING_PERIOD` must stay below `PONG_WAIT`, otherwise a healthy but idle
//! peer would time out between two pings.

use std::time::Duration;

/// Maximum time allowed for a single frame write.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximum time between two inbound frames (pongs included).
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Interval between heartbeat pings (9/10 of [`PONG_WAIT`]).
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Largest inbound frame accepted, in bytes.  Bigger frames close the
/// connection.
pub const MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// Room the hub may add around a client payload when relaying it (the
/// `senderId` field and envelope keys).
pub const ENVELOPE_HEADROOM: usize = 1024;

/// Largest frame an agent accepts from the hub.  A relayed update carries a
/// client frame of up to [`MAX_MESSAGE_SIZE`] plus the hub's additions.
pub const MAX_RELAYED_MESSAGE_SIZE: usize = MAX_MESSAGE_SIZE + ENVELOPE_HEADROOM;

/// How often the agent polls the local clipboard.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Returns the heartbeat period for a given read deadline (9/10 of it).
pub fn ping_period_for(pong_wait: Duration) -> Duration {
    pong_wait * 9 / 10
}
