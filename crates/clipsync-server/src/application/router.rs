//! Broadcast router: who receives an event, and how it gets written.
//!
//! Routing is split in two so the rules can be tested without any I/O:
//!
//! 1. [`delivery_set`] is a pure function from an event and a registry
//!    snapshot to the devices that must receive it.
//! 2. [`Router::deliver`] encodes the frame once and writes it to every target
//!    concurrently, each write bounded by the write deadline.  It reports the
//!    devices whose write failed; the hub removes them.
//!
//! # Delivery rules
//!
//! | event               | recipients                                         |
//! |---------------------|----------------------------------------------------|
//! | point-to-point      | only `reply_to` (welcome frames, `request_devices`) |
//! | `clipboard_update`  | everyone except the sender                         |
//! | `file_offer`        | everyone except the sender, or only `targetId`     |
//! | `file_ack`          | only the device whose id is `sourceId`             |
//! | `device_list`       | everyone (membership-change broadcast)             |
//! | `clipboard_history` | everyone                                           |
//! | `request_devices`   | nobody (answered by the hub, never relayed)        |

use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use clipsync_core::{encode_envelope, DeviceId, Envelope, Event};

use crate::application::registry::Device;

// ── Routed events ─────────────────────────────────────────────────────────────

/// An envelope plus an optional point-to-point recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    /// The frame to deliver.  `sender_id` is already set by the hub for
    /// relayed events.
    pub envelope: Envelope,
    /// When set, the frame goes to this device only, whatever its type.
    pub reply_to: Option<DeviceId>,
}

impl Routed {
    /// An event relayed on behalf of `sender`.
    pub fn relay(event: Event, sender: DeviceId) -> Self {
        Self {
            envelope: Envelope::from_sender(event, sender),
            reply_to: None,
        }
    }

    /// A hub-originated event for a single device.
    pub fn reply(event: Event, to: DeviceId) -> Self {
        Self {
            envelope: Envelope::new(event),
            reply_to: Some(to),
        }
    }

    /// A hub-originated event for every device.
    pub fn broadcast(event: Event) -> Self {
        Self {
            envelope: Envelope::new(event),
            reply_to: None,
        }
    }
}

// ── Delivery rules ────────────────────────────────────────────────────────────

/// Computes the recipients of `routed` among `members`.
pub fn delivery_set<'a>(routed: &Routed, members: &'a [Device]) -> Vec<&'a Device> {
    if let Some(target) = &routed.reply_to {
        return members.iter().filter(|d| &d.id == target).collect();
    }

    let sender = routed.envelope.sender_id.as_ref();
    let not_sender = |d: &&Device| Some(&d.id) != sender;

    match &routed.envelope.event {
        Event::ClipboardUpdate { .. } => members.iter().filter(not_sender).collect(),
        Event::FileOffer { target_id, .. } => match target_id.as_ref().filter(|t| !t.is_empty()) {
            Some(target) => members
                .iter()
                .filter(not_sender)
                .filter(|d| &d.id == target)
                .collect(),
            None => members.iter().filter(not_sender).collect(),
        },
        Event::FileAck { source_id, .. } => {
            members.iter().filter(|d| &d.id == source_id).collect()
        }
        Event::DeviceList { .. } | Event::ClipboardHistory { .. } => members.iter().collect(),
        Event::RequestDevices => Vec::new(),
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Performs the writes for a routed event.
#[derive(Debug, Clone)]
pub struct Router {
    write_wait: Duration,
}

impl Router {
    pub fn new(write_wait: Duration) -> Self {
        Self { write_wait }
    }

    /// Writes `routed` to its delivery set within `members`.
    ///
    /// All writes run concurrently; a slow or broken device only costs its own
    /// write deadline.  Returns the ids of the devices whose write failed or
    /// timed out.
    pub async fn deliver(&self, routed: &Routed, members: &[Device]) -> Vec<DeviceId> {
        let targets = delivery_set(routed, members);
        let kind = routed.envelope.event.kind();
        if targets.is_empty() {
            debug!("{kind}: no recipients");
            return Vec::new();
        }

        let text = match encode_envelope(&routed.envelope) {
            Ok(text) => text,
            Err(e) => {
                error!("{kind}: {e}");
                return Vec::new();
            }
        };

        debug!("{kind}: delivering to {} device(s)", targets.len());

        let writes = targets.into_iter().map(|device| {
            let text = text.clone();
            async move {
                match timeout(self.write_wait, device.link.send_text(text)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => {
                        warn!("device {}: {kind} write failed: {e}", device.id);
                        Some(device.id.clone())
                    }
                    Err(_) => {
                        warn!(
                            "device {}: {kind} write timed out after {:?}",
                            device.id, self.write_wait
                        );
                        Some(device.id.clone())
                    }
                }
            }
        });

        join_all(writes).await.into_iter().flatten().collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
