//! Per-agent synchronization state and the rules that act on it.
//!
//! # Echo suppression (for beginners)
//!
//! Every agent both *writes* the OS clipboard (when an update arrives from
//! the hub) and *polls* it (to notice local copies).  Without care, a value
//! received from the hub would be read back on the next poll and sent right
//! back, bouncing between devices forever.
//!
//! Two remembered values prevent that:
//!
//! - `last_sent`: the last value this agent sent to the hub.
//! - `last_received`: the last value the hub sent to this agent.
//!
//! A polled value is only sent when it differs from **both**.  An inbound
//! value is only written to the OS clipboard when it differs from
//! `last_sent` (otherwise it is our own copy coming back).
//!
//! Everything here is plain data: no sockets, no clipboard, no timers.  The
//! network layer locks a `SyncState`, calls one method, and acts on the
//! returned [`Event`] or clipboard text after releasing the lock.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use clipsync_core::{ClipboardHistory, DeviceId, DeviceInfo, Envelope, Event};

/// A file offer waiting for the user to accept or reject it.
///
/// Only one is kept; a newer offer replaces an unanswered one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFileOffer {
    pub filename: String,
    pub filesize: u64,
    /// Device that made the offer; the answer is addressed to it.
    pub offering_device_id: DeviceId,
}

/// The most recent answer to one of our own offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAckNotice {
    pub filename: String,
    pub allow: bool,
    pub responder: DeviceId,
}

/// Local view of the shared clipboard plus the device directory.
#[derive(Debug, Clone)]
pub struct SyncState {
    last_sent: String,
    last_received: String,
    history: ClipboardHistory,
    devices: BTreeMap<DeviceId, String>,
    pending_offer: Option<PendingFileOffer>,
    last_ack: Option<FileAckNotice>,
    sync_enabled: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            last_sent: String::new(),
            last_received: String::new(),
            history: ClipboardHistory::new(),
            devices: BTreeMap::new(),
            pending_offer: None,
            last_ack: None,
            sync_enabled: true,
        }
    }
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Outbound ──────────────────────────────────────────────────────────────

    /// Decides whether a polled clipboard value should be sent.
    ///
    /// Returns the `clipboard_update` to send and records `content` as
    /// `last_sent`, or `None` when syncing is off, the clipboard is empty, or
    /// the value is one we already sent or just received.
    pub fn on_local_clipboard(&mut self, content: &str) -> Option<Event> {
        if !self.sync_enabled || content.is_empty() {
            return None;
        }
        if content == self.last_sent || content == self.last_received {
            return None;
        }

        self.last_sent = content.to_string();
        self.history.set_if_changed(content);
        debug!("local clipboard changed ({} bytes)", content.len());
        Some(Event::ClipboardUpdate {
            content: content.to_string(),
        })
    }

    /// Builds a `file_offer` for `target` (or for everyone when `None`).
    pub fn offer_file(&self, target: Option<DeviceId>, filename: String, filesize: u64) -> Event {
        let label = target
            .as_ref()
            .map(|id| self.device_name(id))
            .unwrap_or_else(|| "all devices".to_string());
        info!("offering '{filename}' ({filesize} bytes) to {label}");
        Event::FileOffer {
            filename,
            filesize,
            target_id: target,
        }
    }

    /// Accepts the pending offer, returning the `file_ack` to send.
    pub fn accept_offer(&mut self) -> Option<Event> {
        self.answer_offer(true)
    }

    /// Rejects the pending offer, returning the `file_ack` to send.
    pub fn reject_offer(&mut self) -> Option<Event> {
        self.answer_offer(false)
    }

    fn answer_offer(&mut self, allow: bool) -> Option<Event> {
        let Some(offer) = self.pending_offer.take() else {
            info!("no pending file offer");
            return None;
        };
        info!(
            "{} '{}' from {}",
            if allow { "accepted" } else { "rejected" },
            offer.filename,
            self.device_name(&offer.offering_device_id)
        );
        Some(Event::FileAck {
            filename: offer.filename,
            allow,
            source_id: offer.offering_device_id,
        })
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Applies one frame received from the hub.
    ///
    /// Returns text that should be written to the OS clipboard, if any.
    pub fn apply_inbound(&mut self, envelope: Envelope) -> Option<String> {
        let sender = envelope.sender_id;
        match envelope.event {
            Event::ClipboardUpdate { content } => {
                self.last_received = content.clone();
                if !content.is_empty() {
                    self.history.set_if_changed(&content);
                }
                if self.sync_enabled && content != self.last_sent {
                    Some(content)
                } else {
                    None
                }
            }
            Event::ClipboardHistory { history } => {
                debug!("received history ({} entries)", history.len());
                self.history.replace(history);
                None
            }
            Event::DeviceList { devices } => {
                self.set_devices(devices);
                None
            }
            Event::FileOffer {
                filename, filesize, ..
            } => {
                let Some(offering_device_id) = sender else {
                    warn!("file_offer '{filename}' without senderId; ignored");
                    return None;
                };
                info!(
                    "file offer: '{filename}' ({filesize} bytes) from {}; type 'accept' or 'reject'",
                    self.device_name(&offering_device_id)
                );
                if let Some(previous) = &self.pending_offer {
                    debug!("replacing unanswered offer '{}'", previous.filename);
                }
                self.pending_offer = Some(PendingFileOffer {
                    filename,
                    filesize,
                    offering_device_id,
                });
                None
            }
            Event::FileAck {
                filename, allow, ..
            } => {
                let responder = sender.unwrap_or_else(|| DeviceId::from(""));
                info!(
                    "'{filename}' {} by {}; transfer not implemented",
                    if allow { "accepted" } else { "rejected" },
                    self.device_name(&responder)
                );
                self.last_ack = Some(FileAckNotice {
                    filename,
                    allow,
                    responder,
                });
                None
            }
            Event::RequestDevices => {
                warn!("unexpected request_devices from hub; ignored");
                None
            }
        }
    }

    /// Replaces the device directory with `devices`.
    pub fn set_devices(&mut self, devices: Vec<DeviceInfo>) {
        self.devices = devices
            .into_iter()
            .map(|device| (device.id, device.hostname))
            .collect();
    }

    // ── Toggles and queries ───────────────────────────────────────────────────

    /// Flips syncing on or off and returns the new setting.
    pub fn toggle_sync(&mut self) -> bool {
        self.sync_enabled = !self.sync_enabled;
        info!(
            "clipboard sync {}",
            if self.sync_enabled { "enabled" } else { "disabled" }
        );
        self.sync_enabled
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync_enabled
    }

    /// Hostname of `id` from the latest device list, or the raw id.
    pub fn device_name(&self, id: &DeviceId) -> String {
        self.devices
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Known devices as `(id, hostname)` pairs, ordered by id.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .map(|(id, hostname)| DeviceInfo {
                id: id.clone(),
                hostname: hostname.clone(),
            })
            .collect()
    }

    /// Display history, most recent first.
    pub fn history(&self) -> Vec<String> {
        self.history.entries()
    }

    pub fn pending_offer(&self) -> Option<&PendingFileOffer> {
        self.pending_offer.as_ref()
    }

    pub fn last_ack(&self) -> Option<&FileAckNotice> {
        self.last_ack.as_ref()
    }

    pub fn last_sent(&self) -> &str {
        &self.last_sent
    }

    pub fn last_received(&self) -> &str {
        &self.last_received
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn update(content: &str, sender: &str) -> Envelope {
        Envelope::from_sender(
            Event::ClipboardUpdate {
                content: content.to_string(),
            },
            sender.into(),
        )
    }

    fn offer(filename: &str, sender: &str) -> Envelope {
        Envelope::from_sender(
            Event::FileOffer {
                filename: filename.to_string(),
                filesize: 42,
                target_id: None,
            },
            sender.into(),
        )
    }

    #[test]
    fn test_local_change_is_sent_once() {
        // Arrange
        let mut state = SyncState::new();

        // Act
        let first = state.on_local_clipboard("hello");
        let second = state.on_local_clipboard("hello");

        // Assert
        assert_eq!(
            first,
            Some(Event::ClipboardUpdate {
                content: "hello".into()
            })
        );
        assert_eq!(second, None);
        assert_eq!(state.last_sent(), "hello");
    }

    #[test]
    fn test_received_value_is_not_echoed_back() {
        // Arrange: B receives A's copy and writes it to its clipboard
        let mut state = SyncState::new();
        let write = state.apply_inbound(update("from-a", "a"));
        assert_eq!(write.as_deref(), Some("from-a"));

        // Act: the next poll reads the value we just wrote
        let outbound = state.on_local_clipboard("from-a");

        // Assert
        assert_eq!(outbound, None);
    }

    #[test]
    fn test_inbound_equal_to_last_sent_is_not_written() {
        let mut state = SyncState::new();
        state.on_local_clipboard("mine");

        let write = state.apply_inbound(update("mine", "hub"));

        assert_eq!(write, None);
        assert_eq!(state.last_received(), "mine");
    }

    #[test]
    fn test_empty_clipboard_is_never_sent() {
        let mut state = SyncState::new();
        state.on_local_clipboard("x");
        assert_eq!(state.on_local_clipboard(""), None);
    }

    #[test]
    fn test_sync_disabled_records_but_does_not_write_or_send() {
        // Arrange
        let mut state = SyncState::new();
        assert!(!state.toggle_sync());

        // Act
        let write = state.apply_inbound(update("remote", "a"));
        let send = state.on_local_clipboard("local");

        // Assert
        assert_eq!(write, None);
        assert_eq!(send, None);
        assert_eq!(state.last_received(), "remote");
        assert_eq!(state.history(), vec!["remote".to_string()]);
    }

    #[test]
    fn test_local_change_made_while_disabled_is_sent_after_reenable() {
        let mut state = SyncState::new();
        state.toggle_sync();
        assert_eq!(state.on_local_clipboard("later"), None);

        state.toggle_sync();

        assert!(state.on_local_clipboard("later").is_some());
    }

    #[test]
    fn test_history_from_hub_replaces_display_history() {
        // Arrange
        let mut state = SyncState::new();
        state.apply_inbound(update("old", "a"));

        // Act
        state.apply_inbound(Envelope::new(Event::ClipboardHistory {
            history: vec!["h1".into(), "h2".into()],
        }));

        // Assert
        assert_eq!(state.history(), vec!["h1".to_string(), "h2".to_string()]);
    }

    #[test]
    fn test_device_list_resets_directory() {
        // Arrange
        let mut state = SyncState::new();
        state.set_devices(vec![DeviceInfo {
            id: "gone".into(),
            hostname: "old-pc".into(),
        }]);

        // Act
        state.apply_inbound(Envelope::new(Event::DeviceList {
            devices: vec![DeviceInfo {
                id: "b".into(),
                hostname: "laptop".into(),
            }],
        }));

        // Assert
        assert_eq!(state.device_name(&"b".into()), "laptop");
        assert_eq!(state.device_name(&"gone".into()), "gone");
        assert_eq!(state.devices().len(), 1);
    }

    #[test]
    fn test_file_offer_is_stored_with_offering_device() {
        let mut state = SyncState::new();

        state.apply_inbound(offer("report.pdf", "a"));

        assert_eq!(
            state.pending_offer(),
            Some(&PendingFileOffer {
                filename: "report.pdf".into(),
                filesize: 42,
                offering_device_id: "a".into(),
            })
        );
    }

    #[test]
    fn test_second_offer_replaces_first() {
        let mut state = SyncState::new();
        state.apply_inbound(offer("one.txt", "a"));

        state.apply_inbound(offer("two.txt", "c"));

        let pending = state.pending_offer().unwrap();
        assert_eq!(pending.filename, "two.txt");
        assert_eq!(pending.offering_device_id, DeviceId::from("c"));
    }

    #[test]
    fn test_offer_without_sender_is_ignored() {
        let mut state = SyncState::new();
        state.apply_inbound(Envelope::new(Event::FileOffer {
            filename: "x".into(),
            filesize: 1,
            target_id: None,
        }));
        assert!(state.pending_offer().is_none());
    }

    #[test]
    fn test_accept_addresses_ack_to_offering_device_and_clears_offer() {
        // Arrange
        let mut state = SyncState::new();
        state.apply_inbound(offer("report.pdf", "a"));

        // Act
        let ack = state.accept_offer();

        // Assert
        assert_eq!(
            ack,
            Some(Event::FileAck {
                filename: "report.pdf".into(),
                allow: true,
                source_id: "a".into(),
            })
        );
        assert!(state.pending_offer().is_none());
    }

    #[test]
    fn test_reject_sends_negative_ack() {
        let mut state = SyncState::new();
        state.apply_inbound(offer("x.bin", "a"));

        let ack = state.reject_offer();

        assert!(matches!(ack, Some(Event::FileAck { allow: false, .. })));
    }

    #[test]
    fn test_answer_without_pending_offer_sends_nothing() {
        let mut state = SyncState::new();
        assert_eq!(state.accept_offer(), None);
        assert_eq!(state.reject_offer(), None);
    }

    #[test]
    fn test_file_ack_is_recorded_with_responder() {
        let mut state = SyncState::new();

        state.apply_inbound(Envelope::from_sender(
            Event::FileAck {
                filename: "x.bin".into(),
                allow: true,
                source_id: "me".into(),
            },
            "b".into(),
        ));

        assert_eq!(
            state.last_ack(),
            Some(&FileAckNotice {
                filename: "x.bin".into(),
                allow: true,
                responder: "b".into(),
            })
        );
    }

    #[test]
    fn test_offer_file_sets_target() {
        let state = SyncState::new();
        let event = state.offer_file(Some("b".into()), "a.txt".into(), 7);
        assert_eq!(
            event,
            Event::FileOffer {
                filename: "a.txt".into(),
                filesize: 7,
                target_id: Some("b".into()),
            }
        );
    }
}
