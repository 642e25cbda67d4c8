//! Event types for the device ↔ hub WebSocket protocol.
//!
//! # JSON shape
//!
//! Every frame is a JSON object with a `"type"` field naming the event, a
//! `"data"` field holding the event payload, and an optional `"senderId"`:
//!
//! ```json
//! {"type":"clipboard_update","data":{"content":"hello"},"senderId":"4f0c…"}
//! {"type":"request_devices"}
//! ```
//!
//! Serde's `#[serde(tag = "type", content = "data")]` (adjacent tagging)
//! produces this layout, and `#[serde(flatten)]` on [`Envelope`] places the
//! `senderId` next to the two tag fields.
//!
//! # Why a closed enum?
//!
//! [`Event`] lists all six event kinds.  Every place that dispatches on an
//! event uses an exhaustive `match`, so adding a seventh kind is a compile
//! error everywhere it has not been handled yet.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Opaque identifier of one connected device.
///
/// The hub assigns a fresh id when it admits a connection; clients never pick
/// their own.  On the wire it is a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Generates a new random id (UUID v4, hyphenated form).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the empty string, which the protocol treats as "no id".
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public description of a connected device, as carried in `device_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Hub-assigned device id.
    pub id: DeviceId,
    /// Display label supplied by the device at connect time (untrusted).
    pub hostname: String,
}

// ── Events ────────────────────────────────────────────────────────────────────

/// All events exchanged between devices and the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// A new clipboard value.  Sent by a device when its local clipboard
    /// changes, and relayed by the hub to every other device.
    ClipboardUpdate {
        /// The clipboard text.
        content: String,
    },

    /// The hub's full history, most recent first.  Hub → device only.
    ClipboardHistory {
        /// Previous clipboard values, newest at index 0.
        history: Vec<String>,
    },

    /// The set of currently connected devices.  Hub → device only.
    DeviceList {
        /// One entry per registered device (no ordering guarantee).
        devices: Vec<DeviceInfo>,
    },

    /// A device asks the hub for the current `device_list`.  Device → hub only.
    RequestDevices,

    /// A device offers a file to one or all other devices.
    FileOffer {
        /// Base name of the offered file.
        filename: String,
        /// Size of the file in bytes.
        filesize: u64,
        /// When set (and non-empty) only this device receives the offer.
        #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
        target_id: Option<DeviceId>,
    },

    /// A device answers a `file_offer`.
    FileAck {
        /// The file name from the offer being answered.
        filename: String,
        /// `true` to accept the transfer, `false` to reject it.
        allow: bool,
        /// Id of the device that made the offer; the hub delivers the ack
        /// to this device only.
        #[serde(rename = "sourceId")]
        source_id: DeviceId,
    },
}

impl Event {
    /// Returns the wire tag of this event.
    ///
    /// Used in log messages instead of `{:?}` so clipboard contents never end
    /// up in the logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ClipboardUpdate { .. } => "clipboard_update",
            Event::ClipboardHistory { .. } => "clipboard_history",
            Event::DeviceList { .. } => "device_list",
            Event::RequestDevices => "request_devices",
            Event::FileOffer { .. } => "file_offer",
            Event::FileAck { .. } => "file_ack",
        }
    }
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// An [`Event`] plus the id of the device that produced it.
///
/// Devices leave `sender_id` empty.  The hub overwrites it with the id of the
/// connection the frame arrived on before routing, so a device can never
/// impersonate another one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The event itself (`type` + `data` on the wire).
    #[serde(flatten)]
    pub event: Event,

    /// Originating device, present on frames relayed by the hub.
    #[serde(rename = "senderId", default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<DeviceId>,
}

impl Envelope {
    /// Wraps an event with no sender (device → hub, or hub-originated).
    pub fn new(event: Event) -> Self {
        Self {
            event,
            sender_id: None,
        }
    }

    /// Wraps an event attributed to `sender`.
    pub fn from_sender(event: Event, sender: DeviceId) -> Self {
        Self {
            event,
            sender_id: Some(sender),
        }
    }
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        Self::new(event)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_device_ids_are_unique() {
        let a = DeviceId::generate();
        let b = DeviceId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_device_id_serializes_as_plain_string() {
        let id = DeviceId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn test_event_kind_matches_wire_tag() {
        // Arrange: one instance of every variant
        let events = vec![
            Event::ClipboardUpdate { content: "x".into() },
            Event::ClipboardHistory { history: vec![] },
            Event::DeviceList { devices: vec![] },
            Event::RequestDevices,
            Event::FileOffer {
                filename: "a".into(),
                filesize: 1,
                target_id: None,
            },
            Event::FileAck {
                filename: "a".into(),
                allow: true,
                source_id: "s".into(),
            },
        ];

        for event in events {
            // Act
            let json: serde_json::Value = serde_json::to_value(&event).unwrap();

            // Assert: `kind()` must agree with the serialized tag
            assert_eq!(json["type"], event.kind());
        }
    }

    #[test]
    fn test_file_offer_without_target_omits_target_id() {
        let event = Event::FileOffer {
            filename: "x.txt".into(),
            filesize: 100,
            target_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["data"].get("targetId").is_none());
    }

    #[test]
    fn test_file_ack_uses_camel_case_source_id() {
        let event = Event::FileAck {
            filename: "x.txt".into(),
            allow: false,
            source_id: "dev-1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["sourceId"], "dev-1");
        assert_eq!(json["data"]["allow"], false);
    }

    #[test]
    fn test_envelope_from_sender_sets_sender() {
        let env = Envelope::from_sender(Event::RequestDevices, "me".into());
        assert_eq!(env.sender_id, Some(DeviceId::from("me")));
    }
}
