//! JSON codec for clipsync protocol frames.
//!
//! Wire format: one [`Envelope`] per WebSocket text frame.
//!
//! ```text
//! {"type":"<event tag>","data":{...},"senderId":"<device id>"}
//! ```
//!
//! Decoding failures are *protocol errors*: the caller logs them and drops
//! the frame; they never close the connection.

use thiserror::Error;

use crate::protocol::messages::{Envelope, Event};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, names an unknown event type, or has a
    /// payload whose shape does not match its type.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`Envelope`] into the text of one WebSocket frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use clipsync_core::{decode_envelope, encode_envelope, Envelope, Event};
///
/// let env = Envelope::new(Event::RequestDevices);
/// let text = encode_envelope(&env).unwrap();
/// assert_eq!(text, r#"{"type":"request_devices"}"#);
/// assert_eq!(decode_envelope(&text).unwrap(), env);
/// ```
pub fn encode_envelope(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(ProtocolError::Encode)
}

/// Decodes one [`Envelope`] from the text of a WebSocket frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the text is not a valid frame.
pub fn decode_envelope(text: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Malformed)
}

/// Keeps the longest most-recent-first prefix of `history` whose
/// `clipboard_history` frame encodes to at most `limit` bytes.
///
/// Entries are measured as JSON strings, so escaping is counted.  An entry
/// that does not fit ends the prefix; older entries are dropped with it.
pub fn history_within(mut history: Vec<String>, limit: usize) -> Vec<String> {
    let empty = Envelope::new(Event::ClipboardHistory {
        history: Vec::new(),
    });
    let mut used = encode_envelope(&empty).map_or(0, |text| text.len());
    let mut kept = 0;
    for (i, entry) in history.iter().enumerate() {
        let Ok(encoded) = serde_json::to_string(entry) else {
            break;
        };
        // Comma between entries.
        let cost = encoded.len() + usize::from(i > 0);
        if used + cost > limit {
            break;
        }
        used += cost;
        kept += 1;
    }
    history.truncate(kept);
    history
}

// ── Tests ─────────────────────────────────────────────────────────────────────
