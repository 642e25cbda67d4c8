//! Integration tests for the clipsync-core public API.
//!
//! These tests feed hand-written JSON frames, exactly as existing agents put
//! them on the wire, through the codec and check that the hub-side and
//! agent-side views agree.

use clipsync_core::{
    decode_envelope, encode_envelope, ClipboardHistory, ClipboardStore, DeviceId, Envelope, Event,
    ProtocolError, MAX_HISTORY,
};

#[test]
fn test_device_frame_without_sender_decodes_and_gets_attributed() {
    // Arrange: a device never sets senderId itself
    let frame = r#"{"type":"clipboard_update","data":{"content":"hello"}}"#;

    // Act: the hub decodes, then re-attributes to the receiving connection
    let inbound = decode_envelope(frame).unwrap();
    let relayed = Envelope::from_sender(inbound.event, DeviceId::from("A"));
    let out: serde_json::Value = serde_json::from_str(&encode_envelope(&relayed).unwrap()).unwrap();

    // Assert
    assert_eq!(out["type"], "clipboard_update");
    assert_eq!(out["data"]["content"], "hello");
    assert_eq!(out["senderId"], "A");
}

#[test]
fn test_forged_sender_id_is_still_parsed_for_overwriting() {
    // The hub overwrites senderId; the codec must still accept the field.
    let frame = r#"{"senderId":"forged","type":"request_devices"}"#;
    let env = decode_envelope(frame).unwrap();
    assert_eq!(env.event, Event::RequestDevices);
    assert_eq!(env.sender_id, Some(DeviceId::from("forged")));
}

#[test]
fn test_field_order_does_not_matter() {
    let frame = r#"{"data":{"filename":"a.bin","allow":true,"sourceId":"X"},"type":"file_ack"}"#;
    let env = decode_envelope(frame).unwrap();
    assert_eq!(
        env.event,
        Event::FileAck {
            filename: "a.bin".into(),
            allow: true,
            source_id: "X".into(),
        }
    );
}

#[test]
fn test_empty_target_id_decodes_as_empty_device_id() {
    // Routing treats an empty targetId as "no target"; the codec keeps it.
    let frame = r#"{"type":"file_offer","data":{"filename":"f","filesize":1,"targetId":""}}"#;
    match decode_envelope(frame).unwrap().event {
        Event::FileOffer { target_id, .. } => {
            assert!(target_id.map(|id| id.is_empty()).unwrap_or(false));
        }
        other => panic!("expected FileOffer, got {other:?}"),
    }
}

#[test]
fn test_negative_filesize_is_rejected() {
    let frame = r#"{"type":"file_offer","data":{"filename":"f","filesize":-1}}"#;
    assert!(matches!(
        decode_envelope(frame),
        Err(ProtocolError::Malformed(_))
    ));
}

#[test]
fn test_hub_history_replaces_agent_history() {
    // Arrange: the hub records a few updates
    let store = ClipboardStore::new();
    for value in ["one", "two", "three"] {
        store.set_if_changed(value);
    }
    let frame = encode_envelope(&Envelope::new(Event::ClipboardHistory {
        history: store.history_snapshot(),
    }))
    .unwrap();

    // Act: an agent applies the frame to its own history
    let mut local = ClipboardHistory::new();
    local.set_if_changed("stale");
    if let Event::ClipboardHistory { history } = decode_envelope(&frame).unwrap().event {
        local.replace(history);
    }

    // Assert
    assert_eq!(local.entries(), vec!["three", "two", "one"]);
    assert_eq!(local.current(), store.current_snapshot());
}

#[test]
fn test_store_never_exceeds_limit_through_public_api() {
    let store = ClipboardStore::new();
    for i in 0..(MAX_HISTORY * 3) {
        assert!(store.set_if_changed(&format!("entry {i}")));
    }
    let history = store.history_snapshot();
    assert_eq!(history.len(), MAX_HISTORY);
    assert_eq!(history[0], format!("entry {}", MAX_HISTORY * 3 - 1));
}
