//! Mock device link for unit testing.
//!
//! Records every frame written to it so tests can assert on exactly what a
//! device would have received, without opening a socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use clipsync_core::{decode_envelope, Envelope};

use crate::application::link::{DeviceLink, LinkError};

/// A [`DeviceLink`] that records frames in memory.
#[derive(Default)]
pub struct MockLink {
    sent: Mutex<Vec<String>>,
    pings: AtomicUsize,
    closes: AtomicUsize,
    should_fail: AtomicBool,
    stall: AtomicBool,
}

impl MockLink {
    /// Creates a healthy link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a link whose writes all fail.
    pub fn failing() -> Self {
        let link = Self::new();
        link.set_fail(true);
        link
    }

    /// Creates a link whose writes never complete.
    pub fn stalling() -> Self {
        let link = Self::new();
        link.stall.store(true, Ordering::SeqCst);
        link
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// All text frames written so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    /// All text frames written so far, decoded.
    ///
    /// Panics if a frame is not a valid envelope.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent()
            .iter()
            .map(|text| decode_envelope(text).expect("mock link received malformed frame"))
            .collect()
    }

    /// Forgets all recorded frames.
    pub fn clear(&self) {
        self.sent.lock().expect("lock poisoned").clear();
    }

    /// Number of pings written.
    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Number of times [`DeviceLink::close`] was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    async fn check(&self) -> Result<(), LinkError> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(LinkError::Transport("mock failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceLink for MockLink {
    async fn send_text(&self, text: String) -> Result<(), LinkError> {
        self.check().await?;
        self.sent.lock().expect("lock poisoned").push(text);
        Ok(())
    }

    async fn send_ping(&self) -> Result<(), LinkError> {
        self.check().await?;
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
