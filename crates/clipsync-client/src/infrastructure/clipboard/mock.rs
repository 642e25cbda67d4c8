//! In-memory clipboard.
//!
//! Stands in for the OS clipboard in tests and on headless hosts.  Records
//! every write so tests can check exactly what the agent put on the
//! clipboard, and can be switched into a failing mode.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use crate::application::clipboard::{ClipboardAccess, ClipboardError};

/// A clipboard that lives in a `String`.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    content: Mutex<String>,
    writes: Mutex<Vec<String>>,
    should_fail: AtomicBool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clipboard already holding `content`.
    pub fn with_content(content: &str) -> Self {
        let clipboard = Self::new();
        clipboard.set_local(content);
        clipboard
    }

    /// Simulates the user copying `content` (not recorded as an agent write).
    pub fn set_local(&self, content: &str) {
        *self.content.lock().unwrap_or_else(PoisonError::into_inner) = content.to_string();
    }

    /// Current value.
    pub fn content(&self) -> String {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every value written through [`ClipboardAccess::write`], oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes subsequent reads and writes fail.
    pub fn set_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn read(&self) -> Result<String, ClipboardError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ClipboardError::Read("simulated failure".into()));
        }
        Ok(self.content())
    }

    fn write(&self, content: &str) -> Result<(), ClipboardError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(ClipboardError::Write("simulated failure".into()));
        }
        self.set_local(content);
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(content.to_string());
        Ok(())
    }
}
