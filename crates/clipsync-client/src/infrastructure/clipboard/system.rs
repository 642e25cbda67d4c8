//! OS clipboard via `arboard`.
//!
//! `arboard::Clipboard` needs `&mut self` for every call and is not `Sync`
//! on every platform, so it sits behind a `std::sync::Mutex`.  Calls are made
//! from `spawn_blocking`; the lock is never held across an `.await`.

use std::sync::{Mutex, PoisonError};

use arboard::Clipboard;

use crate::application::clipboard::{ClipboardAccess, ClipboardError};

/// The desktop clipboard.
pub struct SystemClipboard {
    inner: Mutex<Clipboard>,
}

impl SystemClipboard {
    /// Opens the platform clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::Unavailable`] when no clipboard can be
    /// opened (for example, no X11/Wayland display).
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard = Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read(&self) -> Result<String, ClipboardError> {
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match clipboard.get_text() {
            Ok(text) => Ok(text),
            // Empty, or holding an image: nothing to sync.
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }

    fn write(&self, content: &str) -> Result<(), ClipboardError> {
        let mut clipboard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        clipboard
            .set_text(content)
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}
