//! Port for the OS clipboard.
//!
//! The agent never talks to a clipboard library directly.  It goes through
//! [`ClipboardAccess`], which the infrastructure layer implements with
//! `arboard` (real desktop) or an in-memory buffer (tests and headless
//! machines).
//!
//! Both methods are synchronous because every clipboard backend we target is
//! a blocking API.  The agent calls them from `tokio::task::spawn_blocking`.

use thiserror::Error;

/// Errors reported by a clipboard backend.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The backend could not be opened (no display server, for example).
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    /// Reading the current value failed.
    #[error("failed to read clipboard: {0}")]
    Read(String),

    /// Writing a new value failed.
    #[error("failed to write clipboard: {0}")]
    Write(String),
}

/// Text access to the local clipboard.
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardAccess: Send + Sync {
    /// Returns the current clipboard text.  An empty clipboard, or one that
    /// holds no text, reads as `""`.
    fn read(&self) -> Result<String, ClipboardError>;

    /// Replaces the clipboard contents with `content`.
    fn write(&self, content: &str) -> Result<(), ClipboardError>;
}
