//! Clipboard state: the current value plus a bounded history.
//!
//! # Invariants
//!
//! - `history` is ordered most-recent-first and never holds more than
//!   [`MAX_HISTORY`] entries; inserting a new entry evicts the oldest.
//! - Whenever `current` is non-empty, `history[0] == current`.
//!
//! # Two types, one rule set
//!
//! [`ClipboardHistory`] is a plain struct with `&mut self` methods.  The hub
//! shares one instance between many tasks, so it wraps it in
//! [`ClipboardStore`], which serializes writes behind an `RwLock` and hands out
//! copies on read.  The agent owns its history exclusively and uses the plain
//! type directly.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

/// Maximum number of entries kept in the history.
pub const MAX_HISTORY: usize = 20;

/// The current clipboard value and its most-recent-first history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardHistory {
    current: String,
    history: VecDeque<String>,
}

impl ClipboardHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current value when `content` differs from it.
    ///
    /// On change, `content` is also prepended to the history (evicting the
    /// oldest entry past [`MAX_HISTORY`]).  Returns `true` if a change
    /// occurred; the hub uses this to decide whether to broadcast.
    pub fn set_if_changed(&mut self, content: &str) -> bool {
        if content == self.current {
            return false;
        }
        self.current = content.to_string();
        self.history.push_front(self.current.clone());
        self.history.truncate(MAX_HISTORY);
        true
    }

    /// Replaces the whole history with one received from the hub.
    ///
    /// The first entry becomes the current value.  Extra entries past
    /// [`MAX_HISTORY`] are dropped.
    pub fn replace(&mut self, history: Vec<String>) {
        self.history = history.into_iter().take(MAX_HISTORY).collect();
        self.current = self.history.front().cloned().unwrap_or_default();
    }

    /// The current value (empty string before the first update).
    pub fn current(&self) -> &str {
        &self.current
    }

    /// A copy of the history, most recent first.
    pub fn entries(&self) -> Vec<String> {
        self.history.iter().cloned().collect()
    }

    /// Number of entries in the history.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// `true` when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Thread-safe clipboard state shared by all hub tasks.
///
/// Writes take the write half of an [`RwLock`]; reads take the read half and
/// return copies, so no caller ever iterates the live history.  Lock poisoning
/// is ignored: a panic in another task cannot leave the history half-written
/// because every mutation is a single `set_if_changed` call.
#[derive(Debug, Default)]
pub struct ClipboardStore {
    inner: RwLock<ClipboardHistory>,
}

impl ClipboardStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`ClipboardHistory::set_if_changed`].
    pub fn set_if_changed(&self, content: &str) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_if_changed(content)
    }

    /// A copy of the history, most recent first.
    pub fn history_snapshot(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries()
    }

    /// A copy of the current value.
    pub fn current_snapshot(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current()
            .to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
