//! Domain types for clipsync.
//!
//! This module contains pure data types with no infrastructure dependencies:
//! nothing here touches sockets, async runtimes, or the OS clipboard, so
//! every type can be unit-tested on any platform without setup.

/// Current clipboard value and bounded history.
///
/// See [`clipboard::ClipboardHistory`] for the plain data type and
/// [`clipboard::ClipboardStore`] for the thread-safe wrapper the hub shares.
pub mod clipboard;
