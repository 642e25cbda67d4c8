//! Clipboard backends.
//!
//! - [`system::SystemClipboard`] wraps `arboard` for desktops.
//! - [`mock::MemoryClipboard`] keeps the value in memory; used by the
//!   integration tests and by `--memory-clipboard` on machines without a
//!   display server.

pub mod mock;
pub mod system;

pub use mock::MemoryClipboard;
pub use system::SystemClipboard;
