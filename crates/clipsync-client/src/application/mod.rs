//! Application layer: sync rules, reconnect policy, console parsing, and the
//! clipboard port.  Nothing in here opens a socket or touches the real
//! clipboard.

pub mod backoff;
pub mod clipboard;
pub mod console;
pub mod sync_state;

pub use backoff::Backoff;
pub use clipboard::{ClipboardAccess, ClipboardError};
pub use console::{parse_command, ConsoleCommand, ConsoleError};
pub use sync_state::{FileAckNotice, PendingFileOffer, SyncState};
