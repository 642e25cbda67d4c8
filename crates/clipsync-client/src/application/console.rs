//! Line-oriented command console for headless agents.
//!
//! The binary reads stdin one line at a time and parses each line with
//! [`parse_command`].  Parsing is kept apart from I/O so it can be tested
//! without a terminal.
//!
//! | Line                       | Meaning                                   |
//! |----------------------------|-------------------------------------------|
//! | `accept` / `reject`        | Answer the pending file offer             |
//! | `sync`                     | Toggle clipboard syncing                  |
//! | `offer <device-id> <path>` | Offer a file to one device (`*` for all)  |
//! | `devices`                  | List connected devices                    |
//! | `history`                  | Show the clipboard history                |
//! | `status`                   | Show connection state                     |
//! | `quit`                     | Close the connection and exit             |

use std::path::PathBuf;

use thiserror::Error;

use clipsync_core::DeviceId;

/// Target that addresses every other device in `offer`.
pub const BROADCAST_TARGET: &str = "*";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Accept,
    Reject,
    ToggleSync,
    Offer {
        /// `None` offers to every other device.
        target: Option<DeviceId>,
        path: PathBuf,
    },
    Devices,
    History,
    Status,
    Help,
    Quit,
}

/// Why a console line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'; type 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one line of console input.
///
/// # Errors
///
/// Returns [`ConsoleError`] for blank lines, unknown verbs, and commands with
/// missing or extra arguments.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ConsoleError::Empty);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "accept" | "a" => ConsoleCommand::Accept,
        "reject" | "r" => ConsoleCommand::Reject,
        "sync" => ConsoleCommand::ToggleSync,
        "devices" => ConsoleCommand::Devices,
        "history" => ConsoleCommand::History,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        "offer" => return parse_offer(line),
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };

    if words.next().is_some() {
        return Err(ConsoleError::Usage("this command takes no arguments"));
    }
    Ok(command)
}

/// `offer <device-id> <path>`; the path is the rest of the line so it may
/// contain spaces.
fn parse_offer(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    const USAGE: &str = "offer <device-id|*> <path>";

    let rest = line.trim_start();
    let rest = rest.get("offer".len()..).unwrap_or_default().trim_start();
    let (target, path) = rest.split_once(char::is_whitespace).ok_or(ConsoleError::Usage(USAGE))?;
    let path = path.trim();
    if path.is_empty() {
        return Err(ConsoleError::Usage(USAGE));
    }

    let target = (target != BROADCAST_TARGET).then(|| DeviceId::from(target));
    Ok(ConsoleCommand::Offer {
        target,
        path: PathBuf::from(path),
    })
}

/// Help text printed for `help`.
pub const HELP: &str = "\
commands:
  accept | reject            answer the pending file offer
  sync                       toggle clipboard syncing
  offer <device-id|*> <path> offer a file
  devices                    list connected devices
  history                    show clipboard history
  status                     show connection state
  quit                       disconnect and exit";

// ── Tests ─────────────────────────────────────────────────────────────────────
