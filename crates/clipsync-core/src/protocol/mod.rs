//! Protocol module containing the event types, the JSON codec, and the
//! connection timing constants shared by hub and agent.

pub mod codec;
pub mod messages;
pub mod timing;

pub use codec::{decode_envelope, encode_envelope, history_within, ProtocolError};
pub use messages::*;
