//! Wire format of the chat channel: JSON objects discriminated by `type`.

pub mod envelope;
pub mod outbound;

pub use envelope::{decode, decode_bytes, decode_outbound, DecodeError, Envelope, HistoryEntry};
pub use outbound::OutboundFrame;
