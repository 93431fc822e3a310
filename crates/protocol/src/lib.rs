//! Wire protocol shared by the companion and the receiver app on the watch.
//!
//! Every message is a flat JSON object routed by its `tag` field:
//! `"file"` for the file transfer channel and [`HANDSHAKE_TAG`] for the
//! liveness handshake. Outbound file commands are discriminated by `stat`,
//! inbound file events by `type`.

pub mod constants;
pub mod envelope;
pub mod messages;

pub use constants::{DEFAULT_APP_ID, FILE_TAG, HANDSHAKE_TAG, SUCCESS_MARKER};
pub use envelope::{Inbound, encode, encode_command, encode_handshake};
pub use messages::{FileCommand, FileEvent, HandshakeFrame};

/// Errors produced while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
