//! Session error types.

use std::time::Duration;

use bandbridge_host::BridgeError;
use bandbridge_protocol::ProtocolError;
use bandbridge_transfer::{TransferError, TransferState};

/// Errors produced by a transfer session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// A transfer is already running on this session.
    #[error("a transfer is already in progress")]
    AlreadyBusy,

    /// The session reached a terminal state; start a new one.
    #[error("session already finished ({0})")]
    SessionFinished(TransferState),

    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("insufficient storage on device: {usage} bytes used, ceiling is {ceiling}")]
    InsufficientStorage { usage: u64, ceiling: u64 },

    /// The host failed to deliver a message. `count` is the chunk index, or
    /// 0 for control messages.
    #[error("send failed at chunk {count}: {source}")]
    TransportFailure {
        count: usize,
        #[source]
        source: BridgeError,
    },

    /// An inbound payload could not be decoded. Never changes session state.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transfer cancelled by the device")]
    RemoteCancelled,

    #[error("no transfer in progress")]
    NotTransferring,

    #[error("session closed")]
    Closed,

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("source error: {0}")]
    Source(String),

    #[error("encode error: {0}")]
    Encode(String),
}

impl From<ProtocolError> for SessionError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Json(e) => SessionError::Encode(e.to_string()),
            ProtocolError::InvalidMessage(msg) => SessionError::InvalidMessage(msg),
        }
    }
}

impl From<TransferError> for SessionError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::InvalidChunkSize => SessionError::InvalidChunkSize,
            other => SessionError::Source(other.to_string()),
        }
    }
}
