//! Events emitted by a transfer session.

use bandbridge_transfer::ProgressReport;

use crate::error::SessionError;

/// Who ended a cancelled transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOrigin {
    /// The caller cancelled (or closed the session).
    Local,
    /// The receiver app cancelled.
    Remote,
}

/// Event delivered to the session listener.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Progress update.
    Progress(ProgressReport),
    /// The receiver stored the whole file.
    Completed { message: String, count: usize },
    /// The transfer was cancelled. Not a failure.
    Cancelled { origin: CancelOrigin, message: String },
    /// The transfer failed. `count` is the chunk involved, or 0.
    Failed { error: SessionError, count: usize },
    /// The receiver reported its storage usage.
    StorageReport { usage: u64, ceiling: u64 },
}

impl TransferEvent {
    /// Returns `true` for events that end the transfer.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferEvent::Completed { .. }
                | TransferEvent::Cancelled { .. }
                | TransferEvent::Failed { .. }
        )
    }
}
