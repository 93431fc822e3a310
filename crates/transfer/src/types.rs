use serde::Serialize;

/// Lifecycle state of a transfer session.
///
/// States only move forward; `Completed`, `Cancelled` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    Handshaking,
    AwaitingStart,
    Transferring,
    Completed,
    Cancelled,
    Failed,
}

impl TransferState {
    /// Returns `true` for states no transition leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Cancelled | TransferState::Failed
        )
    }

    /// Returns `true` while a transfer is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            TransferState::Handshaking | TransferState::AwaitingStart | TransferState::Transferring
        )
    }

    fn rank(self) -> u8 {
        match self {
            TransferState::Idle => 0,
            TransferState::Handshaking => 1,
            TransferState::AwaitingStart => 2,
            TransferState::Transferring => 3,
            TransferState::Completed | TransferState::Cancelled | TransferState::Failed => 4,
        }
    }

    /// Returns `true` if moving from `self` to `next` goes forward.
    ///
    /// Any non-terminal state may jump to a terminal one.
    pub fn can_advance_to(self, next: TransferState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransferState::Idle => "idle",
            TransferState::Handshaking => "handshaking",
            TransferState::AwaitingStart => "awaiting_start",
            TransferState::Transferring => "transferring",
            TransferState::Completed => "completed",
            TransferState::Cancelled => "cancelled",
            TransferState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a transfer session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    pub session_id: String,
    pub state: TransferState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub current_chunk: usize,
}

impl TransferSnapshot {
    /// Completed fraction based on the next chunk to send.
    pub fn fraction(&self) -> f64 {
        if self.total_chunks == 0 {
            return if self.state == TransferState::Completed { 1.0 } else { 0.0 };
        }
        self.current_chunk as f64 / self.total_chunks as f64
    }
}
