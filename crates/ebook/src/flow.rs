//! Receiver-paced chunk sending.
//!
//! The controller never sends on its own: each chunk goes out in response
//! to a `ready`, `next` or `error` event from the receiver. It builds the
//! wire payload and progress report; the session does the actual send.

use tokio::time::Instant;
use tracing::debug;

use bandbridge_protocol::{FileCommand, ProtocolError, encode_command};
use bandbridge_transfer::{ChunkPlan, ProgressReport, ThroughputEstimator};

/// A chunk ready to hand to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedChunk {
    pub index: usize,
    pub is_resend: bool,
    pub payload: String,
    pub progress: ProgressReport,
}

pub struct FlowController {
    plan: ChunkPlan,
    throughput: ThroughputEstimator,
    current_chunk: usize,
}

impl FlowController {
    pub fn new(plan: ChunkPlan) -> Self {
        let throughput = ThroughputEstimator::new(plan.target_chunk_bytes());
        Self {
            plan,
            throughput,
            current_chunk: 0,
        }
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn total_chunks(&self) -> usize {
        self.plan.total_chunks()
    }

    /// Index of the chunk most recently requested by the receiver.
    pub fn current_chunk(&self) -> usize {
        self.current_chunk
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.throughput.last_send()
    }

    pub(crate) fn mark_complete(&mut self) {
        self.current_chunk = self.plan.total_chunks();
    }

    /// Builds the data command for chunk `index`. Pure: the same arguments
    /// always produce the same command.
    pub fn command(&self, index: usize, is_resend: bool) -> Option<FileCommand> {
        if index >= self.plan.total_chunks() {
            return None;
        }
        Some(FileCommand::data(index, self.plan.slice(index), is_resend))
    }

    /// Prepares chunk `index` for sending and records the send for
    /// throughput. Returns `None` past the last chunk.
    pub fn prepare(
        &mut self,
        index: usize,
        is_resend: bool,
    ) -> Result<Option<PreparedChunk>, ProtocolError> {
        let total = self.plan.total_chunks();
        let Some(command) = self.command(index, is_resend) else {
            debug!(index, total, "no chunk at index, waiting for receiver");
            return Ok(None);
        };
        let payload = encode_command(&command)?;

        let fraction = index as f64 / total as f64;
        let progress = match self.throughput.record(index, total) {
            Some(sample) => ProgressReport::with_throughput(fraction, sample),
            None => ProgressReport::status(fraction, "starting transfer..."),
        };
        self.current_chunk = index;

        Ok(Some(PreparedChunk {
            index,
            is_resend,
            payload,
            progress,
        }))
    }
}
