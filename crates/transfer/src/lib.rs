//! Chunked text transfer building blocks: planning, throughput, sources.
//!
//! Content is cut into a fixed number of chunks derived from its byte size,
//! then sliced by character so every chunk is valid UTF-8.

mod chunked;
mod progress;
mod source;
mod types;

pub use chunked::ChunkPlan;
pub use progress::{ProgressReport, ThroughputEstimator, ThroughputSample, format_bytes};
pub use source::SourceFile;
pub use types::{TransferSnapshot, TransferState};

/// Default nominal chunk size: 20 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 20 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("source has no file name: {0}")]
    EmptyName(String),
}
