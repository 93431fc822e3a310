use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Progress report
// ---------------------------------------------------------------------------

/// Progress of a transfer as reported to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    /// Completed fraction in `[0.0, 1.0]`.
    pub fraction: f64,
    /// Human-readable status line.
    pub status: String,
    /// Throughput measured on this send, if one was possible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput: Option<ThroughputSample>,
}

impl ProgressReport {
    /// A report with only a status line.
    pub fn status(fraction: f64, status: impl Into<String>) -> Self {
        Self {
            fraction,
            status: status.into(),
            throughput: None,
        }
    }

    /// A report describing a measured throughput sample.
    pub fn with_throughput(fraction: f64, sample: ThroughputSample) -> Self {
        Self {
            fraction,
            status: sample.describe(),
            throughput: Some(sample),
        }
    }

    /// Completed percentage, rounded to the nearest integer.
    pub fn percent(&self) -> u32 {
        (self.fraction * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

// ---------------------------------------------------------------------------
// ThroughputEstimator
// ---------------------------------------------------------------------------

/// One instantaneous throughput measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputSample {
    /// Time since the previous send.
    pub elapsed: Duration,
    /// Nominal chunk bytes per second over `elapsed`.
    pub bytes_per_second: f64,
    /// Estimated time left if every remaining chunk takes `elapsed`.
    pub remaining: Duration,
}

impl ThroughputSample {
    /// Formats the sample as `"<speed>/s, <n>s remaining"`.
    pub fn describe(&self) -> String {
        format!(
            "{}/s, {}s remaining",
            format_bytes(self.bytes_per_second),
            self.remaining.as_secs_f64().round() as u64
        )
    }
}

/// Estimates throughput from the interval between consecutive chunk sends.
///
/// Estimates are not smoothed: each one only reflects the last interval.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    nominal_chunk_bytes: usize,
    last_send: Option<Instant>,
}

impl ThroughputEstimator {
    /// Creates an estimator that credits `nominal_chunk_bytes` per send.
    pub fn new(nominal_chunk_bytes: usize) -> Self {
        Self {
            nominal_chunk_bytes,
            last_send: None,
        }
    }

    /// Records a send of chunk `index` of `total` at the current instant.
    ///
    /// Returns `None` for the first send since there is no interval yet.
    pub fn record(&mut self, index: usize, total: usize) -> Option<ThroughputSample> {
        self.record_at(Instant::now(), index, total)
    }

    /// Records a send at `now`.
    pub fn record_at(&mut self, now: Instant, index: usize, total: usize) -> Option<ThroughputSample> {
        let previous = self.last_send.replace(now)?;
        let elapsed = now.saturating_duration_since(previous);
        let secs = elapsed.as_secs_f64();

        let bytes_per_second = if secs > 0.0 {
            self.nominal_chunk_bytes as f64 / secs
        } else {
            0.0
        };
        let remaining = elapsed * total.saturating_sub(index) as u32;

        Some(ThroughputSample {
            elapsed,
            bytes_per_second,
            remaining,
        })
    }

    /// Instant of the previous send, if any.
    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Formats a byte count as B/KB/MB/GB with at most two decimals.
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 B".into();
    }

    let exp = (bytes.ln() / 1024f64.ln()).floor().clamp(0.0, (UNITS.len() - 1) as f64) as usize;
    let value = bytes / 1024f64.powi(exp as i32);
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", UNITS[exp])
}
