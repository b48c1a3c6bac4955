//! Error type for the analysis pipeline and its acquisition collaborators.
//!
//! Only three kinds of failure are errors here: bad configuration, transient
//! trace I/O, and instrument communication. Numerical edge cases (empty
//! windows, infeasible clustering, zero-length peak lists) are absorbed into
//! empty results or a branch count of 0 so aggregation can proceed over
//! sparse data.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BifmapError {
    #[error("window size must be at least one sample")]
    InvalidWindowSize,
    #[error("window padding must be non-negative, got {0}")]
    InvalidPadding(f64),
    #[error("modulation frequency times sample interval must be positive and finite")]
    DegenerateModulation,
    #[error("unknown peak extraction mode: {0:?}")]
    UnknownPeakMode(String),
    #[error("trace length mismatch: drive has {drive} samples, response channel {channel} has {response}")]
    TraceLengthMismatch {
        drive: usize,
        channel: usize,
        response: usize,
    },
    #[error("expected {channels} per-channel offsets, got {offsets}")]
    OffsetCountMismatch { channels: usize, offsets: usize },
    #[error("worker count must be at least one")]
    InvalidWorkerCount,
    #[error("sweep axis is empty")]
    EmptySweepAxis,

    #[error("failed to read trace file {path}: {source}")]
    TraceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed value in {path} at row {row}, column {column}")]
    MalformedRow {
        path: PathBuf,
        row: usize,
        column: usize,
    },
    #[error("row {row} in {path} has {fields} fields, column {column} requested")]
    MissingColumn {
        path: PathBuf,
        row: usize,
        fields: usize,
        column: usize,
    },

    #[error("device communication failed: {0}")]
    Device(String),
    #[error("device disconnected")]
    Disconnected,
    #[error("retry budget exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },
}

impl BifmapError {
    /// Whether this error is a transient I/O failure that a retry policy may
    /// re-attempt. Configuration errors are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BifmapError::TraceIo { .. }
                | BifmapError::MalformedRow { .. }
                | BifmapError::MissingColumn { .. }
                | BifmapError::Device(_)
                | BifmapError::Disconnected
        )
    }
}
