//! # bifmap-core
//!
//! Bifurcation-map extraction from amplitude-modulated time-series
//! measurements of driven nonlinear circuits.
//!
//! Given a slowly modulated drive-voltage trace and one or more response
//! traces sampled synchronously, this crate:
//! - Partitions the response into per-cycle windows keyed by the maximum
//!   absolute drive voltage seen in each window
//! - Extracts representative peak values per window with one of three
//!   strategies (prominence, probability-window average, area under curve)
//! - Accumulates voltage -> peak-value maps per channel, flattened to
//!   scatter-plot coordinate arrays
//! - Detects period-doubling bifurcation points by clustering each
//!   voltage's peak values and watching for rising branch counts
//!
//! Long traces can be fanned out over a worker pool with the segmented
//! aggregator (`parallel` feature). Acquisition collaborators — file and
//! in-memory trace sources, instrument handles with reconnect/retry, and
//! the voltage x frequency sweep runner — live alongside the pipeline.
//!
//! ## Degeneracy policy
//!
//! Numerical edge cases (empty windows, no qualifying peaks, infeasible
//! clustering) produce empty results or a branch count of 0, never errors.
//! Only configuration mistakes, trace I/O and instrument communication
//! fail loudly.

#![allow(clippy::too_many_arguments)]

pub mod parallel;

pub mod aggregate;
pub mod bifurcation;
pub mod device;
pub mod error;
pub mod helpers;
pub mod peak_map;
pub mod peaks;
pub mod segment;
pub mod source;
pub mod sweep;
pub mod window;

// Re-export commonly used items
pub use error::BifmapError;
pub use helpers::{trapezoid, DEFAULT_CONVERGENCE_TOL, NUMERICAL_EPS};

pub use aggregate::{aggregate_windows, analyze_am_traces};
pub use bifurcation::{
    branch_counts, find_bifurcations, kmeans_1d, BifurcationPoint, BranchCounter,
    JumpKmeansCounter, Kmeans1dResult,
};
pub use peak_map::{PeakMap, VoltageQuantizer};
pub use peaks::{
    extract_peaks, extract_peaks_areas, extract_peaks_prob, find_peaks, PeakConfig,
    PeakExtraction, PeakMethod,
};
pub use segment::{aggregate_segmented, split_points};
pub use window::{
    channel_offsets, detect_cycle_offset, padded_bounds, sample_window_size, OffsetSearch,
};

pub use device::{AwgHandle, Device, ReconnectingDevice, RetryPolicy};
pub use source::{CsvTraceSource, MemoryTraceSource, TraceCache, TraceSet, TraceSource};
pub use sweep::{run_sweep, SweepAxis, SweepConfig, SweepPoint, SweepReport};
