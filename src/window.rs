//! Window sizing, padded window bounds and cycle-offset detection.
//!
//! A window is one nominal modulation cycle of the drive signal. All
//! windowing here works in sample indices; callers convert from acquisition
//! time via [`sample_window_size`].

use crate::error::BifmapError;
use crate::helpers::max_value;
use crate::slice_maybe_parallel;
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;

/// Number of samples spanning one modulation cycle.
///
/// Computes `dt = duration_seconds / total_samples` and returns
/// `floor(1 / (modulation_frequency_hz * dt))`.
///
/// # Arguments
/// * `duration_seconds` - Total acquisition duration
/// * `total_samples` - Number of samples in the acquisition
/// * `modulation_frequency_hz` - Drive amplitude-modulation frequency
///
/// # Errors
/// [`BifmapError::DegenerateModulation`] when `modulation_frequency_hz * dt`
/// is not a positive finite number, and [`BifmapError::InvalidWindowSize`]
/// when the resulting window would span less than one sample.
pub fn sample_window_size(
    duration_seconds: f64,
    total_samples: usize,
    modulation_frequency_hz: f64,
) -> Result<usize, BifmapError> {
    let dt = duration_seconds / total_samples as f64;
    let cycles_per_sample = modulation_frequency_hz * dt;
    if !cycles_per_sample.is_finite() || cycles_per_sample <= 0.0 {
        return Err(BifmapError::DegenerateModulation);
    }
    let window = (1.0 / cycles_per_sample).floor();
    if window < 1.0 {
        return Err(BifmapError::InvalidWindowSize);
    }
    Ok(window as usize)
}

/// Padded window bounds `[lo, hi)` around a stride position.
///
/// Extends the unpadded window `[start, start + window_size)` by
/// `pad * window_size` samples on each side, truncating fractional bounds
/// toward zero and clipping to `[0, len)`. Bounds are clipped, never wrapped.
pub fn padded_bounds(start: usize, window_size: usize, pad: f64, len: usize) -> (usize, usize) {
    let lo = start as f64 - window_size as f64 * pad;
    let hi = start as f64 + (1.0 + pad) * window_size as f64;
    let lo = if lo <= 0.0 { 0 } else { lo as usize };
    let hi = (hi as usize).min(len);
    (lo, hi)
}

/// Parameters for the best-effort cycle-offset scan.
#[derive(Debug, Clone, Copy)]
pub struct OffsetSearch {
    /// Noise floor as a fraction of the first window's maximum.
    pub epsilon_factor: f64,
    /// Fraction of the window inspected at each edge.
    pub inner_fraction: f64,
}

impl Default for OffsetSearch {
    fn default() -> Self {
        Self {
            epsilon_factor: 0.02,
            inner_fraction: 0.3,
        }
    }
}

/// Find a start offset that phase-aligns windows to a drive-cycle trough.
///
/// Scans candidate offsets `j` in `[0, window_size)` and accepts the first
/// whose sub-window `data[j..j + window_size]` is quiet at both edges: every
/// sample of the leading and trailing `inner_fraction` portions lies strictly
/// below `epsilon_factor * max(data[0..window_size])`.
///
/// This is a heuristic with no correctness guarantee; when no candidate
/// qualifies the offset defaults to 0.
pub fn detect_cycle_offset(data: &[f64], window_size: usize, search: &OffsetSearch) -> usize {
    if data.is_empty() || window_size == 0 {
        return 0;
    }
    let head = &data[..window_size.min(data.len())];
    let epsilon = max_value(head) * search.epsilon_factor;

    for j in 0..window_size {
        let sub = &data[j.min(data.len())..(j + window_size).min(data.len())];
        let n = sub.len();
        let lead = (n as f64 * search.inner_fraction) as usize;
        let tail_start = (n as f64 * (1.0 - search.inner_fraction)) as usize;

        let quiet = |s: &[f64]| s.iter().all(|&v| v < epsilon);
        if quiet(&sub[..lead.min(n)]) && quiet(&sub[tail_start.min(n)..]) {
            log::debug!("cycle offset {j} aligns window edges below {epsilon:.3e}");
            return j;
        }
    }
    log::debug!("no quiet-edged offset found in [0, {window_size}), defaulting to 0");
    0
}

/// Per-channel cycle offsets for a set of response traces.
pub fn channel_offsets(
    responses: &[Vec<f64>],
    window_size: usize,
    search: &OffsetSearch,
) -> Vec<usize> {
    slice_maybe_parallel!(responses)
        .map(|data| detect_cycle_offset(data, window_size, search))
        .collect()
}
