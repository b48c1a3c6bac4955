//! Embarrassingly parallel trace segmentation.
//!
//! A long acquisition is split into contiguous, non-overlapping index ranges
//! of near-equal length, one worker aggregates each range independently, and
//! the per-voltage peak lists are concatenated after all workers complete.
//! Workers share no mutable state; the join is the only synchronization.
//!
//! Each worker restarts its window stride at its local index 0, so a range
//! boundary that does not fall on a cycle boundary introduces a phase
//! discontinuity there. This is a known limitation of the segmented path,
//! not corrected here; use the single-pass aggregator when exact phase
//! continuity matters.

use crate::aggregate::{aggregate_range, validate_traces};
use crate::error::BifmapError;
use crate::iter_maybe_parallel;
use crate::peak_map::{PeakMap, VoltageQuantizer};
use crate::peaks::{PeakConfig, PeakMethod};
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;

/// Contiguous split boundaries `floor(len * i / workers)` for `i` in
/// `0..=workers`. Consecutive pairs delimit each worker's index range.
pub fn split_points(len: usize, workers: usize) -> Vec<usize> {
    (0..=workers).map(|i| len * i / workers).collect()
}

/// Run the windowed aggregator over `workers` contiguous sub-ranges and
/// merge the resulting maps by concatenating peak lists under matching
/// voltage keys.
///
/// With one worker this is equivalent to [`aggregate_windows`]
/// (same key set, same per-key values).
///
/// [`aggregate_windows`]: crate::aggregate::aggregate_windows
#[allow(clippy::too_many_arguments)]
pub fn aggregate_segmented(
    drive: &[f64],
    responses: &[Vec<f64>],
    window_size: usize,
    pad: f64,
    method: PeakMethod,
    peaks: &PeakConfig,
    quantizer: VoltageQuantizer,
    workers: usize,
) -> Result<Vec<PeakMap>, BifmapError> {
    if workers == 0 {
        return Err(BifmapError::InvalidWorkerCount);
    }
    validate_traces(drive, responses, window_size, pad)?;

    let bounds = split_points(drive.len(), workers);
    let offsets = vec![0; responses.len()];

    let per_worker: Vec<Vec<PeakMap>> = iter_maybe_parallel!((0..workers))
        .map(|w| {
            let (lo, hi) = (bounds[w], bounds[w + 1]);
            let views: Vec<&[f64]> = responses.iter().map(|r| &r[lo..hi]).collect();
            aggregate_range(
                &drive[lo..hi],
                &views,
                window_size,
                pad,
                method,
                peaks,
                quantizer,
                &offsets,
            )
        })
        .collect();

    // Single-threaded merge, strictly after the join above.
    let mut results = per_worker.into_iter();
    let mut merged = results.next().unwrap_or_default();
    for worker_maps in results {
        for (channel, map) in merged.iter_mut().zip(worker_maps) {
            channel.merge(map);
        }
    }
    log::info!(
        "segmented pass: {} workers over {} samples, {} voltage bins",
        workers,
        drive.len(),
        merged.first().map_or(0, PeakMap::num_bins)
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_windows;

    fn am_signal(len: usize) -> (Vec<f64>, Vec<f64>) {
        // Slow amplitude ramp on a fast carrier; responses spike once per
        // carrier cycle with amplitude following the envelope.
        let drive: Vec<f64> = (0..len)
            .map(|i| {
                let envelope = 1.0 + (i / 100) as f64;
                let phase = i % 10;
                if phase == 2 {
                    envelope
                } else if phase == 7 {
                    -envelope
                } else {
                    0.0
                }
            })
            .collect();
        let response: Vec<f64> = drive.iter().map(|v| v.abs() * 2.0).collect();
        (drive, response)
    }

    #[test]
    fn test_split_points_cover_range() {
        let bounds = split_points(1003, 4);
        assert_eq!(bounds.len(), 5);
        assert_eq!(bounds[0], 0);
        assert_eq!(bounds[4], 1003);
        assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_split_points_single_worker() {
        assert_eq!(split_points(100, 1), vec![0, 100]);
    }

    #[test]
    fn test_single_worker_matches_direct_aggregation() {
        let (drive, response) = am_signal(1000);
        let cfg = PeakConfig {
            distance: 1,
            ..PeakConfig::default()
        };
        let direct = aggregate_windows(
            &drive,
            &[response.clone()],
            10,
            0.0,
            PeakMethod::Prominence,
            &cfg,
            VoltageQuantizer::default(),
            None,
        )
        .unwrap();
        let segmented = aggregate_segmented(
            &drive,
            &[response],
            10,
            0.0,
            PeakMethod::Prominence,
            &cfg,
            VoltageQuantizer::default(),
            1,
        )
        .unwrap();
        assert_eq!(direct.len(), segmented.len());
        let (dx, dy) = direct[0].flatten();
        let (sx, sy) = segmented[0].flatten();
        assert_eq!(dx, sx);
        assert_eq!(dy, sy);
    }

    #[test]
    fn test_workers_preserve_total_values_on_aligned_splits() {
        // 1000 samples, 4 workers, window 10: every boundary falls on a
        // cycle boundary, so the merged multiset matches the direct pass.
        let (drive, response) = am_signal(1000);
        let cfg = PeakConfig {
            distance: 1,
            ..PeakConfig::default()
        };
        let direct = aggregate_windows(
            &drive,
            &[response.clone()],
            10,
            0.0,
            PeakMethod::Prominence,
            &cfg,
            VoltageQuantizer::default(),
            None,
        )
        .unwrap();
        let segmented = aggregate_segmented(
            &drive,
            &[response],
            10,
            0.0,
            PeakMethod::Prominence,
            &cfg,
            VoltageQuantizer::default(),
            4,
        )
        .unwrap();
        assert_eq!(direct[0].num_values(), segmented[0].num_values());
        assert_eq!(direct[0].num_bins(), segmented[0].num_bins());
    }

    #[test]
    fn test_zero_workers_is_fatal() {
        assert!(matches!(
            aggregate_segmented(
                &[0.0; 10],
                &[vec![0.0; 10]],
                2,
                0.0,
                PeakMethod::Prominence,
                &PeakConfig::default(),
                VoltageQuantizer::default(),
                0,
            ),
            Err(BifmapError::InvalidWorkerCount)
        ));
    }
}
