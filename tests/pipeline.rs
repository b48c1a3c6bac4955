//! End-to-end pipeline tests on synthetic amplitude-modulated traces.
//!
//! A drive tone with a stepped modulation envelope and a response that
//! period-doubles above a drive threshold run through the full chain:
//! windowing -> peak extraction -> peak maps -> flattening -> bifurcation
//! detection, sequentially and segmented.

use bifmap_core::{
    aggregate_segmented, aggregate_windows, find_bifurcations, sample_window_size,
    JumpKmeansCounter, PeakConfig, PeakMethod, VoltageQuantizer,
};

const WINDOW: usize = 40;
const CYCLES: usize = 100;

/// Drive: one sine cycle per window, amplitude 1 V for the first half of
/// the acquisition and 3 V for the second. Response: one spike per cycle at
/// the drive crest — 5 V in the low regime, alternating 4 V / 8 V (two
/// coexisting branches) in the high regime.
fn synthetic_am_pair() -> (Vec<f64>, Vec<f64>) {
    let mut drive = Vec::with_capacity(WINDOW * CYCLES);
    let mut response = Vec::with_capacity(WINDOW * CYCLES);
    for cycle in 0..CYCLES {
        let amplitude = if cycle < CYCLES / 2 { 1.0 } else { 3.0 };
        let spike = if cycle < CYCLES / 2 {
            5.0
        } else if cycle % 2 == 0 {
            4.0
        } else {
            8.0
        };
        for k in 0..WINDOW {
            let phase = 2.0 * std::f64::consts::PI * k as f64 / WINDOW as f64;
            drive.push(amplitude * phase.sin());
            response.push(if k == WINDOW / 4 { spike } else { 0.0 });
        }
    }
    (drive, response)
}

fn prominence_config() -> PeakConfig {
    PeakConfig {
        distance: 1,
        ..PeakConfig::default()
    }
}

#[test]
fn window_sizer_matches_acquisition_parameters() {
    assert_eq!(sample_window_size(0.1, 1_000_000, 25_000.0).unwrap(), 400);
    // floor(n / (d * f)) identity on a non-integer case.
    assert_eq!(sample_window_size(1.0, 1_000, 3.0).unwrap(), 333);
}

#[test]
fn pipeline_builds_expected_peak_map() {
    let (drive, response) = synthetic_am_pair();
    let maps = aggregate_windows(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &prominence_config(),
        VoltageQuantizer::default(),
        None,
    )
    .unwrap();

    assert_eq!(maps.len(), 1);
    let map = &maps[0];
    // The discrete sine grid hits |sin| = 1 exactly, so the two envelope
    // amplitudes are the only keys.
    assert_eq!(map.num_bins(), 2);
    assert_eq!(map.num_values(), CYCLES);

    let low = map.get(1.0).unwrap();
    assert_eq!(low.len(), CYCLES / 2);
    assert!(low.iter().all(|&v| v == 5.0));

    let high = map.get(3.0).unwrap();
    let fours = high.iter().filter(|&&v| v == 4.0).count();
    let eights = high.iter().filter(|&&v| v == 8.0).count();
    assert_eq!(fours, CYCLES / 4);
    assert_eq!(eights, CYCLES / 4);
}

#[test]
fn flatten_preserves_every_stored_value() {
    let (drive, response) = synthetic_am_pair();
    let maps = aggregate_windows(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &prominence_config(),
        VoltageQuantizer::default(),
        None,
    )
    .unwrap();
    let (xs, ys) = maps[0].flatten();
    assert_eq!(xs.len(), ys.len());
    assert_eq!(xs.len(), maps[0].num_values());
    for (x, y) in xs.iter().zip(&ys) {
        assert!(maps[0].get(*x).unwrap().contains(y));
    }
}

#[test]
fn segmented_single_worker_equals_direct_pass() {
    let (drive, response) = synthetic_am_pair();
    let direct = aggregate_windows(
        &drive,
        &[response.clone()],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &prominence_config(),
        VoltageQuantizer::default(),
        None,
    )
    .unwrap();
    let segmented = aggregate_segmented(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &prominence_config(),
        VoltageQuantizer::default(),
        1,
    )
    .unwrap();
    assert_eq!(direct[0].flatten(), segmented[0].flatten());
}

#[test]
fn segmented_aligned_workers_preserve_value_multiset() {
    let (drive, response) = synthetic_am_pair();
    // 4000 samples over 4 workers: every split lands on a cycle boundary.
    let direct = aggregate_windows(
        &drive,
        &[response.clone()],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &prominence_config(),
        VoltageQuantizer::default(),
        None,
    )
    .unwrap();
    let segmented = aggregate_segmented(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &prominence_config(),
        VoltageQuantizer::default(),
        4,
    )
    .unwrap();

    let (dx, mut dy) = direct[0].flatten();
    let (sx, mut sy) = segmented[0].flatten();
    assert_eq!(dx, sx);
    dy.sort_by(f64::total_cmp);
    sy.sort_by(f64::total_cmp);
    assert_eq!(dy, sy);
}

#[test]
fn detector_flags_period_doubling_voltage() {
    let (drive, response) = synthetic_am_pair();
    let maps = aggregate_windows(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &prominence_config(),
        VoltageQuantizer::default(),
        None,
    )
    .unwrap();
    let (xs, ys) = maps[0].flatten();
    let points = find_bifurcations(&xs, &ys, &JumpKmeansCounter::default(), 1);

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].voltage, 3.0);
    assert_eq!(points[0].branches, 2);
}

#[test]
fn probability_window_reports_window_averages() {
    let (drive, response) = synthetic_am_pair();
    let cfg = PeakConfig {
        distance: 1,
        peak_window: 10,
        ..PeakConfig::default()
    };
    let maps = aggregate_windows(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::ProbabilityWindow,
        &cfg,
        VoltageQuantizer::default(),
        None,
    )
    .unwrap();
    // One spike of 5.0 averaged over a 20-sample window.
    let low = maps[0].get(1.0).unwrap();
    assert_eq!(low.len(), CYCLES / 2);
    assert!(low.iter().all(|&v| (v - 5.0 / 20.0).abs() < 1e-12));
}

#[test]
fn area_strategy_values_are_positive() {
    let (drive, response) = synthetic_am_pair();
    let cfg = PeakConfig {
        distance: 1,
        peak_window: 5,
        ..PeakConfig::default()
    };
    let maps = aggregate_windows(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::Area,
        &cfg,
        VoltageQuantizer::default(),
        None,
    )
    .unwrap();
    let (_, ys) = maps[0].flatten();
    assert!(!ys.is_empty());
    assert!(ys.iter().all(|&y| y > 0.0));
}
