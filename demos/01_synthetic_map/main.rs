//! Demo 01: Bifurcation map from a synthetic AM trace.
//!
//! Builds an amplitude-modulated drive tone whose envelope steps through a
//! handful of quantized amplitudes, with a response that spikes once per
//! cycle and period-doubles at higher drive, then runs the full pipeline:
//! windowing, peak extraction, flattening and bifurcation detection.

use bifmap_core::{
    aggregate_segmented, find_bifurcations, JumpKmeansCounter, PeakConfig, PeakMethod,
    VoltageQuantizer,
};

const WINDOW: usize = 50;
const CYCLES_PER_STEP: usize = 40;

fn main() {
    env_logger::init();
    println!("=== Demo 01: Synthetic Bifurcation Map ===\n");

    // Envelope steps 0.5 V .. 4.0 V; above 2.5 V the response splits into
    // two branches, above 3.5 V into four.
    let amplitudes: Vec<f64> = (1..=8).map(|i| i as f64 * 0.5).collect();
    let mut drive = Vec::new();
    let mut response = Vec::new();
    for &amplitude in &amplitudes {
        for cycle in 0..CYCLES_PER_STEP {
            let branches = if amplitude > 3.5 {
                4
            } else if amplitude > 2.5 {
                2
            } else {
                1
            };
            let spike = 2.0 * amplitude + 1.5 * (cycle % branches) as f64;
            for k in 0..WINDOW {
                let phase = 2.0 * std::f64::consts::PI * k as f64 / WINDOW as f64;
                drive.push(amplitude * phase.sin());
                response.push(if k == WINDOW / 4 { spike } else { 0.0 });
            }
        }
    }
    println!("--- Input ---");
    println!("samples: {}", drive.len());
    println!("envelope steps: {:?}", amplitudes);

    let peaks = PeakConfig {
        distance: 1,
        ..PeakConfig::default()
    };
    let maps = aggregate_segmented(
        &drive,
        &[response],
        WINDOW,
        0.0,
        PeakMethod::Prominence,
        &peaks,
        VoltageQuantizer::default(),
        4,
    )
    .expect("aggregation failed");

    println!("\n--- Peak map ---");
    let map = &maps[0];
    println!("voltage bins: {}", map.num_bins());
    println!("peak values:  {}", map.num_values());
    for (voltage, values) in map.iter() {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        println!("  {voltage:.3} V -> {} values, {} distinct", values.len(), sorted.len());
    }

    let (xs, ys) = map.flatten();
    println!("\n--- Bifurcations ---");
    let points = find_bifurcations(&xs, &ys, &JumpKmeansCounter::default(), 2);
    for p in &points {
        println!("  {:.3} V: {} branches", p.voltage, p.branches);
    }
    println!("\nDone: {} bifurcation points.", points.len());
}
