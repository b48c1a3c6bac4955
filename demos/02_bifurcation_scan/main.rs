//! Demo 02: Branch counting on a period-doubling cascade.
//!
//! Builds a flattened voltage/peak list that mimics a classic cascade
//! (1 -> 2 -> 4 branches with noise) and shows how the jump-plus-k-means
//! counter and the rising-edge detector respond to it.

use bifmap_core::{branch_counts, find_bifurcations, JumpKmeansCounter};

fn main() {
    env_logger::init();
    println!("=== Demo 02: Bifurcation Scan ===\n");

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for step in 0..30 {
        let voltage = 1.0 + step as f64 * 0.1;
        let centers: &[f64] = if step < 10 {
            &[5.0]
        } else if step < 20 {
            &[3.0, 8.0]
        } else {
            &[2.0, 4.5, 7.0, 9.5]
        };
        // A few jittered samples around each branch center.
        for (i, &center) in centers.iter().enumerate() {
            for j in 0..6 {
                xs.push(voltage);
                ys.push(center + 0.02 * ((i + j) % 3) as f64);
            }
        }
    }

    println!("--- Branch counts per voltage ---");
    let counter = JumpKmeansCounter::default();
    for (voltage, branches) in branch_counts(&xs, &ys, &counter) {
        println!("  {voltage:.2} V -> {branches}");
    }

    println!("\n--- Rising edges (back_window = 3) ---");
    let points = find_bifurcations(&xs, &ys, &counter, 3);
    for p in &points {
        println!("  {:.2} V: {} branches", p.voltage, p.branches);
    }
    println!("\nDone: {} bifurcation points.", points.len());
}
