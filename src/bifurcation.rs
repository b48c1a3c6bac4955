//! Bifurcation detection over a flattened voltage/peak map.
//!
//! Per distinct voltage the collected peak values are clustered; the cluster
//! count estimates how many attractor branches coexist at that drive
//! amplitude. A voltage is reported as a bifurcation point when its branch
//! count rises above the recent maximum — a rising-edge detector, not a
//! global extremum search.
//!
//! Branch counting sits behind the [`BranchCounter`] trait so the default
//! jump-plus-k-means heuristic can be swapped for a density-based method
//! without touching the detector logic.

use rand::prelude::*;

use crate::helpers::{DEFAULT_CONVERGENCE_TOL, NUMERICAL_EPS};

/// Result of one-dimensional k-means clustering.
pub struct Kmeans1dResult {
    /// Cluster assignment for each input value
    pub cluster: Vec<usize>,
    /// Cluster centers
    pub centers: Vec<f64>,
    /// Number of iterations
    pub iter: usize,
    /// Whether the algorithm converged
    pub converged: bool,
}

impl Kmeans1dResult {
    /// Number of clusters that ended up with at least one member.
    pub fn occupied_clusters(&self) -> usize {
        let mut occupied = vec![false; self.centers.len()];
        for &c in &self.cluster {
            occupied[c] = true;
        }
        occupied.into_iter().filter(|&o| o).count()
    }
}

/// K-means++ initialization: select initial centers with probability
/// proportional to the squared distance from the nearest chosen center.
fn kmeans_plusplus_init(values: &[f64], k: usize, rng: &mut StdRng) -> Vec<f64> {
    let n = values.len();
    let mut centers: Vec<f64> = Vec::with_capacity(k);

    let first_idx = rng.gen_range(0..n);
    centers.push(values[first_idx]);

    for _ in 1..k {
        let dist_sq: Vec<f64> = values
            .iter()
            .map(|&v| {
                let d = centers
                    .iter()
                    .map(|&c| (v - c).abs())
                    .fold(f64::INFINITY, f64::min);
                d * d
            })
            .collect();
        let total: f64 = dist_sq.iter().sum();

        if total < NUMERICAL_EPS {
            let idx = rng.gen_range(0..n);
            centers.push(values[idx]);
        } else {
            let r = rng.gen::<f64>() * total;
            let mut cumsum = 0.0;
            let mut chosen = 0;
            for (i, &d) in dist_sq.iter().enumerate() {
                cumsum += d;
                if cumsum >= r {
                    chosen = i;
                    break;
                }
            }
            centers.push(values[chosen]);
        }
    }

    centers
}

fn assign_clusters(values: &[f64], centers: &[f64]) -> Vec<usize> {
    values
        .iter()
        .map(|&v| {
            let mut best_cluster = 0;
            let mut best_dist = f64::INFINITY;
            for (c, &center) in centers.iter().enumerate() {
                let dist = (v - center).abs();
                if dist < best_dist {
                    best_dist = dist;
                    best_cluster = c;
                }
            }
            best_cluster
        })
        .collect()
}

/// New centers as member means; a cluster without members keeps its center.
fn update_centers(values: &[f64], assignments: &[usize], centers: &[f64], k: usize) -> Vec<f64> {
    let mut sums = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (&v, &c) in values.iter().zip(assignments) {
        sums[c] += v;
        counts[c] += 1;
    }
    (0..k)
        .map(|c| {
            if counts[c] == 0 {
                centers[c]
            } else {
                sums[c] / counts[c] as f64
            }
        })
        .collect()
}

/// K-means clustering of scalar values.
///
/// # Arguments
/// * `values` - Input values
/// * `k` - Number of clusters
/// * `max_iter` - Maximum iterations
/// * `tol` - Convergence tolerance on center movement
/// * `seed` - Random seed
///
/// Degenerate inputs (`k == 0`, `k > values.len()`, empty input) yield an
/// empty, non-converged result rather than an error.
pub fn kmeans_1d(values: &[f64], k: usize, max_iter: usize, tol: f64, seed: u64) -> Kmeans1dResult {
    let n = values.len();
    if n == 0 || k == 0 || k > n {
        return Kmeans1dResult {
            cluster: Vec::new(),
            centers: Vec::new(),
            iter: 0,
            converged: false,
        };
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = kmeans_plusplus_init(values, k, &mut rng);
    let mut assignments = assign_clusters(values, &centers);
    let mut converged = false;
    let mut iter = 0;

    for iteration in 1..=max_iter {
        iter = iteration;
        let new_centers = update_centers(values, &assignments, &centers, k);
        let max_movement = centers
            .iter()
            .zip(&new_centers)
            .map(|(&a, &b)| (a - b).abs())
            .fold(0.0, f64::max);
        centers = new_centers;

        let new_assignments = assign_clusters(values, &centers);
        let stable = new_assignments == assignments;
        assignments = new_assignments;

        if stable || max_movement < tol {
            converged = true;
            break;
        }
    }

    Kmeans1dResult {
        cluster: assignments,
        centers,
        iter,
        converged,
    }
}

/// Estimates the number of coexisting branches in one voltage bin's sorted
/// peak values.
pub trait BranchCounter {
    /// Branch count for a bin; 0 means undetermined, not an error.
    fn count_branches(&self, sorted_values: &[f64]) -> usize;
}

/// Default branch counter: jump counting seeds a k-means run.
///
/// Consecutive sorted-value gaps above `threshold` estimate the cluster
/// count `k = jumps + 1`; a k-means pass then reports how many clusters are
/// actually occupied. Bins whose estimate reaches `max_branches`, or where
/// clustering is infeasible (fewer values, or fewer distinct values, than
/// clusters), count as 0.
///
/// The jump estimate is threshold-sensitive and can both over- and
/// under-estimate the true branch count; treat results as exploratory.
#[derive(Debug, Clone, Copy)]
pub struct JumpKmeansCounter {
    /// Minimum gap between sorted neighbours counted as a jump.
    pub threshold: f64,
    /// Estimates at or above this count are reported as undetermined.
    pub max_branches: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

impl Default for JumpKmeansCounter {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            max_branches: 8,
            max_iter: 50,
            tol: DEFAULT_CONVERGENCE_TOL,
            seed: 42,
        }
    }
}

impl BranchCounter for JumpKmeansCounter {
    fn count_branches(&self, sorted_values: &[f64]) -> usize {
        let jumps = sorted_values
            .windows(2)
            .filter(|w| w[1] - w[0] > self.threshold)
            .count();
        let k = jumps + 1;
        if k >= self.max_branches || sorted_values.len() < k {
            return 0;
        }
        let mut distinct = 0;
        for (i, &v) in sorted_values.iter().enumerate() {
            if i == 0 || v != sorted_values[i - 1] {
                distinct += 1;
            }
        }
        if distinct < k {
            return 0;
        }
        kmeans_1d(sorted_values, k, self.max_iter, self.tol, self.seed).occupied_clusters()
    }
}

/// A drive voltage at which the branch count rises.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BifurcationPoint {
    pub voltage: f64,
    pub branches: usize,
}

/// Per-voltage branch counts for a flattened `(voltage, peak)` pair list,
/// in ascending voltage order.
///
/// Pairs are taken positionally from `xs`/`ys`; values are grouped by exact
/// voltage and sorted within each group before counting.
pub fn branch_counts(xs: &[f64], ys: &[f64], counter: &dyn BranchCounter) -> Vec<(f64, usize)> {
    let mut pairs: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut counts = Vec::new();
    let mut start = 0;
    while start < pairs.len() {
        let voltage = pairs[start].0;
        let mut end = start + 1;
        while end < pairs.len() && pairs[end].0 == voltage {
            end += 1;
        }
        let values: Vec<f64> = pairs[start..end].iter().map(|p| p.1).collect();
        counts.push((voltage, counter.count_branches(&values)));
        start = end;
    }
    counts
}

/// Report voltages whose branch count strictly exceeds the maximum branch
/// count among the previous `back_window` voltages (clipped at the start of
/// the sequence). The first voltage is never reported.
pub fn find_bifurcations(
    xs: &[f64],
    ys: &[f64],
    counter: &dyn BranchCounter,
    back_window: usize,
) -> Vec<BifurcationPoint> {
    let counts = branch_counts(xs, ys, counter);
    (1..counts.len())
        .filter(|&i| {
            let lo = i.saturating_sub(back_window);
            let prev_max = counts[lo..i].iter().map(|&(_, c)| c).max().unwrap_or(0);
            counts[i].1 > prev_max
        })
        .map(|i| BifurcationPoint {
            voltage: counts[i].0,
            branches: counts[i].1,
        })
        .collect()
}
