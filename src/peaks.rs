//! Peak extraction strategies for windowed response traces.
//!
//! All three strategies share one candidate detector (local maxima filtered
//! by minimum distance and prominence) and differ in how a candidate is
//! turned into a reported value: the raw sample, a window average, or an
//! area under the curve. Strategies are pure functions of their input; no
//! state is kept between calls.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BifmapError;
use crate::helpers::{max_value, mean, trapezoid};

/// Peak values and their sample indices into the analyzed slice.
///
/// `values` and `indices` are co-indexed and ordered by array position of
/// discovery. Both are empty when no candidate qualifies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakExtraction {
    pub values: Vec<f64>,
    pub indices: Vec<usize>,
}

impl PeakExtraction {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn push(&mut self, value: f64, index: usize) {
        self.values.push(value);
        self.indices.push(index);
    }
}

/// Parameters shared by the peak extraction strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Minimum prominence as a fraction of the slice maximum.
    pub prominence_epsilon: f64,
    /// Minimum distance between candidate peaks, in samples.
    pub distance: usize,
    /// Half-width of the averaging/support window around a candidate.
    pub peak_window: usize,
    /// Noise floor as a fraction of the slice maximum (area strategy).
    pub zero_epsilon: f64,
    /// Use the fixed `peak_window` support interval instead of growing it
    /// out to the noise floor (area strategy).
    pub fixed_window: bool,
    /// Divide areas by `2 * peak_window` (area strategy).
    pub normalize: bool,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            prominence_epsilon: 0.2,
            distance: 100,
            peak_window: 10,
            zero_epsilon: 0.01,
            fixed_window: false,
            normalize: false,
        }
    }
}

/// Selects one of the competing peak extraction algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeakMethod {
    /// Raw sample values at the surviving candidate indices.
    Prominence,
    /// Arithmetic mean of a window around each candidate.
    ProbabilityWindow,
    /// Trapezoidal area over each candidate's support interval.
    Area,
}

impl PeakMethod {
    /// Run the selected strategy over one data slice.
    pub fn extract(&self, data: &[f64], config: &PeakConfig) -> PeakExtraction {
        match self {
            PeakMethod::Prominence => extract_peaks(data, config),
            PeakMethod::ProbabilityWindow => extract_peaks_prob(data, config),
            PeakMethod::Area => extract_peaks_areas(data, config),
        }
    }
}

impl fmt::Display for PeakMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeakMethod::Prominence => "prominence",
            PeakMethod::ProbabilityWindow => "probability-window",
            PeakMethod::Area => "area",
        };
        f.write_str(name)
    }
}

impl FromStr for PeakMethod {
    type Err = BifmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prominence" => Ok(PeakMethod::Prominence),
            "probability-window" => Ok(PeakMethod::ProbabilityWindow),
            "area" => Ok(PeakMethod::Area),
            other => Err(BifmapError::UnknownPeakMode(other.to_string())),
        }
    }
}

/// Interior local maxima of a slice, with flat plateaus reported at their
/// middle sample. The first and last samples are never maxima.
fn local_maxima(data: &[f64]) -> Vec<usize> {
    let n = data.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let i_max = n - 1;
    let mut i = 1;
    while i < i_max {
        if data[i - 1] < data[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && data[i_ahead] == data[i] {
                i_ahead += 1;
            }
            if data[i_ahead] < data[i] {
                peaks.push((i + i_ahead - 1) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Minimum-distance pruning by descending peak height: the tallest peak
/// survives and removes any unkept neighbour closer than `distance` samples.
fn select_by_peak_distance(peaks: &[usize], heights: &[f64], distance: usize) -> Vec<bool> {
    let n = peaks.len();
    let mut keep = vec![true; n];
    if distance < 2 {
        return keep;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| heights[a].total_cmp(&heights[b]).then(a.cmp(&b)));
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 {
            k -= 1;
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        let mut k = j + 1;
        while k < n && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }
    keep
}

/// Prominence of a peak: height above the higher of the two lowest points
/// reached walking out from the peak until a strictly taller sample (or the
/// slice edge) is met on each side.
fn peak_prominence(data: &[f64], peak: usize) -> f64 {
    let peak_val = data[peak];

    let mut left_min = peak_val;
    let mut i = peak;
    while i > 0 {
        i -= 1;
        if data[i] > peak_val {
            break;
        }
        left_min = left_min.min(data[i]);
    }

    let mut right_min = peak_val;
    for &v in &data[peak + 1..] {
        if v > peak_val {
            break;
        }
        right_min = right_min.min(v);
    }

    peak_val - left_min.max(right_min)
}

/// Candidate peak indices: interior local maxima, pruned to the minimum
/// mutual `distance` (taller peak wins), then filtered to prominence
/// `>= min_prominence`.
///
/// # Arguments
/// * `data` - Sample slice to search
/// * `min_prominence` - Absolute prominence threshold
/// * `distance` - Minimum distance between surviving peaks, in samples
///
/// # Returns
/// Surviving indices in ascending order; empty when nothing qualifies.
pub fn find_peaks(data: &[f64], min_prominence: f64, distance: usize) -> Vec<usize> {
    let peaks = local_maxima(data);
    let heights: Vec<f64> = peaks.iter().map(|&i| data[i]).collect();
    let keep = select_by_peak_distance(&peaks, &heights, distance);
    peaks
        .into_iter()
        .zip(keep)
        .filter(|&(_, k)| k)
        .map(|(i, _)| i)
        .filter(|&i| peak_prominence(data, i) >= min_prominence)
        .collect()
}

fn candidates(data: &[f64], config: &PeakConfig) -> Vec<usize> {
    let prominence = max_value(data) * config.prominence_epsilon;
    find_peaks(data, prominence, config.distance)
}

/// Prominence strategy: raw sample values at the candidate indices.
///
/// The prominence threshold is `prominence_epsilon * max(data)`.
pub fn extract_peaks(data: &[f64], config: &PeakConfig) -> PeakExtraction {
    let mut result = PeakExtraction::default();
    if data.is_empty() {
        return result;
    }
    for i in candidates(data, config) {
        result.push(data[i], i);
    }
    result
}

/// Probability-window strategy: each candidate reports the arithmetic mean
/// of `data` over `[i - peak_window, i + peak_window)`, clipped to the slice
/// bounds. Candidates whose averaged value is non-positive are discarded.
pub fn extract_peaks_prob(data: &[f64], config: &PeakConfig) -> PeakExtraction {
    let mut result = PeakExtraction::default();
    if data.is_empty() {
        return result;
    }
    for i in candidates(data, config) {
        let lo = i.saturating_sub(config.peak_window);
        let hi = (i + config.peak_window).min(data.len());
        let prob_peak = mean(&data[lo..hi]);
        if prob_peak > 0.0 {
            result.push(prob_peak, i);
        }
    }
    result
}

/// Area strategy: each candidate reports the trapezoidal integral of `data`
/// over its support interval.
///
/// With `fixed_window` the interval is `[i - peak_window, i + peak_window)`
/// clipped to the slice. Otherwise it is grown outward from the peak while
/// samples stay at or above the noise floor `zero_epsilon * max(data)`: the
/// first below-floor sample becomes the boundary on each side (included on
/// the left, exclusive on the right), falling back to the fixed half-width
/// when no sample drops below the floor. Non-positive areas are discarded,
/// so every returned value is strictly positive. With `normalize` the areas
/// are divided by `2 * peak_window`.
pub fn extract_peaks_areas(data: &[f64], config: &PeakConfig) -> PeakExtraction {
    let mut result = PeakExtraction::default();
    if data.is_empty() {
        return result;
    }
    let zero = max_value(data) * config.zero_epsilon;
    let w = config.peak_window;

    for peak_i in candidates(data, config) {
        let lo_bound = peak_i.saturating_sub(w);
        let hi_bound = (peak_i + w).min(data.len());
        let mut left = lo_bound;
        let mut right = hi_bound;

        if !config.fixed_window {
            for i in (lo_bound + 1..peak_i).rev() {
                if data[i] < zero {
                    left = i;
                    break;
                }
            }
            for (i, &v) in data.iter().enumerate().take(hi_bound).skip(peak_i + 1) {
                if v < zero {
                    right = i;
                    break;
                }
            }
        }

        let area = trapezoid(&data[left..right]);
        if area > 0.0 {
            result.push(area, peak_i);
        }
    }

    if config.normalize {
        let divisor = (2 * w) as f64;
        for v in &mut result.values {
            *v /= divisor;
        }
    }
    result
}
