//! Voltage-keyed peak accumulation with an explicit key quantization policy.
//!
//! Drive voltages are floating point, so raw values make fragile map keys.
//! Windows are merged into the same voltage bin exactly when their drive
//! maxima quantize to the same step multiple; the default step is the 1 mV
//! granularity of the drive generator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maps a drive voltage onto an integer bin key and back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageQuantizer {
    /// Bin width in volts.
    pub step: f64,
}

impl Default for VoltageQuantizer {
    fn default() -> Self {
        Self { step: 1e-3 }
    }
}

impl VoltageQuantizer {
    pub fn new(step: f64) -> Self {
        Self { step }
    }

    /// Bin key for a voltage: the nearest step multiple.
    pub fn key(&self, voltage: f64) -> i64 {
        (voltage / self.step).round() as i64
    }

    /// Representative voltage of a bin key.
    pub fn voltage(&self, key: i64) -> f64 {
        key as f64 * self.step
    }
}

/// Ordered mapping from quantized drive voltage to accumulated peak values
/// for one response channel.
///
/// Created empty at the start of an aggregation pass and grown append-only;
/// a bin exists for every voltage whose window was visited, even when the
/// window yielded no peaks. After the pass the map is a terminal output —
/// the only later mutation is the one-shot [`merge`](PeakMap::merge) of
/// per-worker maps in the segmented path.
#[derive(Debug, Clone)]
pub struct PeakMap {
    quantizer: VoltageQuantizer,
    bins: BTreeMap<i64, Vec<f64>>,
}

impl PeakMap {
    pub fn new(quantizer: VoltageQuantizer) -> Self {
        Self {
            quantizer,
            bins: BTreeMap::new(),
        }
    }

    pub fn quantizer(&self) -> VoltageQuantizer {
        self.quantizer
    }

    /// Append peak values under a voltage, creating the bin if absent.
    pub fn append(&mut self, voltage: f64, values: impl IntoIterator<Item = f64>) {
        let key = self.quantizer.key(voltage);
        self.bins.entry(key).or_default().extend(values);
    }

    /// Peak values accumulated for a voltage, if its bin exists.
    pub fn get(&self, voltage: f64) -> Option<&[f64]> {
        self.bins
            .get(&self.quantizer.key(voltage))
            .map(Vec::as_slice)
    }

    /// Number of voltage bins.
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// Total number of stored peak values across all bins.
    pub fn num_values(&self) -> usize {
        self.bins.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Iterate bins in ascending voltage order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> + '_ {
        self.bins
            .iter()
            .map(|(&k, v)| (self.quantizer.voltage(k), v.as_slice()))
    }

    /// Concatenate another map's value lists under matching keys.
    ///
    /// Both maps must share the same quantization step; keys present only in
    /// `other` are inserted as new bins.
    pub fn merge(&mut self, other: PeakMap) {
        debug_assert_eq!(self.quantizer, other.quantizer);
        for (key, values) in other.bins {
            self.bins.entry(key).or_default().extend(values);
        }
    }

    /// Flatten into parallel `(xs, ys)` coordinate arrays for scatter
    /// plotting: one `(voltage, peak)` pair per stored value, in ascending
    /// voltage order and then insertion order within a bin. An empty map
    /// flattens to two empty vectors.
    pub fn flatten(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.num_values();
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for (voltage, values) in self.iter() {
            for &peak in values {
                xs.push(voltage);
                ys.push(peak);
            }
        }
        (xs, ys)
    }
}
