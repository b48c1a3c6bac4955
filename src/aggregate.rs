//! Windowed aggregation of response peaks keyed by drive amplitude.
//!
//! The aggregator steps through the drive trace one modulation cycle at a
//! time, classifies each window by the maximum absolute drive voltage seen
//! in it, runs a peak extraction strategy over the corresponding response
//! slice, and accumulates the extracted values into one [`PeakMap`] per
//! response channel.

use crate::error::BifmapError;
use crate::helpers::max_abs;
use crate::peak_map::{PeakMap, VoltageQuantizer};
use crate::peaks::{PeakConfig, PeakMethod};
use crate::window::{channel_offsets, padded_bounds, OffsetSearch};

pub(crate) fn validate_traces(
    drive: &[f64],
    responses: &[Vec<f64>],
    window_size: usize,
    pad: f64,
) -> Result<(), BifmapError> {
    if window_size == 0 {
        return Err(BifmapError::InvalidWindowSize);
    }
    if !pad.is_finite() || pad < 0.0 {
        return Err(BifmapError::InvalidPadding(pad));
    }
    for (channel, response) in responses.iter().enumerate() {
        if response.len() != drive.len() {
            return Err(BifmapError::TraceLengthMismatch {
                drive: drive.len(),
                channel,
                response: response.len(),
            });
        }
    }
    Ok(())
}

/// Aggregation core over pre-validated slices. Total: numerical edge cases
/// (empty windows, no qualifying peaks) land as empty bins, never errors.
pub(crate) fn aggregate_range(
    drive: &[f64],
    responses: &[&[f64]],
    window_size: usize,
    pad: f64,
    method: PeakMethod,
    peaks: &PeakConfig,
    quantizer: VoltageQuantizer,
    offsets: &[usize],
) -> Vec<PeakMap> {
    responses
        .iter()
        .zip(offsets)
        .map(|(response, &offset)| {
            let mut map = PeakMap::new(quantizer);
            let mut start = offset;
            while start < drive.len() {
                let (lo, hi) = padded_bounds(start, window_size, pad, drive.len());
                let voltage = max_abs(&drive[lo..hi]);
                let extracted = method.extract(&response[lo..hi], peaks);
                map.append(voltage, extracted.values);
                start += window_size;
            }
            map
        })
        .collect()
}

/// Slide a per-cycle window over each response channel and accumulate peak
/// values keyed by the window's maximum absolute drive voltage.
///
/// Each channel `j` is stepped in strides of `window_size` starting at
/// `offsets[j]` (all zero when `offsets` is `None`). Every stride position
/// is widened to the padded window before keying and extraction, so padded
/// slices may overlap and re-count peaks near window edges; the unpadded
/// strides themselves never overlap.
///
/// # Arguments
/// * `drive` - Drive-voltage trace
/// * `responses` - Response traces, one per channel, same length as `drive`
/// * `window_size` - Samples per modulation cycle
/// * `pad` - Symmetric window padding as a fraction of `window_size`
/// * `method` / `peaks` - Peak extraction strategy and its parameters
/// * `quantizer` - Voltage-key quantization policy
/// * `offsets` - Optional per-channel start offsets
///
/// # Returns
/// One [`PeakMap`] per response channel. Every key is the quantized maximum
/// absolute drive value observed in some visited window.
#[allow(clippy::too_many_arguments)]
pub fn aggregate_windows(
    drive: &[f64],
    responses: &[Vec<f64>],
    window_size: usize,
    pad: f64,
    method: PeakMethod,
    peaks: &PeakConfig,
    quantizer: VoltageQuantizer,
    offsets: Option<&[usize]>,
) -> Result<Vec<PeakMap>, BifmapError> {
    validate_traces(drive, responses, window_size, pad)?;
    let offsets = match offsets {
        Some(given) => {
            if given.len() != responses.len() {
                return Err(BifmapError::OffsetCountMismatch {
                    channels: responses.len(),
                    offsets: given.len(),
                });
            }
            given.to_vec()
        }
        None => vec![0; responses.len()],
    };
    let views: Vec<&[f64]> = responses.iter().map(Vec::as_slice).collect();
    let maps = aggregate_range(
        drive,
        &views,
        window_size,
        pad,
        method,
        peaks,
        quantizer,
        &offsets,
    );
    log::info!(
        "aggregated {} samples into {} voltage bins over {} channels",
        drive.len(),
        maps.first().map_or(0, PeakMap::num_bins),
        maps.len()
    );
    Ok(maps)
}

/// [`aggregate_windows`] with an optional auto-offset pre-pass that
/// phase-aligns each channel's windows to a drive-cycle trough before
/// aggregation.
#[allow(clippy::too_many_arguments)]
pub fn analyze_am_traces(
    drive: &[f64],
    responses: &[Vec<f64>],
    window_size: usize,
    pad: f64,
    method: PeakMethod,
    peaks: &PeakConfig,
    quantizer: VoltageQuantizer,
    auto_offset: Option<&OffsetSearch>,
) -> Result<Vec<PeakMap>, BifmapError> {
    validate_traces(drive, responses, window_size, pad)?;
    let offsets = auto_offset.map(|search| channel_offsets(responses, window_size, search));
    aggregate_windows(
        drive,
        responses,
        window_size,
        pad,
        method,
        peaks,
        quantizer,
        offsets.as_deref(),
    )
}
