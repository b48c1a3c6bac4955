//! Parameter sweeps over drive voltage and modulation frequency.
//!
//! A sweep walks the configured voltage x frequency grid, programs the
//! drive generator at each point, fetches one acquisition from a trace
//! source, runs the aggregation pipeline, and records the flattened
//! bifurcation map per response channel. Reports serialize to JSON; the
//! on-disk format is not stability-guaranteed.

use serde::{Deserialize, Serialize};

use crate::aggregate::analyze_am_traces;
use crate::device::{AwgHandle, Device};
use crate::error::BifmapError;
use crate::peak_map::VoltageQuantizer;
use crate::peaks::{PeakConfig, PeakMethod};
use crate::source::TraceSource;
use crate::window::OffsetSearch;

/// One sweep dimension: an explicit value list or an inclusive range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepAxis {
    List(Vec<f64>),
    Range { start: f64, stop: f64, count: usize },
}

impl SweepAxis {
    /// Materialize the axis values. A `Range` includes both endpoints;
    /// `count == 1` yields only `start`. Empty axes are a fatal
    /// configuration error.
    pub fn values(&self) -> Result<Vec<f64>, BifmapError> {
        match self {
            SweepAxis::List(values) => {
                if values.is_empty() {
                    return Err(BifmapError::EmptySweepAxis);
                }
                Ok(values.clone())
            }
            SweepAxis::Range { start, stop, count } => match count {
                0 => Err(BifmapError::EmptySweepAxis),
                1 => Ok(vec![*start]),
                _ => Ok((0..*count)
                    .map(|i| start + (stop - start) * i as f64 / (count - 1) as f64)
                    .collect()),
            },
        }
    }
}

/// Sweep parameters, serializable so runs can be reproduced from a config
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub voltages: SweepAxis,
    pub frequencies: SweepAxis,
    pub window_size: usize,
    #[serde(default)]
    pub pad: f64,
    pub method: PeakMethod,
    #[serde(default)]
    pub peaks: PeakConfig,
    #[serde(default)]
    pub quantizer: VoltageQuantizer,
    /// Run the best-effort cycle-offset pre-pass per channel.
    #[serde(default)]
    pub auto_offset: bool,
}

/// Flattened bifurcation map of one response channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelMap {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

/// Pipeline output for one grid point.
#[derive(Debug, Clone, Serialize)]
pub struct SweepPoint {
    pub voltage: f64,
    pub frequency: f64,
    pub channels: Vec<ChannelMap>,
}

/// Accumulated results of one sweep run.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SweepReport {
    pub points: Vec<SweepPoint>,
}

impl SweepReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Walk the sweep grid: program the generator, acquire, aggregate, record.
///
/// The loop is sequential; a fetch may block for a long time while the
/// device layer rides out a reconnect storm. Errors from the generator,
/// the source or the pipeline abort the sweep.
pub fn run_sweep<D: Device, S: TraceSource>(
    awg: &mut AwgHandle<D>,
    source: &mut S,
    config: &SweepConfig,
) -> Result<SweepReport, BifmapError> {
    let voltages = config.voltages.values()?;
    let frequencies = config.frequencies.values()?;
    let search = config.auto_offset.then(OffsetSearch::default);

    let mut report = SweepReport::default();
    for &frequency in &frequencies {
        awg.set_frequency(frequency)?;
        for &voltage in &voltages {
            awg.set_voltage(voltage)?;
            let traces = source.get_data()?;
            let maps = analyze_am_traces(
                &traces.drive,
                &traces.responses,
                config.window_size,
                config.pad,
                config.method,
                &config.peaks,
                config.quantizer,
                search.as_ref(),
            )?;
            let channels: Vec<ChannelMap> = maps
                .iter()
                .map(|map| {
                    let (xs, ys) = map.flatten();
                    ChannelMap { xs, ys }
                })
                .collect();
            log::info!(
                "sweep point v={voltage:.3} f={frequency:.3}: {} peak values",
                channels.iter().map(|c| c.xs.len()).sum::<usize>()
            );
            report.points.push(SweepPoint {
                voltage,
                frequency,
                channels,
            });
        }
    }
    Ok(report)
}
