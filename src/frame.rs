//! Device-level data-frame summary built from per-channel estimates.

use std::collections::BTreeMap;

use phasor_core::estimator::normalized_degrees;
use phasor_core::{ChannelEstimate, ChannelId};
use serde::Serialize;

/// One phasor slot of the outgoing data frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FramePhasor {
    pub channel: ChannelId,
    pub amplitude: f64,
    pub phase_rad: f64,
    /// Phase rounded to whole degrees, `0..360`.
    pub degrees: u16,
}

/// Values a data frame carries for the whole device.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataFrameSummary {
    pub phasors: Vec<FramePhasor>,
    /// Mean of `|nominal − avg_frequency|` over all channels, Hz.
    pub frequency_deviation: f64,
    /// Mean ROCOF over the channels that have one; 0 when none do.
    pub rocof: f64,
}

/// Reduce the estimates of one capture to a single frame.
///
/// Returns `None` when no channel was estimated.
pub fn summarize(
    estimates: &BTreeMap<ChannelId, ChannelEstimate>,
    nominal_frequency: f64,
) -> Option<DataFrameSummary> {
    if estimates.is_empty() {
        return None;
    }

    let phasors = estimates
        .iter()
        .map(|(&channel, est)| FramePhasor {
            channel,
            amplitude: est.amplitude,
            phase_rad: est.phase_rad,
            degrees: rounded_degrees(est.phase_rad),
        })
        .collect();

    let frequency_deviation = estimates
        .values()
        .map(|est| (nominal_frequency - est.avg_frequency).abs())
        .sum::<f64>()
        / estimates.len() as f64;

    let rocofs: Vec<f64> = estimates.values().filter_map(|est| est.rocof).collect();
    let rocof = if rocofs.is_empty() {
        0.0
    } else {
        rocofs.iter().sum::<f64>() / rocofs.len() as f64
    };

    Some(DataFrameSummary {
        phasors,
        frequency_deviation,
        rocof,
    })
}

/// Phase in whole degrees; 359.6° rounds to 0, not 360.
pub fn rounded_degrees(phase_rad: f64) -> u16 {
    (normalized_degrees(phase_rad).round() as u16) % 360
}
