//! Interleaved ADC scans to [`Capture`]s.
//!
//! The converter delivers one scan as `samples_per_channel` rounds of one
//! raw count per enabled channel, in layout order:
//! `raw[scan * channels + position]`.

use std::collections::BTreeMap;

use phasor_core::{Capture, CaptureError, ChannelId};
use serde::{Deserialize, Serialize};

/// Highest sampling frequency the converter supports, Hz.
pub const MAX_SAMPLING_FREQUENCY: f64 = 12_500.0;
/// Number of analog inputs on the converter.
pub const INPUT_COUNT: u16 = 8;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AcquisitionError {
    #[error("sampling frequency {0} Hz outside [1, 12500]")]
    SamplingFrequency(f64),

    #[error("at least one channel is required")]
    NoChannels,

    #[error("{0} channels requested, the converter scans at most 8")]
    TooManyChannels(usize),

    #[error("channel {0} is not an input of the converter")]
    UnknownChannel(u16),

    #[error("channel {0} listed twice")]
    DuplicateChannel(u16),

    #[error("scan must hold at least one sample per channel")]
    NoSamples,

    #[error("unsupported converter resolution: {0} bits")]
    Resolution(u8),

    #[error("calibration of channel {0} has zero slope")]
    Calibration(u16),

    #[error("raw scan holds {actual} values, expected {expected}")]
    ScanLength { expected: usize, actual: usize },

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Per-channel linear correction `counts · slope + intercept`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

impl Calibration {
    pub fn apply(&self, counts: f64) -> f64 {
        counts * self.slope + self.intercept
    }

    pub fn invert(&self, corrected: f64) -> f64 {
        (corrected - self.intercept) / self.slope
    }
}

/// Bipolar converter transfer function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Converter {
    pub resolution_bits: u8,
    /// Full-scale input range is `±range_volts`.
    pub range_volts: f64,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            resolution_bits: 12,
            range_volts: 10.0,
        }
    }
}

impl Converter {
    fn midscale(&self) -> f64 {
        (1u32 << (self.resolution_bits - 1)) as f64
    }

    /// Largest raw count.
    pub fn full_scale(&self) -> f64 {
        ((1u32 << self.resolution_bits) - 1) as f64
    }

    /// Corrected counts to volts.
    pub fn volts(&self, counts: f64) -> f64 {
        let mid = self.midscale();
        (counts - mid) * self.range_volts / mid
    }

    /// Volts to (unquantized) corrected counts.
    pub fn counts(&self, volts: f64) -> f64 {
        let mid = self.midscale();
        volts * mid / self.range_volts + mid
    }
}

/// Which inputs are scanned, how fast and for how long.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanLayout {
    pub channels: Vec<u16>,
    pub sampling_frequency: f64,
    pub samples_per_channel: usize,
    pub nominal_frequency: f64,
    #[serde(default)]
    pub converter: Converter,
    #[serde(default)]
    pub calibration: BTreeMap<u16, Calibration>,
}

impl Default for ScanLayout {
    fn default() -> Self {
        Self {
            channels: vec![1, 2, 3],
            sampling_frequency: 10_000.0,
            samples_per_channel: 1600,
            nominal_frequency: 50.0,
            converter: Converter::default(),
            calibration: BTreeMap::new(),
        }
    }
}

impl ScanLayout {
    pub fn validate(&self) -> Result<(), AcquisitionError> {
        if !(1.0..=MAX_SAMPLING_FREQUENCY).contains(&self.sampling_frequency) {
            return Err(AcquisitionError::SamplingFrequency(self.sampling_frequency));
        }
        if self.channels.is_empty() {
            return Err(AcquisitionError::NoChannels);
        }
        if self.channels.len() > INPUT_COUNT as usize {
            return Err(AcquisitionError::TooManyChannels(self.channels.len()));
        }
        let mut mask = 0u16;
        for &channel in &self.channels {
            if channel >= INPUT_COUNT {
                return Err(AcquisitionError::UnknownChannel(channel));
            }
            if mask & (1 << channel) != 0 {
                return Err(AcquisitionError::DuplicateChannel(channel));
            }
            mask |= 1 << channel;
        }
        if self.samples_per_channel == 0 {
            return Err(AcquisitionError::NoSamples);
        }
        if !(2..=16).contains(&self.converter.resolution_bits) {
            return Err(AcquisitionError::Resolution(self.converter.resolution_bits));
        }
        for (&channel, calibration) in &self.calibration {
            if calibration.slope == 0.0 {
                return Err(AcquisitionError::Calibration(channel));
            }
        }
        Ok(())
    }

    /// Number of raw values in one scan.
    pub fn scan_len(&self) -> usize {
        self.channels.len() * self.samples_per_channel
    }

    pub fn calibration(&self, channel: u16) -> Calibration {
        self.calibration.get(&channel).copied().unwrap_or_default()
    }

    /// Split an interleaved scan into calibrated per-channel voltages.
    pub fn decode(&self, raw: &[u16]) -> Result<Capture, AcquisitionError> {
        self.validate()?;
        let expected = self.scan_len();
        if raw.len() != expected {
            return Err(AcquisitionError::ScanLength {
                expected,
                actual: raw.len(),
            });
        }

        let width = self.channels.len();
        let channels: BTreeMap<ChannelId, Vec<f64>> = self
            .channels
            .iter()
            .enumerate()
            .map(|(position, &channel)| {
                let calibration = self.calibration(channel);
                let volts = raw
                    .iter()
                    .skip(position)
                    .step_by(width)
                    .map(|&counts| self.converter.volts(calibration.apply(counts as f64)))
                    .collect();
                (ChannelId(channel), volts)
            })
            .collect();

        log::debug!(
            "decoded {} channels x {} samples at {} Hz",
            width,
            self.samples_per_channel,
            self.sampling_frequency
        );
        Ok(Capture::new(
            self.sampling_frequency,
            self.nominal_frequency,
            self.samples_per_channel,
            channels,
        )?)
    }

    /// Quantize a voltage source into an interleaved raw scan, the way the
    /// converter would deliver it.
    ///
    /// `volts_at(channel, scan)` gives the input voltage of `channel` at
    /// sample `scan`.
    pub fn encode(
        &self,
        mut volts_at: impl FnMut(u16, usize) -> f64,
    ) -> Result<Vec<u16>, AcquisitionError> {
        self.validate()?;
        let full_scale = self.converter.full_scale();
        let mut raw = Vec::with_capacity(self.scan_len());
        for scan in 0..self.samples_per_channel {
            for &channel in &self.channels {
                let corrected = self.converter.counts(volts_at(channel, scan));
                let counts = self.calibration(channel).invert(corrected);
                raw.push(counts.round().clamp(0.0, full_scale) as u16);
            }
        }
        Ok(raw)
    }
}
