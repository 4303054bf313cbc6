use std::collections::BTreeMap;
use std::fmt;

use realfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, EstimationError};

/// Identifier of one analog input channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u16);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for ChannelId {
    fn from(id: u16) -> Self {
        ChannelId(id)
    }
}

/// One measurement window of synchronously sampled channels.
///
/// All channels share the sampling frequency and hold exactly
/// `sample_count` samples; [`Capture::new`] refuses anything else, so the
/// estimator never has to re-check it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CaptureRecord", into = "CaptureRecord")]
pub struct Capture {
    sampling_frequency: f64,
    nominal_frequency: f64,
    sample_count: usize,
    channels: BTreeMap<ChannelId, Vec<f64>>,
}

impl Capture {
    pub fn new(
        sampling_frequency: f64,
        nominal_frequency: f64,
        sample_count: usize,
        channels: BTreeMap<ChannelId, Vec<f64>>,
    ) -> Result<Self, CaptureError> {
        if !sampling_frequency.is_finite() || sampling_frequency <= 0.0 {
            return Err(CaptureError::InvalidSamplingFrequency(sampling_frequency));
        }
        if !nominal_frequency.is_finite() || nominal_frequency <= 0.0 {
            return Err(CaptureError::InvalidNominalFrequency(nominal_frequency));
        }
        for (&channel, samples) in &channels {
            if samples.len() != sample_count {
                return Err(CaptureError::ChannelLengthMismatch {
                    channel,
                    expected: sample_count,
                    actual: samples.len(),
                });
            }
        }
        Ok(Self {
            sampling_frequency,
            nominal_frequency,
            sample_count,
            channels,
        })
    }

    /// Sampling frequency `Fs` in Hz.
    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    /// Sample period `Ts = 1/Fs` in seconds.
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sampling_frequency
    }

    /// Nominal grid frequency `Fn` in Hz (50 or 60 on real grids).
    pub fn nominal_frequency(&self) -> f64 {
        self.nominal_frequency
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn channels(&self) -> &BTreeMap<ChannelId, Vec<f64>> {
        &self.channels
    }

    pub fn channel(&self, id: ChannelId) -> Option<&[f64]> {
        self.channels.get(&id).map(Vec::as_slice)
    }

    /// Capture duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.sample_count as f64 / self.sampling_frequency
    }
}

/// Wire shape of a [`Capture`]; validated on the way in.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CaptureRecord {
    sampling_frequency: f64,
    nominal_frequency: f64,
    sample_count: usize,
    channels: BTreeMap<ChannelId, Vec<f64>>,
}

impl TryFrom<CaptureRecord> for Capture {
    type Error = CaptureError;

    fn try_from(record: CaptureRecord) -> Result<Self, Self::Error> {
        Capture::new(
            record.sampling_frequency,
            record.nominal_frequency,
            record.sample_count,
            record.channels,
        )
    }
}

impl From<Capture> for CaptureRecord {
    fn from(capture: Capture) -> Self {
        CaptureRecord {
            sampling_frequency: capture.sampling_frequency,
            nominal_frequency: capture.nominal_frequency,
            sample_count: capture.sample_count,
            channels: capture.channels,
        }
    }
}

/// Synchrophasor estimate for one channel of one capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelEstimate {
    /// First-period frequency minus last-period frequency (Hz/s over a 1 s
    /// capture). `None` when the channel produced a single period.
    pub rocof: Option<f64>,
    /// Mean of the per-period frequencies, Hz.
    pub avg_frequency: f64,
    /// Peak amplitude of the fundamental, in input units.
    pub amplitude: f64,
    /// Phase of the fundamental, radians in `(-π, π]`.
    pub phase_rad: f64,
    /// Phase of the fundamental, degrees in `[0, 360)`.
    pub phase_deg: f64,
    /// Frequency of the selected DFT bin, Hz.
    pub fft_frequency: f64,
    /// Phase-corrected fundamental DFT coefficient (unscaled).
    #[serde(with = "complex_pair")]
    pub phasor: Complex64,
    pub crossing_count: usize,
    pub window_start: usize,
    pub window_length: usize,
    pub samples_per_period: usize,
    pub periods_taken: usize,
}

/// Per-channel outcome of one estimation pass.
///
/// Channels appear in exactly one of the two maps.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EstimationReport {
    pub estimates: BTreeMap<ChannelId, ChannelEstimate>,
    pub failures: BTreeMap<ChannelId, EstimationError>,
}

impl EstimationReport {
    pub fn estimate(&self, id: ChannelId) -> Option<&ChannelEstimate> {
        self.estimates.get(&id)
    }

    pub fn failure(&self, id: ChannelId) -> Option<&EstimationError> {
        self.failures.get(&id)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// (De)serialize a complex number as `[re, im]`.
mod complex_pair {
    use realfft::num_complex::Complex64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Complex64, serializer: S) -> Result<S::Ok, S::Error> {
        (value.re, value.im).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Complex64, D::Error> {
        let (re, im) = <(f64, f64)>::deserialize(deserializer)?;
        Ok(Complex64::new(re, im))
    }
}
