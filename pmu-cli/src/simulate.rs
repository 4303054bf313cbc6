//! Stand-in for the converter: a three-phase source whose frequency wanders
//! slowly around nominal.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use phasor_core::synth;
use pmu_station::{AcquisitionError, ScanLayout};

/// Peak frequency excursion from nominal, Hz.
const DRIFT_HZ: f64 = 0.05;
/// Period of the frequency excursion, seconds.
const DRIFT_PERIOD_SECS: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct DriftingSource {
    nominal_frequency: f64,
    amplitude: f64,
    elapsed: f64,
    phase: f64,
}

impl DriftingSource {
    pub fn new(nominal_frequency: f64, amplitude: f64) -> Self {
        Self {
            nominal_frequency,
            amplitude,
            elapsed: 0.0,
            phase: PI / 2.0,
        }
    }

    /// Instantaneous frequency `t` seconds after start.
    pub fn frequency_at(&self, t: f64) -> f64 {
        self.nominal_frequency + DRIFT_HZ * (2.0 * PI * t / DRIFT_PERIOD_SECS).sin()
    }

    fn drift_rate_at(&self, t: f64) -> f64 {
        DRIFT_HZ * 2.0 * PI / DRIFT_PERIOD_SECS * (2.0 * PI * t / DRIFT_PERIOD_SECS).cos()
    }

    /// Raw interleaved scan as the converter would deliver it now, then
    /// advance the source by `interval_secs`. An invalid layout leaves the
    /// source untouched.
    ///
    /// Within one scan the frequency ramps linearly at the current drift
    /// rate. Channels are 120° apart in layout order.
    pub fn next_scan(
        &mut self,
        layout: &ScanLayout,
        interval_secs: f64,
    ) -> Result<Vec<u16>, AcquisitionError> {
        let start = self.frequency_at(self.elapsed);
        let rate = self.drift_rate_at(self.elapsed);

        let signals: BTreeMap<u16, Vec<f64>> = layout
            .channels
            .iter()
            .enumerate()
            .map(|(position, &channel)| {
                let phase = self.phase - position as f64 * 2.0 * PI / 3.0;
                let samples = synth::chirp(
                    start,
                    rate,
                    phase,
                    self.amplitude,
                    layout.sampling_frequency,
                    layout.samples_per_channel,
                );
                (channel, samples)
            })
            .collect();
        let raw = layout.encode(|channel, scan| signals.get(&channel).map_or(0.0, |s| s[scan]))?;

        let cycles = start * interval_secs + 0.5 * rate * interval_secs * interval_secs;
        self.phase = (self.phase + 2.0 * PI * cycles).rem_euclid(2.0 * PI);
        self.elapsed += interval_secs;
        Ok(raw)
    }
}
