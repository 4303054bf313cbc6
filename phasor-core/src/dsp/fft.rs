use realfft::num_complex::Complex64;
use realfft::RealFftPlanner;
use std::cell::RefCell;
use std::f64::consts::PI;

use crate::error::{EstimationError, EstimationResult};

thread_local! {
    static FFT_PLANNER: RefCell<RealFftPlanner<f64>> = RefCell::new(RealFftPlanner::new());
}

/// Analysis window spanning a whole number of fundamental periods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisWindow {
    start: usize,
    samples_per_period: usize,
    periods_taken: usize,
}

impl AnalysisWindow {
    /// Pick the longest integer-period window starting one sample before the
    /// first crossing and ending no later than the last one.
    ///
    /// Both ends then sit within one sample of a zero crossing, which keeps
    /// the fundamental's energy in a single bin.
    pub fn select(
        first_crossing: usize,
        last_crossing: usize,
        sampling_frequency: f64,
        avg_frequency: f64,
    ) -> EstimationResult<Self> {
        let start = first_crossing.saturating_sub(1);
        let span = last_crossing.saturating_sub(start);

        let samples_per_period = (sampling_frequency / avg_frequency).round();
        if !samples_per_period.is_finite() || samples_per_period < 1.0 {
            return Err(EstimationError::EmptyWindow {
                span,
                samples_per_period: 0,
            });
        }
        let samples_per_period = samples_per_period as usize;

        let periods_taken = span / samples_per_period;
        if periods_taken == 0 {
            return Err(EstimationError::EmptyWindow {
                span,
                samples_per_period,
            });
        }

        Ok(Self {
            start,
            samples_per_period,
            periods_taken,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.periods_taken * self.samples_per_period
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples_per_period(&self) -> usize {
        self.samples_per_period
    }

    pub fn periods_taken(&self) -> usize {
        self.periods_taken
    }

    fn slice<'a>(&self, samples: &'a [f64]) -> Option<&'a [f64]> {
        samples.get(self.start..self.start + self.len())
    }
}

/// Full DFT of one analysis window plus the selected fundamental bin.
#[derive(Clone, Debug)]
pub struct WindowedSpectrum {
    bins: Vec<Complex64>,
    frequencies: Vec<f64>,
    fundamental: usize,
}

impl WindowedSpectrum {
    /// Transform `window` of `samples` and locate the bin nearest
    /// `avg_frequency`.
    ///
    /// The bin index is `round(L · Ts · avg_frequency)`; the spectrum is not
    /// searched for a peak.
    pub fn compute(
        samples: &[f64],
        window: AnalysisWindow,
        sampling_frequency: f64,
        avg_frequency: f64,
    ) -> EstimationResult<Self> {
        if window.is_empty() {
            return Err(EstimationError::EmptyWindow {
                span: 0,
                samples_per_period: window.samples_per_period,
            });
        }
        let windowed = window.slice(samples).ok_or(EstimationError::EmptyWindow {
            span: samples.len().saturating_sub(window.start),
            samples_per_period: window.samples_per_period,
        })?;
        let length = windowed.len();

        let sample_period = 1.0 / sampling_frequency;
        let fundamental = (length as f64 * sample_period * avg_frequency).round();
        if !fundamental.is_finite() || fundamental < 0.0 || fundamental >= length as f64 {
            return Err(EstimationError::FundamentalOutOfRange {
                bin: if fundamental.is_finite() && fundamental > 0.0 {
                    fundamental as usize
                } else {
                    0
                },
                length,
            });
        }

        Ok(Self {
            bins: full_spectrum(windowed)?,
            frequencies: fft_frequencies(length, sampling_frequency),
            fundamental: fundamental as usize,
        })
    }

    /// Rotate every bin so phases refer to `reference_time` (seconds from the
    /// first capture sample) instead of the sample grid.
    pub fn phase_corrected(mut self, reference_time: f64) -> Self {
        let shift = 2.0 * PI * self.fundamental_frequency() * reference_time;
        let rotation = Complex64::from_polar(1.0, -shift);
        for bin in &mut self.bins {
            *bin *= rotation;
        }
        self
    }

    pub fn bins(&self) -> &[Complex64] {
        &self.bins
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn fundamental_bin(&self) -> usize {
        self.fundamental
    }

    pub fn fundamental_frequency(&self) -> f64 {
        self.frequencies[self.fundamental]
    }

    pub fn fundamental_phasor(&self) -> Complex64 {
        self.bins[self.fundamental]
    }

    /// Peak amplitude of the fundamental: `2·|X| / L`.
    pub fn fundamental_amplitude(&self) -> f64 {
        2.0 * self.fundamental_phasor().norm() / self.bins.len() as f64
    }
}

/// Complex DFT of a real signal, all `len` bins.
///
/// The real FFT yields bins `0..=len/2`; the rest follow from Hermitian
/// symmetry `X[len - k] = conj(X[k])`.
pub fn full_spectrum(signal: &[f64]) -> EstimationResult<Vec<Complex64>> {
    let len = signal.len();
    if len == 0 {
        return Ok(Vec::new());
    }

    let fft = FFT_PLANNER.with(|p| p.borrow_mut().plan_fft_forward(len));
    let mut input = fft.make_input_vec();
    input.copy_from_slice(signal);
    let mut half = fft.make_output_vec();
    fft.process(&mut input, &mut half)?;

    let mut spectrum = Vec::with_capacity(len);
    spectrum.extend_from_slice(&half);
    for k in half.len()..len {
        spectrum.push(half[len - k].conj());
    }
    Ok(spectrum)
}

/// Frequency of each DFT bin: `k·Fs/L` up to `L/2`, negative beyond.
pub fn fft_frequencies(len: usize, sampling_frequency: f64) -> Vec<f64> {
    let resolution = sampling_frequency / len as f64;
    (0..len)
        .map(|k| {
            if k <= len / 2 {
                k as f64 * resolution
            } else {
                (k as f64 - len as f64) * resolution
            }
        })
        .collect()
}
