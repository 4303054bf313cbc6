//! Synthetic test signals.

use std::f64::consts::PI;

/// `amplitude · cos(2π·frequency·t + phase)` sampled at `sampling_frequency`.
pub fn cosine(
    frequency: f64,
    phase: f64,
    amplitude: f64,
    sampling_frequency: f64,
    sample_count: usize,
) -> Vec<f64> {
    chirp(frequency, 0.0, phase, amplitude, sampling_frequency, sample_count)
}

/// Cosine whose frequency ramps linearly: `f(t) = start_frequency + rate·t`.
///
/// `rate` is in Hz/s; the phase is the integral of `2π·f(t)`.
pub fn chirp(
    start_frequency: f64,
    rate: f64,
    phase: f64,
    amplitude: f64,
    sampling_frequency: f64,
    sample_count: usize,
) -> Vec<f64> {
    (0..sample_count)
        .map(|i| {
            let t = i as f64 / sampling_frequency;
            let cycles = start_frequency * t + 0.5 * rate * t * t;
            amplitude * (2.0 * PI * cycles + phase).cos()
        })
        .collect()
}
