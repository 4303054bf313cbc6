use rayon::prelude::*;
use std::f64::consts::PI;

use crate::config::EstimatorConfig;
use crate::dsp::fft::{AnalysisWindow, WindowedSpectrum};
use crate::dsp::period::PeriodAnalysis;
use crate::dsp::zero_crossing::{crossing_times, zero_crossings};
use crate::error::{EstimationError, EstimationResult};
use crate::types::{Capture, ChannelEstimate, ChannelId, EstimationReport};

/// Estimate the synchrophasor of one channel.
///
/// Steps: zero crossings, interpolated crossing times, periods, average
/// frequency and ROCOF, then the integer-period windowed DFT with the
/// fundamental's phase referenced to the first interpolated crossing.
/// A channel holding any NaN or infinite sample fails up front.
pub fn estimate_channel(
    samples: &[f64],
    sampling_frequency: f64,
    config: &EstimatorConfig,
) -> EstimationResult<ChannelEstimate> {
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(EstimationError::NonFiniteSample { index });
    }

    let sample_period = 1.0 / sampling_frequency;
    let stride = config.crossing_direction.stride();

    let crossings = zero_crossings(samples, config.crossing_direction);
    let (first, last) = match crossings.as_slice() {
        [first, .., last] if crossings.len() > stride => (*first, *last),
        _ => {
            return Err(EstimationError::InsufficientCrossings {
                found: crossings.len(),
                needed: stride + 1,
            })
        }
    };

    let times = crossing_times(samples, &crossings, sample_period)?;
    let periods = PeriodAnalysis::from_crossing_times(&times, stride);
    let avg_frequency = periods.average_frequency()?;
    let rocof = match periods.rocof() {
        Ok(rocof) => Some(rocof),
        Err(err) => {
            log::debug!("no ROCOF: {err}");
            None
        }
    };

    let first_offset = first.offset(samples, sample_period)?;
    let window = AnalysisWindow::select(first.index(), last.index(), sampling_frequency, avg_frequency)?;
    log::debug!(
        "window start {} length {} ({} x {} samples)",
        window.start(),
        window.len(),
        window.periods_taken(),
        window.samples_per_period()
    );

    let reference_time = first.index() as f64 * sample_period - first_offset.after;
    let spectrum = WindowedSpectrum::compute(samples, window, sampling_frequency, avg_frequency)?
        .phase_corrected(reference_time);

    let phasor = spectrum.fundamental_phasor();
    let phase_rad = phasor.arg();
    let amplitude = spectrum.fundamental_amplitude();
    if !amplitude.is_finite() || !phase_rad.is_finite() {
        return Err(EstimationError::Fft {
            message: format!("non-finite fundamental {phasor}"),
        });
    }

    Ok(ChannelEstimate {
        rocof,
        avg_frequency,
        amplitude,
        phase_rad,
        phase_deg: normalized_degrees(phase_rad),
        fft_frequency: spectrum.fundamental_frequency(),
        phasor,
        crossing_count: crossings.len(),
        window_start: window.start(),
        window_length: window.len(),
        samples_per_period: window.samples_per_period(),
        periods_taken: window.periods_taken(),
    })
}

/// Estimate every channel of `capture` independently.
///
/// A failing channel is logged and recorded in
/// [`EstimationReport::failures`]; it never stops the others.
pub fn estimate_phasors(capture: &Capture, config: &EstimatorConfig) -> EstimationReport {
    let fs = capture.sampling_frequency();
    let run = |(id, samples): (&ChannelId, &Vec<f64>)| (*id, estimate_channel(samples, fs, config));

    let outcomes: Vec<(ChannelId, EstimationResult<ChannelEstimate>)> = if config.parallel {
        capture.channels().par_iter().map(run).collect()
    } else {
        capture.channels().iter().map(run).collect()
    };

    let mut report = EstimationReport::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(estimate) => {
                report.estimates.insert(id, estimate);
            }
            Err(err) => {
                log::warn!("channel {id} skipped: {err}");
                report.failures.insert(id, err);
            }
        }
    }
    report
}

/// Radians to degrees in `[0, 360)`.
pub fn normalized_degrees(phase_rad: f64) -> f64 {
    (phase_rad * 180.0 / PI + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::zero_crossing::CrossingDirection;
    use crate::synth;
    use std::collections::BTreeMap;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn wrapped_difference(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(2.0 * PI);
        d.min(2.0 * PI - d)
    }

    fn capture(fs: f64, n: usize, channels: Vec<(u16, Vec<f64>)>) -> Capture {
        let channels: BTreeMap<ChannelId, Vec<f64>> =
            channels.into_iter().map(|(id, s)| (ChannelId(id), s)).collect();
        Capture::new(fs, 50.0, n, channels).unwrap()
    }

    #[test]
    fn test_pure_cosine_recovered() {
        let samples = synth::cosine(50.0, FRAC_PI_2, 3.0, 10_000.0, 1600);
        let est = estimate_channel(&samples, 10_000.0, &EstimatorConfig::default()).unwrap();

        assert!((est.amplitude - 3.0).abs() < 3e-3, "amplitude {}", est.amplitude);
        assert!(wrapped_difference(est.phase_rad, FRAC_PI_2) < 1e-3, "phase {}", est.phase_rad);
        assert!((est.avg_frequency - 50.0).abs() < 5e-2, "frequency {}", est.avg_frequency);
        assert!(est.rocof.unwrap().abs() < 1e-6, "rocof {:?}", est.rocof);
        assert!((est.fft_frequency - 50.0).abs() < 1e-9);
        assert!((est.phase_deg - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_window_is_multiple_of_period() {
        // 50 Hz at 10 kHz for 1600 samples: 200 samples per cycle.
        let samples = synth::cosine(50.0, 0.4, 1.0, 10_000.0, 1600);
        let est = estimate_channel(&samples, 10_000.0, &EstimatorConfig::default()).unwrap();
        assert_eq!(est.samples_per_period, 200);
        assert_eq!(est.window_length % est.samples_per_period, 0);
        assert_eq!(est.window_length, est.periods_taken * est.samples_per_period);
        assert!(est.window_start + est.window_length <= samples.len());
    }

    #[test]
    fn test_phase_referenced_to_first_crossing() {
        let fs = 100_000.0;
        let ts = 1.0 / fs;
        let f = 50.0;
        for &phi in &[0.0, FRAC_PI_4, 1.0, -2.0, 3.0, PI / 3.0] {
            let samples = synth::cosine(f, phi, 2.0, fs, 10_000);
            let est = estimate_channel(&samples, fs, &EstimatorConfig::default()).unwrap();

            let first = zero_crossings(&samples, CrossingDirection::default())[0];
            let t0 = first.time(&samples, ts).unwrap();
            let grid_start = (first.index() - 1) as f64 * ts;
            let expected = phi + 2.0 * PI * f * (grid_start - t0);

            assert!(
                wrapped_difference(est.phase_rad, expected) < 1e-6,
                "phi {phi}: got {} expected {expected}",
                est.phase_rad
            );
            // Within one sample of rotation of the generating phase.
            assert!(wrapped_difference(est.phase_rad, phi) <= 2.0 * PI * f * ts + 1e-9);
            assert!((est.amplitude - 2.0).abs() < 2e-3);
        }
    }

    #[test]
    fn test_off_nominal_frequency() {
        let fs = 10_240.0;
        let samples = synth::cosine(49.95, FRAC_PI_4, 3.0, fs, 1024);
        let est = estimate_channel(&samples, fs, &EstimatorConfig::default()).unwrap();
        assert!((est.avg_frequency - 49.95).abs() < 49.95e-3);
        assert!((est.amplitude - 3.0).abs() < 3e-2, "amplitude {}", est.amplitude);
        assert_eq!(est.samples_per_period, 205);
        assert!(wrapped_difference(est.phase_rad, FRAC_PI_4) < 2.0 * PI * 50.0 / fs + 1e-2);
    }

    #[test]
    fn test_phase_deg_always_in_range() {
        let fs = 10_000.0;
        for &f in &[49.5, 50.0, 50.3, 60.0] {
            let mut phi = -7.0;
            while phi < 7.0 {
                let samples = synth::cosine(f, phi, 1.0, fs, 1600);
                let est = estimate_channel(&samples, fs, &EstimatorConfig::default()).unwrap();
                assert!(
                    (0.0..360.0).contains(&est.phase_deg),
                    "f {f} phi {phi}: {}",
                    est.phase_deg
                );
                let from_rad = (est.phase_rad * 180.0 / PI + 360.0) % 360.0;
                assert_eq!(est.phase_deg, from_rad);
                phi += 0.37;
            }
        }
    }

    #[test]
    fn test_normalized_degrees_edges() {
        assert_eq!(normalized_degrees(0.0), 0.0);
        assert!((normalized_degrees(PI) - 180.0).abs() < 1e-12);
        assert!((normalized_degrees(-FRAC_PI_2) - 270.0).abs() < 1e-12);
        let tiny = normalized_degrees(-1e-18);
        assert!((0.0..360.0).contains(&tiny));
    }

    #[test]
    fn test_two_crossings_give_frequency_without_rocof() {
        // Falling crossings at samples 1 and ~201 only.
        let samples = synth::cosine(50.0, FRAC_PI_2, 3.0, 10_000.0, 250);
        let est = estimate_channel(&samples, 10_000.0, &EstimatorConfig::default()).unwrap();
        assert_eq!(est.crossing_count, 2);
        assert!((est.avg_frequency - 50.0).abs() < 1e-3);
        assert_eq!(est.rocof, None);
        assert_eq!(est.periods_taken, 1);
        assert!((est.amplitude - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_single_crossing_is_insufficient() {
        let samples = synth::cosine(50.0, FRAC_PI_2, 3.0, 10_000.0, 150);
        assert_eq!(
            estimate_channel(&samples, 10_000.0, &EstimatorConfig::default()),
            Err(EstimationError::InsufficientCrossings { found: 1, needed: 2 })
        );
    }

    #[test]
    fn test_degenerate_crossing_fails_channel() {
        // With Ts = 10 s the interpolation overflows to inf / inf.
        let samples = [1e308, -1e308, 1.0, -1.0, 1.0, -1.0];
        assert_eq!(
            estimate_channel(&samples, 0.1, &EstimatorConfig::default()),
            Err(EstimationError::DegenerateInterpolation { index: 1 })
        );
    }

    #[test]
    fn test_rocof_on_linear_ramp() {
        let fs = 10_000.0;
        let rate = 0.5;
        let samples = synth::chirp(50.0, rate, 0.0, 1.0, fs, 10_000);
        let est = estimate_channel(&samples, fs, &EstimatorConfig::default()).unwrap();

        let crossings = zero_crossings(&samples, CrossingDirection::default());
        let times = crossing_times(&samples, &crossings, 1.0 / fs).unwrap();
        let n = times.len();
        let first_mid = (times[0] + times[1]) / 2.0;
        let last_mid = (times[n - 2] + times[n - 1]) / 2.0;
        let expected = -rate * (last_mid - first_mid);

        let rocof = est.rocof.unwrap();
        assert!((rocof - expected).abs() < 1e-4, "rocof {rocof} expected {expected}");
        // Over a one-second capture the magnitude tracks the ramp rate.
        assert!((rocof.abs() - rate).abs() < 0.1 * rate);
        assert!(est.avg_frequency > 50.0 && est.avg_frequency < 50.5);
    }

    #[test]
    fn test_both_directions() {
        let config = EstimatorConfig {
            crossing_direction: CrossingDirection::Both,
            ..Default::default()
        };
        let samples = synth::cosine(50.0, FRAC_PI_2, 3.0, 10_000.0, 1600);
        let est = estimate_channel(&samples, 10_000.0, &config).unwrap();
        assert!(est.crossing_count >= 15);
        assert!((est.avg_frequency - 50.0).abs() < 1e-3);
        assert!((est.amplitude - 3.0).abs() < 3e-3);
        assert!(wrapped_difference(est.phase_rad, FRAC_PI_2) < 1e-3);

        let short = synth::cosine(50.0, FRAC_PI_2, 3.0, 10_000.0, 150);
        assert_eq!(
            estimate_channel(&short, 10_000.0, &config),
            Err(EstimationError::InsufficientCrossings { found: 2, needed: 3 })
        );
    }

    #[test]
    fn test_channel_isolation() {
        let cap = capture(
            10_000.0,
            1600,
            vec![
                (1, vec![0.0; 1600]),
                (2, synth::cosine(50.0, 0.2, 1.0, 10_000.0, 1600)),
            ],
        );
        let report = estimate_phasors(&cap, &EstimatorConfig::default());
        assert_eq!(report.estimates.keys().copied().collect::<Vec<_>>(), vec![ChannelId(2)]);
        assert_eq!(
            report.failure(ChannelId(1)),
            Some(&EstimationError::InsufficientCrossings { found: 0, needed: 2 })
        );
        assert!(!report.is_complete());
    }

    #[test]
    fn test_non_finite_sample_fails_only_its_channel() {
        let mut corrupt = synth::cosine(50.0, 0.3, 1.0, 10_000.0, 1600);
        corrupt[700] = f64::NAN;
        let mut infinite = synth::cosine(50.0, 0.3, 1.0, 10_000.0, 1600);
        infinite[0] = f64::INFINITY;
        let cap = capture(
            10_000.0,
            1600,
            vec![
                (1, corrupt),
                (2, synth::cosine(50.0, 0.3, 1.0, 10_000.0, 1600)),
                (3, infinite),
            ],
        );
        let report = estimate_phasors(&cap, &EstimatorConfig::default());

        assert_eq!(report.estimate(ChannelId(1)), None);
        assert_eq!(
            report.failure(ChannelId(1)),
            Some(&EstimationError::NonFiniteSample { index: 700 })
        );
        assert_eq!(
            report.failure(ChannelId(3)),
            Some(&EstimationError::NonFiniteSample { index: 0 })
        );
        let healthy = report.estimate(ChannelId(2)).unwrap();
        assert!((0.0..360.0).contains(&healthy.phase_deg));
        assert!((healthy.amplitude - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_deterministic_and_parallel_agree() {
        let fs = 10_240.0;
        let freqs = [49.95, 50.02, 50.01, 50.03, 49.98, 49.97, 49.99, 50.05];
        let channels = freqs
            .iter()
            .enumerate()
            .map(|(i, &f)| (i as u16 + 1, synth::cosine(f, FRAC_PI_4, 3.0, fs, 1024)))
            .collect();
        let cap = capture(fs, 1024, channels);

        let sequential = estimate_phasors(&cap, &EstimatorConfig::default());
        let again = estimate_phasors(&cap, &EstimatorConfig::default());
        let parallel = estimate_phasors(
            &cap,
            &EstimatorConfig {
                parallel: true,
                ..Default::default()
            },
        );
        assert_eq!(sequential.estimates.len(), 8);
        assert!(sequential.is_complete());
        assert_eq!(sequential, again);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_empty_capture() {
        let cap = capture(10_000.0, 0, Vec::new());
        let report = estimate_phasors(&cap, &EstimatorConfig::default());
        assert!(report.estimates.is_empty());
        assert!(report.is_complete());
    }
}
