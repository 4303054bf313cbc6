use crate::error::{EstimationError, EstimationResult};

/// Periods measured between crossing times of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodAnalysis {
    periods: Vec<f64>,
}

impl PeriodAnalysis {
    /// Build periods from ordered crossing times.
    ///
    /// `stride` is the number of crossings per period: 1 when a single
    /// transition direction is detected, 2 when both are.
    pub fn from_crossing_times(times: &[f64], stride: usize) -> Self {
        let stride = stride.max(1);
        let periods = times
            .windows(stride + 1)
            .map(|w| w[stride] - w[0])
            .collect();
        Self { periods }
    }

    pub fn periods(&self) -> &[f64] {
        &self.periods
    }

    /// Mean of the per-period frequencies `1/period`.
    pub fn average_frequency(&self) -> EstimationResult<f64> {
        if self.periods.is_empty() {
            return Err(EstimationError::InsufficientPeriods {
                found: 0,
                needed: 1,
            });
        }
        let sum: f64 = self.periods.iter().map(|p| p.recip()).sum();
        Ok(sum / self.periods.len() as f64)
    }

    /// Frequency of the first period minus frequency of the last.
    ///
    /// Only the two end periods are used; the middle of the window does not
    /// contribute.
    pub fn rocof(&self) -> EstimationResult<f64> {
        match self.periods.as_slice() {
            [first, .., last] => Ok(first.recip() - last.recip()),
            _ => Err(EstimationError::InsufficientPeriods {
                found: self.periods.len(),
                needed: 2,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_periods_from_times() {
        let analysis = PeriodAnalysis::from_crossing_times(&[0.0, 0.02, 0.041, 0.06], 1);
        let periods = analysis.periods();
        assert_eq!(periods.len(), 3);
        assert!((periods[0] - 0.02).abs() < 1e-12);
        assert!((periods[1] - 0.021).abs() < 1e-12);
        assert!((periods[2] - 0.019).abs() < 1e-12);
    }

    #[test]
    fn test_average_frequency_is_mean_of_reciprocals() {
        let analysis = PeriodAnalysis::from_crossing_times(&[0.0, 0.02, 0.045], 1);
        let expected = (50.0 + 40.0) / 2.0;
        assert!((analysis.average_frequency().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rocof_uses_end_periods() {
        // 50 Hz, 45 Hz (ignored), 40 Hz
        let t2 = 0.02 + 1.0 / 45.0;
        let analysis = PeriodAnalysis::from_crossing_times(&[0.0, 0.02, t2, t2 + 0.025], 1);
        assert!((analysis.rocof().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_period_has_frequency_but_no_rocof() {
        let analysis = PeriodAnalysis::from_crossing_times(&[0.1, 0.12], 1);
        assert!((analysis.average_frequency().unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(
            analysis.rocof(),
            Err(EstimationError::InsufficientPeriods { found: 1, needed: 2 })
        );
    }

    #[test]
    fn test_no_periods() {
        let analysis = PeriodAnalysis::from_crossing_times(&[0.1], 1);
        assert!(analysis.periods().is_empty());
        assert_eq!(
            analysis.average_frequency(),
            Err(EstimationError::InsufficientPeriods { found: 0, needed: 1 })
        );
        assert_eq!(
            analysis.rocof(),
            Err(EstimationError::InsufficientPeriods { found: 0, needed: 2 })
        );
    }

    #[test]
    fn test_stride_two_spans_full_periods() {
        // Alternating crossings every half period of a 50 Hz signal.
        let times: Vec<f64> = (0..5).map(|k| k as f64 * 0.01).collect();
        let analysis = PeriodAnalysis::from_crossing_times(&times, 2);
        assert_eq!(analysis.periods().len(), 3);
        assert!(analysis.periods().iter().all(|p| (p - 0.02).abs() < 1e-12));
        assert!((analysis.average_frequency().unwrap() - 50.0).abs() < 1e-9);
    }
}
