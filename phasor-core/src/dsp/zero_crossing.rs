use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, EstimationResult};

/// Which zero-crossing transitions the detector reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingDirection {
    /// Non-negative sample followed by a negative one.
    #[default]
    RisingToFalling,
    /// Negative sample followed by a non-negative one.
    FallingToRising,
    /// Either transition; consecutive crossings are half a period apart.
    Both,
}

impl CrossingDirection {
    /// Number of consecutive crossings that make up one full period.
    pub fn stride(self) -> usize {
        match self {
            CrossingDirection::Both => 2,
            _ => 1,
        }
    }

    fn accepts(self, edge: Edge) -> bool {
        match self {
            CrossingDirection::RisingToFalling => edge == Edge::Falling,
            CrossingDirection::FallingToRising => edge == Edge::Rising,
            CrossingDirection::Both => true,
        }
    }
}

/// Sign transition observed between two consecutive samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Falling,
    Rising,
}

impl Edge {
    fn between(previous: f64, current: f64) -> Option<Edge> {
        if previous >= 0.0 && current < 0.0 {
            Some(Edge::Falling)
        } else if previous < 0.0 && current >= 0.0 {
            Some(Edge::Rising)
        } else {
            None
        }
    }
}

/// A detected zero crossing between `samples[index - 1]` and `samples[index]`.
///
/// Only [`zero_crossings`] creates these, so `index` is always at least 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZeroCrossing {
    index: usize,
    edge: Edge,
}

impl ZeroCrossing {
    /// Index of the first sample past the crossing.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// Linear-interpolation offsets of this crossing inside its sample interval.
    pub fn offset(&self, samples: &[f64], sample_period: f64) -> EstimationResult<CrossingOffset> {
        let degenerate = EstimationError::DegenerateInterpolation { index: self.index };
        let s1 = self
            .index
            .checked_sub(1)
            .and_then(|i| samples.get(i))
            .ok_or_else(|| degenerate.clone())?;
        let s2 = samples.get(self.index).ok_or_else(|| degenerate.clone())?;
        crossing_offset(*s1, *s2, sample_period).ok_or(degenerate)
    }

    /// Interpolated crossing time in seconds from the first sample.
    pub fn time(&self, samples: &[f64], sample_period: f64) -> EstimationResult<f64> {
        let offset = self.offset(samples, sample_period)?;
        Ok(self.index as f64 * sample_period - offset.after)
    }
}

/// Position of a zero crossing within one sample interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossingOffset {
    /// Time from the sample before the crossing to the crossing.
    pub before: f64,
    /// Time from the crossing to the sample after it.
    pub after: f64,
}

/// Locate zero crossings in one channel.
///
/// The first sample has no predecessor and is never reported, even when it
/// is already negative. NaN samples never form a crossing.
pub fn zero_crossings(samples: &[f64], direction: CrossingDirection) -> Vec<ZeroCrossing> {
    let mut crossings = Vec::new();
    let mut previous: Option<f64> = None;

    for (index, &current) in samples.iter().enumerate() {
        if let Some(edge) = previous.and_then(|prev| Edge::between(prev, current)) {
            if direction.accepts(edge) {
                crossings.push(ZeroCrossing { index, edge });
            }
        }
        previous = Some(current);
    }

    crossings
}

/// Interpolate where the straight line through `s1` and `s2` crosses zero.
///
/// `after = s2·Ts / (s2 − s1)`, `before = Ts − after`. Returns `None` when
/// the samples are equal or the result is not finite.
pub fn crossing_offset(s1: f64, s2: f64, sample_period: f64) -> Option<CrossingOffset> {
    let denominator = s2 - s1;
    if denominator == 0.0 {
        return None;
    }
    let after = s2 * sample_period / denominator;
    if !after.is_finite() {
        return None;
    }
    Some(CrossingOffset {
        before: sample_period - after,
        after,
    })
}

/// Interpolated times of all `crossings`, in order.
pub fn crossing_times(
    samples: &[f64],
    crossings: &[ZeroCrossing],
    sample_period: f64,
) -> EstimationResult<Vec<f64>> {
    crossings
        .iter()
        .map(|c| c.time(samples, sample_period))
        .collect()
}
