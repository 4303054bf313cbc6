use serde::{Deserialize, Serialize};

use crate::dsp::zero_crossing::CrossingDirection;

/// Tunables for one estimation pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Which zero-crossing transitions time the periods.
    pub crossing_direction: CrossingDirection,
    /// Estimate channels on the rayon pool instead of one after another.
    pub parallel: bool,
}
