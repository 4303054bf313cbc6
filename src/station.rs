//! Station configuration file.

use std::path::Path;

use phasor_core::EstimatorConfig;
use serde::{Deserialize, Serialize};

use crate::acquisition::{AcquisitionError, ScanLayout};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid station config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scan layout: {0}")]
    Scan(#[from] AcquisitionError),
}

/// Everything a measurement station needs besides its samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub name: String,
    pub scan: ScanLayout,
    pub estimator: EstimatorConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: "Station A".to_string(),
            scan: ScanLayout::default(),
            estimator: EstimatorConfig::default(),
        }
    }
}

impl StationConfig {
    /// Parse and validate a JSON station config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: StationConfig = serde_json::from_str(text)?;
        config.scan.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::info!("loaded station config {:?} from {}", config.name, path.display());
        Ok(config)
    }
}
