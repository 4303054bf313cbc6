//! Synchrophasor estimation from one capture of equally spaced samples.
//!
//! Per channel: negative-going zero crossings are located and timed to a
//! fraction of a sample, periods give the average frequency and ROCOF, and a
//! DFT over a window holding a whole number of cycles yields the
//! fundamental's amplitude and phase, referenced to the first interpolated
//! crossing.
//!
//! Estimation is a pure function of the [`Capture`]; channels are
//! independent and a failing channel never affects the others.

pub mod config;
pub mod dsp;
pub mod error;
pub mod estimator;
pub mod synth;
pub mod types;

pub use config::EstimatorConfig;
pub use dsp::zero_crossing::CrossingDirection;
pub use error::{CaptureError, EstimationError};
pub use estimator::{estimate_channel, estimate_phasors};
pub use types::{Capture, ChannelEstimate, ChannelId, EstimationReport};
