//! PMU station plumbing around `phasor-core`: turning raw converter scans
//! into captures, reducing estimates to a data-frame summary, and the
//! station configuration file.

pub mod acquisition;
pub mod frame;
pub mod station;

pub use acquisition::{AcquisitionError, ScanLayout};
pub use frame::{summarize, DataFrameSummary};
pub use station::{ConfigError, StationConfig};
