pub mod fft;
pub mod period;
pub mod zero_crossing;
