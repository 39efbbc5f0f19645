//! Signal processing module - windowing, FFT averaging and time-domain filters

mod averaging;
mod fft;
mod frequency_domain;
mod spectrum;
mod time_domain;
mod window;

pub use averaging::{AccumulationStatus, SpectrumAccumulator};
pub use fft::SpectrumCalculator;
pub use frequency_domain::{FrequencyAnalyzer, FrequencySettings, SpectrumResult};
pub use spectrum::{bin_frequency, find_peak, rescale, subrange_peaks, usable_bins};
pub use time_domain::{
    AxisMetrics, DcBlocker, FastRms, PeakHold, TimeDomainAnalyzer, TimeDomainSettings,
    TrapezoidIntegrator,
};
pub use window::{build_window, WindowTable};

use thiserror::Error;

/// Errors in signal processing
///
/// Every variant is local and recoverable: configuration faults reject the
/// new setting, data faults mean "skip this cycle and retry on the next tick".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Window of {requested} samples exceeds buffer capacity {capacity}")]
    WindowExceedsCapacity { requested: usize, capacity: usize },

    #[error("Invalid buffer capacity: {0}")]
    InvalidCapacity(usize),

    #[error("Buffer index {index} out of range for capacity {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid FFT size {0}: must be a power of two between {min} and {max}", min = crate::config::defaults::FFT_SIZE_MIN, max = crate::config::defaults::FFT_SIZE_MAX)]
    InvalidFftSize(usize),

    #[error("Window needs at least 2 points, got {0}")]
    WindowTooShort(usize),

    #[error("Invalid sub-range count {count} for {bins} usable bins")]
    InvalidSubrangeCount { count: usize, bins: usize },

    #[error("Invalid averaging count: {0}")]
    InvalidAveragingCount(u16),

    #[error("Invalid sampling rate: {0} Hz")]
    InvalidSamplingRate(f32),

    #[error("Invalid RMS time constant: {0} ms")]
    InvalidTimeConstant(f32),

    #[error("Invalid FFT overlap: {0}%")]
    InvalidOverlap(u8),

    #[error("Invalid filter constant {name} = {value}")]
    InvalidFilterConstant { name: &'static str, value: f32 },

    #[error("Cannot reconfigure while acquisition is running")]
    AcquisitionRunning,
}

impl ProcessingError {
    /// True for faults in the requested configuration (as opposed to data
    /// availability faults that resolve themselves on a later tick).
    pub const fn is_configuration(&self) -> bool {
        !matches!(
            self,
            Self::InsufficientData { .. }
                | Self::IndexOutOfRange { .. }
                | Self::LengthMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(!ProcessingError::InsufficientData { needed: 4, available: 1 }.is_configuration());
        assert!(ProcessingError::InvalidSamplingRate(0.0).is_configuration());
        assert!(ProcessingError::InvalidFftSize(100).is_configuration());
    }

    #[test]
    fn test_fft_size_message_names_bounds() {
        let msg = ProcessingError::InvalidFftSize(100).to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("2048"));
    }
}
