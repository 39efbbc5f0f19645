//! System-wide default constants.
//!
//! Centralises the numeric constants of the vibration pipeline.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// FFT
// ============================================================================

/// Largest supported FFT size (samples).
///
/// Bounds every per-axis buffer, so it is also the memory budget knob for
/// embedded targets.
pub const FFT_SIZE_MAX: usize = 2048;

/// Smallest FFT size accepted by configuration validation.
pub const FFT_SIZE_MIN: usize = 16;

/// Default FFT size.
pub const FFT_SIZE_DEFAULT: usize = 1024;

/// Accepted FFT overlap range when overlap is enabled (percent).
pub const FFT_OVERLAP_MIN_PERCENT: u8 = 5;
pub const FFT_OVERLAP_MAX_PERCENT: u8 = 70;

/// Spectra per report when count-based averaging is selected without a count.
pub const AVERAGING_SPECTRA_DEFAULT: u16 = 8;

// ============================================================================
// Sub-range Analysis
// ============================================================================

/// Sub-range count for `--subranges` given without a value.
pub const SUBRANGE_DEFAULT: usize = 8;

/// Maximum number of sub-ranges.
pub const SUBRANGE_MAX: usize = 64;

// ============================================================================
// Time Domain
// ============================================================================

/// RMS averaging time constant (ms).
pub const TAU_DEFAULT_MS: f32 = 50.0;

/// Smoothing constant of the first-order DC-removal high-pass.
pub const DC_SMOOTH: f32 = 0.975;

/// Blend between previous and current sample in velocity integration.
///
/// 0.5 is the true trapezoidal rule.
pub const INTEGRATION_GAMMA: f32 = 0.5;

// ============================================================================
// Acquisition
// ============================================================================

/// Total acquisition time of one averaging window (ms).
pub const ACQUISITION_TIME_DEFAULT_MS: u64 = 5_000;

/// Nominal output data rate used until a measured ODR is available (Hz).
pub const ODR_DEFAULT_HZ: f32 = 417.0;

/// Number of samples timed for one ODR measurement.
pub const ODR_MEASUREMENT_SAMPLES: usize = 150;

/// Standard gravity (m/s²), for milli-g conversion.
pub const STANDARD_GRAVITY: f32 = 9.806_65;

// ============================================================================
// Output
// ============================================================================

/// Multiplier applied to spectral magnitudes in display units.
pub const DISPLAY_SCALE: f32 = 1000.0;

/// Progress log interval of the processing loop (samples).
pub const PROGRESS_LOG_INTERVAL_SAMPLES: u64 = 10_000;
