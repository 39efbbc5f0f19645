//! MotionSP: vibration analysis for tri-axial accelerometer streams
//!
//! Turns a stream of acceleration samples into time-domain metrics (RMS,
//! peak, integrated speed) and averaged, windowed FFT spectra with peak and
//! sub-range analysis.
//!
//! ## Architecture
//!
//! - **Acquisition**: circular sample buffer, ODR state and acquisition sequencing
//! - **Processing**: windowing, FFT, spectrum averaging and time-domain filters
//! - **Engine**: per-stream owner of all state, emits [`VibrationReport`]s
//! - **Pipeline**: async sources, processing loop and report sinks

pub mod acquisition;
pub mod config;
pub mod engine;
pub mod pipeline;
pub mod processing;
pub mod types;

// Re-export engine configuration
pub use config::{ConfigError, EngineConfig};

// Re-export the engine and its error type
pub use engine::MotionSpEngine;
pub use processing::ProcessingError;

// Re-export commonly used types
pub use types::{
    AveragingPolicy, Axis, AxisReport, DcBinPolicy, InputUnit, Sample3, SpectralPeak, TdMode,
    Triaxial, VibrationReport, WindowType,
};
