//! Processing Pipeline Module
//!
//! ```text
//! SampleSource ──► ProcessingLoop ──► MotionSpEngine ──► ReportSink
//!  (stdin/CSV)      (ODR meter,         (buffer, TD,      (JSON lines
//!                    cancellation)       FFT averaging)     or memory)
//! ```

pub mod processing_loop;
pub mod source;

pub use processing_loop::{JsonLinesSink, LoopStats, ProcessingLoop, ReportSink};
pub use source::{
    read_csv_samples, InputRecord, ReplaySource, SampleEvent, SampleSource, StdinSource,
    TimedSample,
};
