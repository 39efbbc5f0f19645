//! Sample processing loop shared across all input modes.
//!
//! Pulls events from a [`SampleSource`], keeps the engine's ODR in step with
//! the measured or announced rate, feeds samples to the engine and hands
//! every completed report to a [`ReportSink`].

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::source::{SampleEvent, SampleSource, TimedSample};
use crate::acquisition::OdrMeter;
use crate::config::defaults::PROGRESS_LOG_INTERVAL_SAMPLES;
use crate::engine::MotionSpEngine;
use crate::types::VibrationReport;

// ============================================================================
// Report Sinks
// ============================================================================

/// Destination of completed reports.
pub trait ReportSink: Send {
    fn emit(&mut self, report: &VibrationReport) -> Result<()>;
}

/// Collects reports in memory.
impl ReportSink for Vec<VibrationReport> {
    fn emit(&mut self, report: &VibrationReport) -> Result<()> {
        self.push(report.clone());
        Ok(())
    }
}

/// Writes one JSON object per report and flushes after each line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ReportSink for JsonLinesSink<W> {
    fn emit(&mut self, report: &VibrationReport) -> Result<()> {
        serde_json::to_writer(&mut self.writer, report).context("Failed to serialize report")?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Loop Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LoopStats {
    pub samples_processed: u64,
    pub reports_emitted: u64,
    pub odr_updates: u64,
    pub rejected_odr_updates: u64,
    pub skipped_cycles: u64,
    pub final_odr_hz: f32,
}

// ============================================================================
// Processing Loop
// ============================================================================

/// Owns the engine and the per-stream bookkeeping around it.
///
/// Built with [`new()`](ProcessingLoop::new), optionally enriched with
/// [`with_odr_measurement()`](ProcessingLoop::with_odr_measurement) and
/// [`with_display_units()`](ProcessingLoop::with_display_units), then consumed
/// by [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop<K: ReportSink> {
    engine: MotionSpEngine,
    sink: K,
    cancel_token: CancellationToken,
    odr_meter: Option<OdrMeter>,
    display_units: bool,
    /// Clock for samples without a sensor timestamp (ms, fractional)
    synthetic_clock_ms: f64,
}

impl<K: ReportSink> ProcessingLoop<K> {
    pub fn new(engine: MotionSpEngine, sink: K, cancel_token: CancellationToken) -> Self {
        Self {
            engine,
            sink,
            cancel_token,
            odr_meter: None,
            display_units: false,
            synthetic_clock_ms: 0.0,
        }
    }

    /// Re-estimate the ODR from sample timestamps over `window` samples.
    pub fn with_odr_measurement(mut self, window: usize) -> Self {
        self.odr_meter = Some(OdrMeter::new(window));
        self
    }

    /// Emit spectra scaled by the display factor.
    pub const fn with_display_units(mut self, enabled: bool) -> Self {
        self.display_units = enabled;
        self
    }

    /// Run until the source is exhausted or cancellation.
    ///
    /// Returns final statistics together with the engine and sink.
    pub async fn run<S: SampleSource>(
        mut self,
        source: &mut S,
    ) -> Result<(LoopStats, MotionSpEngine, K)> {
        let mut stats = LoopStats::default();

        info!(source = source.source_name(), "Processing accelerometer samples");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("[ProcessingLoop] Shutdown signal received");
                    break;
                }
                result = source.next_event() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!(error = %e, "[ProcessingLoop] Source error");
                            break;
                        }
                    }
                }
            };

            match event {
                SampleEvent::Sample(timed) => {
                    self.handle_sample(timed, &mut stats)?;
                }
                SampleEvent::OdrUpdate(hz) => self.apply_odr(hz, &mut stats),
                SampleEvent::Eof => {
                    info!(
                        samples = stats.samples_processed,
                        "[ProcessingLoop] Source reached end"
                    );
                    break;
                }
            }
        }

        self.engine.stop();
        stats.skipped_cycles = self.engine.skipped_cycles();
        stats.final_odr_hz = self.engine.odr().frequency_hz();

        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("FINAL STATISTICS");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("   Samples Processed:   {}", stats.samples_processed);
        info!("   Reports Emitted:     {}", stats.reports_emitted);
        info!("   ODR Updates:         {}", stats.odr_updates);
        info!("   Skipped FFT Cycles:  {}", stats.skipped_cycles);
        info!("   Final ODR:           {:.1} Hz", stats.final_odr_hz);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        Ok((stats, self.engine, self.sink))
    }

    fn handle_sample(&mut self, timed: TimedSample, stats: &mut LoopStats) -> Result<()> {
        let now_ms = match timed.timestamp_ms {
            Some(t) => {
                if let Some(hz) = self.odr_meter.as_mut().and_then(|m| m.tick(t)) {
                    self.apply_odr(hz, stats);
                }
                t
            }
            None => {
                let t = self.synthetic_clock_ms;
                self.synthetic_clock_ms += 1000.0 / f64::from(self.engine.odr().frequency_hz());
                t as u64
            }
        };

        let report = self
            .engine
            .push_sample(timed.sample, now_ms)
            .context("Engine rejected sample")?;
        stats.samples_processed += 1;

        if let Some(report) = report {
            stats.reports_emitted += 1;
            log_report(&report);
            let outbound = if self.display_units {
                report.to_display_units()
            } else {
                report
            };
            self.sink.emit(&outbound)?;
        }

        if stats.samples_processed % PROGRESS_LOG_INTERVAL_SAMPLES == 0 {
            info!(
                samples = stats.samples_processed,
                reports = stats.reports_emitted,
                odr_hz = self.engine.odr().frequency_hz(),
                "Progress"
            );
        }
        Ok(())
    }

    fn apply_odr(&mut self, hz: f32, stats: &mut LoopStats) {
        match self.engine.set_odr(hz) {
            Ok(()) => stats.odr_updates += 1,
            Err(e) => {
                stats.rejected_odr_updates += 1;
                warn!(odr_hz = hz, error = %e, "ODR update rejected");
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Log a report summary to tracing output.
fn log_report(report: &VibrationReport) {
    info!(
        sequence = report.sequence,
        spectra = report.axes.x.spectra_averaged,
        odr_hz = report.odr_hz,
        "Report #{}: peaks X {:.1} Hz | Y {:.1} Hz | Z {:.1} Hz",
        report.sequence,
        report.axes.x.peak_frequency_hz,
        report.axes.y.peak_frequency_hz,
        report.axes.z.peak_frequency_hz,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::pipeline::source::ReplaySource;
    use crate::types::{AveragingPolicy, Sample3};

    fn engine(fft_size: usize) -> MotionSpEngine {
        let mut config = EngineConfig::default();
        config.fft.size = fft_size;
        config.fft.averaging = AveragingPolicy::Count { spectra: 1 };
        config.acquisition.odr_hz = 100.0;
        MotionSpEngine::new(config).unwrap()
    }

    fn samples(n: usize, period_ms: u64) -> Vec<SampleEvent> {
        (0..n)
            .map(|i| {
                SampleEvent::Sample(TimedSample {
                    timestamp_ms: Some(i as u64 * period_ms),
                    sample: Sample3::new((i as f32 * 0.7).sin(), 0.0, 0.0),
                })
            })
            .collect()
    }

    #[test]
    fn test_loop_emits_one_report_per_lap() {
        let mut source = ReplaySource::new(samples(64, 10), 0);
        let pipeline = ProcessingLoop::new(engine(16), Vec::new(), CancellationToken::new());
        let (stats, _, reports) = tokio_test::block_on(pipeline.run(&mut source)).unwrap();
        assert_eq!(stats.samples_processed, 64);
        assert_eq!(stats.reports_emitted, 4);
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[3].sequence, 4);
    }

    #[test]
    fn test_measured_odr_reaches_engine() {
        // Timestamps every 5 ms => 200 Hz against a nominal 100 Hz
        let mut source = ReplaySource::new(samples(40, 5), 0);
        let pipeline = ProcessingLoop::new(engine(16), Vec::new(), CancellationToken::new())
            .with_odr_measurement(10);
        let (stats, engine, _) = tokio_test::block_on(pipeline.run(&mut source)).unwrap();
        assert!(stats.odr_updates >= 1);
        assert!((engine.odr().frequency_hz() - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_bad_odr_announcement_is_counted_not_fatal() {
        let mut events = vec![SampleEvent::OdrUpdate(-5.0)];
        events.extend(samples(16, 10));
        let mut source = ReplaySource::new(events, 0);
        let pipeline = ProcessingLoop::new(engine(16), Vec::new(), CancellationToken::new());
        let (stats, _, reports) = tokio_test::block_on(pipeline.run(&mut source)).unwrap();
        assert_eq!(stats.rejected_odr_updates, 1);
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_cancelled_loop_stops_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let mut source = ReplaySource::new(samples(64, 10), 0);
        let pipeline = ProcessingLoop::new(engine(16), Vec::new(), token);
        let (stats, _, _) = tokio_test::block_on(pipeline.run(&mut source)).unwrap();
        assert_eq!(stats.samples_processed, 0);
    }

    #[test]
    fn test_json_lines_sink_writes_display_units() {
        let mut source = ReplaySource::new(samples(16, 10), 0);
        let pipeline = ProcessingLoop::new(
            engine(16),
            JsonLinesSink::new(Vec::<u8>::new()),
            CancellationToken::new(),
        )
        .with_display_units(true);
        let (_, engine, sink) = tokio_test::block_on(pipeline.run(&mut source)).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
        let parsed: VibrationReport = serde_json::from_str(text.trim()).unwrap();
        let raw = engine.last_report().unwrap();
        assert!((parsed.axes.x.peak.value - raw.axes.x.peak.value * 1000.0).abs() < 1e-2);
    }
}
