//! Vibration analysis engine
//!
//! Owns every piece of per-stream state: the circular buffer, the ODR, the
//! acquisition controller and both analyzers. One engine instance handles
//! one accelerometer stream; multiple engines never share state.
//!
//! ## Per-sample flow
//!
//! ```text
//! raw sample ─► unit conversion ─► input offset removal ─► circular buffer
//!                                                             │
//!                              time-domain filters ◄──────────┤
//!                                                             │
//!                        FFT cycle (lap complete / hop) ◄─────┘
//!                                   │
//!                       averaging complete ─► VibrationReport
//! ```

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::acquisition::{AcquisitionController, CircularBuffer, OdrState};
use crate::config::EngineConfig;
use crate::processing::{
    bin_frequency, AxisMetrics, DcBlocker, FrequencyAnalyzer, ProcessingError, SpectrumResult,
    TimeDomainAnalyzer,
};
use crate::types::{Axis, AxisReport, Sample3, Triaxial, VibrationReport};

/// Which time-domain analyzer feeds a report.
#[derive(Debug, Clone, Copy)]
enum MetricsPath {
    Live,
    Buffer,
}

pub struct MotionSpEngine {
    config: EngineConfig,
    buffer: CircularBuffer,
    odr: OdrState,
    controller: AcquisitionController,
    /// Fed one sample at a time by `push_sample`
    time_domain: TimeDomainAnalyzer,
    /// Fed from the buffer walk by `ingest_batch`
    buffer_time_domain: TimeDomainAnalyzer,
    live_reset_pending: bool,
    buffer_reset_pending: bool,
    frequency: FrequencyAnalyzer,
    input_offset: Triaxial<DcBlocker>,
    sequence: u64,
    skipped_cycles: u64,
    last_report: Option<VibrationReport>,
}

impl std::fmt::Debug for MotionSpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionSpEngine")
            .field("odr_hz", &self.odr.frequency_hz())
            .field("fft_size", &self.config.fft.size)
            .field("running", &self.controller.is_running())
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl MotionSpEngine {
    /// Build an idle engine. The buffer holds exactly one FFT window.
    pub fn new(config: EngineConfig) -> Result<Self, ProcessingError> {
        let odr = OdrState::new(config.acquisition.odr_hz, config.time_domain.tau_ms)?;
        let buffer = CircularBuffer::new(config.fft.size)?;
        let controller = AcquisitionController::new(
            config.acquisition.acquisition_time_ms,
            config.fft.size,
            config.fft.overlap_percent,
        )?;
        let time_domain = TimeDomainAnalyzer::new(config.time_domain_settings())?;
        let buffer_time_domain = time_domain.clone();
        let frequency = FrequencyAnalyzer::new(config.frequency_settings(), odr.frequency_hz())?;

        Ok(Self {
            config,
            buffer,
            odr,
            controller,
            time_domain,
            buffer_time_domain,
            live_reset_pending: false,
            buffer_reset_pending: false,
            frequency,
            input_offset: Triaxial::default(),
            sequence: 0,
            skipped_cycles: 0,
            last_report: None,
        })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn odr(&self) -> &OdrState {
        &self.odr
    }

    pub const fn buffer(&self) -> &CircularBuffer {
        &self.buffer
    }

    pub const fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Open an acquisition: clears buffered samples and any in-flight average.
    pub fn start(&mut self, now_ms: u64) {
        self.buffer.clear();
        self.frequency.reset();
        self.controller.start(now_ms);
        info!(
            odr_hz = self.odr.frequency_hz(),
            fft_size = self.config.fft.size,
            window = %self.config.fft.window,
            hop = ?self.controller.hop(),
            "Acquisition started"
        );
    }

    pub fn stop(&mut self) {
        if self.controller.is_running() {
            self.controller.stop();
            info!(reports = self.sequence, "Acquisition stopped");
        }
    }

    /// Swap in a new configuration. Rejected while an acquisition runs.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), ProcessingError> {
        if self.controller.is_running() {
            return Err(ProcessingError::AcquisitionRunning);
        }
        let mut fresh = Self::new(config)?;
        fresh.sequence = self.sequence;
        *self = fresh;
        info!(fft_size = self.config.fft.size, "Engine reconfigured");
        Ok(())
    }

    /// Apply a new (measured or announced) output data rate.
    ///
    /// On failure neither the ODR nor the usable bandwidth changes.
    pub fn set_odr(&mut self, frequency_hz: f32) -> Result<(), ProcessingError> {
        let mut odr = self.odr;
        odr.set_frequency(frequency_hz)?;
        self.frequency.set_odr(frequency_hz)?;
        self.odr = odr;
        self.config.acquisition.odr_hz = frequency_hz;
        debug!(odr_hz = frequency_hz, lambda = odr.lambda(), "ODR updated");
        Ok(())
    }

    /// Change the RMS time constant. Takes effect on the next sample.
    pub fn set_tau_ms(&mut self, tau_ms: f32) -> Result<(), ProcessingError> {
        self.odr.set_tau_ms(tau_ms)?;
        self.config.time_domain.tau_ms = tau_ms;
        debug!(tau_ms, lambda = self.odr.lambda(), "RMS time constant updated");
        Ok(())
    }

    /// Finalize the in-flight time-based average at the next FFT cycle.
    pub fn request_finish(&mut self) {
        self.controller.request_finish();
    }

    pub fn clear_peaks(&mut self) {
        self.time_domain.clear_peaks();
        self.buffer_time_domain.clear_peaks();
    }

    /// Metrics of the sample-by-sample path.
    pub fn time_domain_metrics(&self) -> Triaxial<AxisMetrics> {
        self.time_domain.metrics()
    }

    /// Metrics of the batch path, re-derived from the buffer.
    pub fn buffer_time_domain_metrics(&self) -> Triaxial<AxisMetrics> {
        self.buffer_time_domain.metrics()
    }

    pub const fn last_report(&self) -> Option<&VibrationReport> {
        self.last_report.as_ref()
    }

    /// FFT cycles dropped because the buffer lacked a full window.
    pub const fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles
    }

    pub const fn reports_emitted(&self) -> u64 {
        self.sequence
    }

    /// Feed one raw sample. Starts an acquisition on first use.
    ///
    /// Returns a report when this sample closed an averaging window.
    pub fn push_sample(
        &mut self,
        raw: Sample3,
        now_ms: u64,
    ) -> Result<Option<VibrationReport>, ProcessingError> {
        if !self.controller.is_running() {
            self.start(now_ms);
        }
        let restart = self.poll_restart();
        let sample = self.condition(raw, restart);
        self.buffer.push(sample);
        let reset = std::mem::take(&mut self.live_reset_pending);
        self.time_domain
            .process_latest(&self.buffer, &self.odr, reset)?;

        match self.controller.fft_due(&mut self.buffer, 1) {
            Some(end_index) => self.run_fft(end_index, now_ms, MetricsPath::Live),
            None => Ok(None),
        }
    }

    /// Feed a block of raw samples sharing one timestamp.
    ///
    /// The block is split into chunks no larger than the buffer (or the
    /// overlap hop); each chunk runs the time-domain filters over its
    /// samples and at most one FFT cycle.
    pub fn ingest_batch(
        &mut self,
        samples: &[Sample3],
        now_ms: u64,
    ) -> Result<Vec<VibrationReport>, ProcessingError> {
        if !self.controller.is_running() {
            self.start(now_ms);
        }
        let chunk_len = self
            .controller
            .hop()
            .unwrap_or_else(|| self.buffer.capacity())
            .min(self.buffer.capacity());

        let mut reports = Vec::new();
        for chunk in samples.chunks(chunk_len) {
            let restart = self.poll_restart();
            for (i, &raw) in chunk.iter().enumerate() {
                let sample = self.condition(raw, restart && i == 0);
                self.buffer.push(sample);
            }
            let reset = std::mem::take(&mut self.buffer_reset_pending);
            self.buffer_time_domain
                .eval_from_buffer(&self.buffer, chunk.len(), &self.odr, reset)?;

            if let Some(end_index) = self.controller.fft_due(&mut self.buffer, chunk.len()) {
                if let Some(report) = self.run_fft(end_index, now_ms, MetricsPath::Buffer)? {
                    reports.push(report);
                }
            }
        }
        Ok(reports)
    }

    /// Consume the acquisition restart flag. Each time-domain path runs its
    /// reset branch on its own next sample.
    fn poll_restart(&mut self) -> bool {
        let restart = self.controller.take_restart();
        if restart {
            self.live_reset_pending = true;
            self.buffer_reset_pending = true;
        }
        restart
    }

    /// Unit conversion plus optional input offset removal.
    fn condition(&mut self, raw: Sample3, restart: bool) -> Sample3 {
        let si = self.config.acquisition.input_unit.to_si(raw);
        if !self.config.acquisition.remove_input_offset {
            return si;
        }
        let alpha = self.config.time_domain.dc_smooth;
        Triaxial::from_fn(|axis| {
            let blocker = &mut self.input_offset[axis];
            if restart {
                blocker.reset();
            }
            blocker.process(si[axis], alpha)
        })
    }

    fn run_fft(
        &mut self,
        end_index: usize,
        now_ms: u64,
        path: MetricsPath,
    ) -> Result<Option<VibrationReport>, ProcessingError> {
        let finish = self.controller.finish_due(now_ms);
        let result = match self.frequency.process(&self.buffer, end_index, finish) {
            Ok(Some(result)) => result,
            Ok(None) => return Ok(None),
            Err(ProcessingError::InsufficientData { needed, available }) => {
                self.skipped_cycles += 1;
                warn!(needed, available, "FFT cycle skipped: window not yet filled");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let metrics = match path {
            MetricsPath::Live => self.time_domain.metrics(),
            MetricsPath::Buffer => self.buffer_time_domain.metrics(),
        };
        let report = self.build_report(result, metrics);
        self.controller.complete_window(now_ms);
        if self.config.time_domain.reset_peak_each_report {
            self.clear_peaks();
        }
        debug!(
            sequence = report.sequence,
            spectra = report.axes.x.spectra_averaged,
            peak_hz_x = report.axes.x.peak_frequency_hz,
            "Report emitted"
        );
        self.last_report = Some(report.clone());
        Ok(Some(report))
    }

    fn build_report(
        &mut self,
        result: SpectrumResult,
        metrics: Triaxial<AxisMetrics>,
    ) -> VibrationReport {
        self.sequence += 1;
        let odr_hz = self.odr.frequency_hz();
        let fft_size = self.config.fft.size;

        let SpectrumResult {
            mut magnitudes,
            peaks,
            spectra_averaged,
            mut subranges,
        } = result;

        let axes = Triaxial::from_fn(|axis: Axis| {
            let m = metrics[axis];
            AxisReport {
                spectrum: std::mem::take(&mut magnitudes[axis]),
                peak: peaks[axis],
                peak_frequency_hz: bin_frequency(peaks[axis].bin, odr_hz, fft_size),
                acc_rms: m.acc_rms,
                acc_peak: m.acc_peak,
                speed_rms: m.speed_rms,
                spectra_averaged: spectra_averaged[axis],
                subranges: subranges.as_mut().map(|s| std::mem::take(&mut s[axis])),
            }
        });

        VibrationReport {
            timestamp: Utc::now(),
            sequence: self.sequence,
            odr_hz,
            fft_size,
            bin_width_hz: odr_hz / fft_size as f32,
            window: self.config.fft.window,
            axes,
        }
    }
}
