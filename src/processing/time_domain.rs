//! Time-domain vibration metrics
//!
//! Per-axis recursive filters: DC-offset removal, first-sample-exact
//! exponential RMS, peak hold and trapezoidal velocity integration.
//! Every filter owns its state, so the three axes never share history.
//!
//! # Modes
//!
//! - `Speed`: integrate acceleration, remove DC from the speed, RMS the speed
//! - `Accelero`: RMS of the acceleration
//! - `Both`: both pipelines on every sample

use serde::{Deserialize, Serialize};

use super::ProcessingError;
use crate::acquisition::{CircularBuffer, OdrState};
use crate::config::defaults::{DC_SMOOTH, INTEGRATION_GAMMA};
use crate::types::{Axis, Sample3, TdMode, Triaxial};

// ============================================================================
// Filters
// ============================================================================

/// First-order high-pass: `y[n] = a*y[n-1] + a*(x[n] - x[n-1])`.
///
/// After a reset the first call outputs 0 and seeds both history terms
/// with its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcBlocker {
    prev_input: f32,
    prev_output: f32,
    output: f32,
    primed: bool,
}

impl DcBlocker {
    pub fn reset(&mut self) {
        self.primed = false;
        self.output = 0.0;
    }

    pub fn process(&mut self, input: f32, alpha: f32) -> f32 {
        if self.primed {
            self.output = alpha * self.prev_output + alpha * (input - self.prev_input);
            self.prev_output = self.output;
        } else {
            self.output = 0.0;
            self.prev_output = input;
            self.primed = true;
        }
        self.prev_input = input;
        self.output
    }

    /// Last value returned by [`process`](Self::process).
    pub const fn output(&self) -> f32 {
        self.output
    }
}

/// Exponential RMS with a growing weight.
///
/// The first sample after a reset passes through as `|x|`; afterwards
/// `out = sqrt((1 - 1/W) * out² + x²/W)` and `W = lambda*W + 1`, so the
/// averaging window widens toward `1 / (1 - lambda)` samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastRms {
    output: f32,
    /// 0 until seeded by the first sample after a reset.
    weight: f32,
}

impl FastRms {
    pub fn reset(&mut self) {
        self.output = 0.0;
        self.weight = 0.0;
    }

    pub fn update(&mut self, input: f32, lambda: f32) -> f32 {
        if self.weight == 0.0 {
            self.output = input.abs();
            self.weight = 1.0;
        } else {
            let inv = 1.0 / self.weight;
            self.output = ((1.0 - inv) * self.output * self.output + inv * input * input).sqrt();
            self.weight = lambda * self.weight + 1.0;
        }
        self.output
    }

    pub const fn output(&self) -> f32 {
        self.output
    }

    pub const fn weight(&self) -> f32 {
        self.weight
    }
}

/// Running maximum of |x|; only an explicit clear lowers it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakHold {
    peak: f32,
}

impl PeakHold {
    pub fn update(&mut self, input: f32) -> f32 {
        self.peak = self.peak.max(input.abs());
        self.peak
    }

    pub fn clear(&mut self) {
        self.peak = 0.0;
    }

    pub const fn peak(&self) -> f32 {
        self.peak
    }
}

/// `v[n] = v[n-1] + (1-g)*T*a[n-1] + g*T*a[n]`
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapezoidIntegrator {
    velocity: f32,
    primed: bool,
}

impl TrapezoidIntegrator {
    /// Next step restarts from zero velocity.
    pub fn reset(&mut self) {
        self.velocity = 0.0;
        self.primed = false;
    }

    pub fn step(&mut self, prev_acc: f32, acc: f32, period_s: f32, gamma: f32) -> f32 {
        if self.primed {
            self.velocity += (1.0 - gamma) * period_s * prev_acc + gamma * period_s * acc;
        } else {
            self.velocity = 0.0;
            self.primed = true;
        }
        self.velocity
    }

    pub const fn velocity(&self) -> f32 {
        self.velocity
    }
}

// ============================================================================
// Analyzer
// ============================================================================

/// Filter constants of the time-domain pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeDomainSettings {
    pub mode: TdMode,
    /// High-pass smoothing constant of the speed DC removal
    pub dc_smooth: f32,
    /// Trapezoidal blend (0.5 = true trapezoid)
    pub gamma: f32,
}

impl Default for TimeDomainSettings {
    fn default() -> Self {
        Self {
            mode: TdMode::default(),
            dc_smooth: DC_SMOOTH,
            gamma: INTEGRATION_GAMMA,
        }
    }
}

impl TimeDomainSettings {
    pub fn validate(&self) -> Result<(), ProcessingError> {
        if !(self.dc_smooth > 0.0 && self.dc_smooth < 1.0) {
            return Err(ProcessingError::InvalidFilterConstant {
                name: "dc_smooth",
                value: self.dc_smooth,
            });
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ProcessingError::InvalidFilterConstant {
                name: "gamma",
                value: self.gamma,
            });
        }
        Ok(())
    }
}

/// Snapshot of one axis' time-domain outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisMetrics {
    pub acc_rms: f32,
    pub acc_peak: f32,
    /// Integrated speed (m/s)
    pub speed: f32,
    /// Integrated speed after DC removal (m/s)
    pub speed_no_dc: f32,
    pub speed_rms: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct AxisState {
    peak: PeakHold,
    acc_rms: FastRms,
    integrator: TrapezoidIntegrator,
    speed_dc: DcBlocker,
    speed_rms: FastRms,
}

impl AxisState {
    fn reset(&mut self) {
        self.acc_rms.reset();
        self.integrator.reset();
        self.speed_dc.reset();
        self.speed_rms.reset();
    }

    fn metrics(&self) -> AxisMetrics {
        AxisMetrics {
            acc_rms: self.acc_rms.output(),
            acc_peak: self.peak.peak(),
            speed: self.integrator.velocity(),
            speed_no_dc: self.speed_dc.output(),
            speed_rms: self.speed_rms.output(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalyzerState {
    Idle,
    Running,
}

/// Tri-axial time-domain analyzer fed from the circular buffer.
#[derive(Debug, Clone)]
pub struct TimeDomainAnalyzer {
    settings: TimeDomainSettings,
    axes: Triaxial<AxisState>,
    state: AnalyzerState,
    samples: u64,
}

impl TimeDomainAnalyzer {
    pub fn new(settings: TimeDomainSettings) -> Result<Self, ProcessingError> {
        settings.validate()?;
        Ok(Self {
            settings,
            axes: Triaxial::default(),
            state: AnalyzerState::Idle,
            samples: 0,
        })
    }

    pub const fn settings(&self) -> &TimeDomainSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.state == AnalyzerState::Running
    }

    /// Samples processed since creation.
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Re-initialize the recursive filters; peaks are kept.
    pub fn reset(&mut self) {
        for (_, axis) in self.axes.iter_mut() {
            axis.reset();
        }
    }

    pub fn clear_peaks(&mut self) {
        for (_, axis) in self.axes.iter_mut() {
            axis.peak.clear();
        }
    }

    pub fn metrics(&self) -> Triaxial<AxisMetrics> {
        self.axes.as_ref().map(AxisState::metrics)
    }

    /// Process one sample given its predecessor.
    ///
    /// The first call after creation runs the reset branch regardless of
    /// `reset`.
    pub fn step(&mut self, prev: Sample3, current: Sample3, odr: &OdrState, reset: bool) {
        if reset || self.state == AnalyzerState::Idle {
            self.reset();
            self.state = AnalyzerState::Running;
        }

        let mode = self.settings.mode;
        let lambda = odr.lambda();
        let period = odr.period_s();
        for axis in Axis::ALL {
            let state = &mut self.axes[axis];
            let acc = current[axis];
            state.peak.update(acc);
            if mode.tracks_acceleration() {
                state.acc_rms.update(acc, lambda);
            }
            if mode.tracks_speed() {
                let speed = state
                    .integrator
                    .step(prev[axis], acc, period, self.settings.gamma);
                let no_dc = state.speed_dc.process(speed, self.settings.dc_smooth);
                state.speed_rms.update(no_dc, lambda);
            }
        }
        self.samples += 1;
    }

    /// Process the most recent sample in `buffer`.
    pub fn process_latest(
        &mut self,
        buffer: &CircularBuffer,
        odr: &OdrState,
        reset: bool,
    ) -> Result<(), ProcessingError> {
        self.eval_from_buffer(buffer, 1, odr, reset)
    }

    /// Re-derive metrics for the `new_samples` most recent buffered samples,
    /// oldest first, each paired with its predecessor slot.
    ///
    /// `reset` applies to the first of them only.
    pub fn eval_from_buffer(
        &mut self,
        buffer: &CircularBuffer,
        new_samples: usize,
        odr: &OdrState,
        reset: bool,
    ) -> Result<(), ProcessingError> {
        if new_samples > buffer.capacity() {
            return Err(ProcessingError::WindowExceedsCapacity {
                requested: new_samples,
                capacity: buffer.capacity(),
            });
        }
        if new_samples == 0 || new_samples > buffer.len() {
            return Err(ProcessingError::InsufficientData {
                needed: new_samples.max(1),
                available: buffer.len(),
            });
        }

        let mut index = buffer.start_of_recent(new_samples);
        for k in 0..new_samples {
            let prev = buffer.get(buffer.predecessor(index))?;
            let current = buffer.get(index)?;
            self.step(prev, current, odr, reset && k == 0);
            index = buffer.successor(index);
        }
        Ok(())
    }
}
