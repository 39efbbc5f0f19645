//! Output data rate state and measurement
//!
//! The RMS filters decay with `lambda = exp(-period_ms / tau_ms)`, so every
//! ODR or tau change recomputes the derived values before the next sample.

use crate::processing::ProcessingError;

/// Sample frequency with its derived period and RMS decay factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdrState {
    frequency_hz: f32,
    period_s: f32,
    tau_ms: f32,
    lambda: f32,
}

impl OdrState {
    pub fn new(frequency_hz: f32, tau_ms: f32) -> Result<Self, ProcessingError> {
        check_frequency(frequency_hz)?;
        check_tau(tau_ms)?;
        let mut state = Self {
            frequency_hz,
            period_s: 0.0,
            tau_ms,
            lambda: 0.0,
        };
        state.recompute();
        Ok(state)
    }

    pub const fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    /// Sample period (s).
    pub const fn period_s(&self) -> f32 {
        self.period_s
    }

    pub const fn tau_ms(&self) -> f32 {
        self.tau_ms
    }

    /// Per-sample exponential decay of the RMS filters.
    pub const fn lambda(&self) -> f32 {
        self.lambda
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) -> Result<(), ProcessingError> {
        check_frequency(frequency_hz)?;
        self.frequency_hz = frequency_hz;
        self.recompute();
        Ok(())
    }

    pub fn set_tau_ms(&mut self, tau_ms: f32) -> Result<(), ProcessingError> {
        check_tau(tau_ms)?;
        self.tau_ms = tau_ms;
        self.recompute();
        Ok(())
    }

    fn recompute(&mut self) {
        self.period_s = 1.0 / self.frequency_hz;
        self.lambda = (-(self.period_s * 1000.0) / self.tau_ms).exp();
    }
}

fn check_frequency(frequency_hz: f32) -> Result<(), ProcessingError> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(ProcessingError::InvalidSamplingRate(frequency_hz));
    }
    Ok(())
}

fn check_tau(tau_ms: f32) -> Result<(), ProcessingError> {
    if !tau_ms.is_finite() || tau_ms <= 0.0 {
        return Err(ProcessingError::InvalidTimeConstant(tau_ms));
    }
    Ok(())
}

// ============================================================================
// ODR Measurement
// ============================================================================

/// Estimates the real sample rate from data-ready timestamps.
///
/// Measures over consecutive windows of `window` samples and yields one
/// estimate per completed window, so slow clock drift is tracked.
#[derive(Debug, Clone)]
pub struct OdrMeter {
    window: usize,
    first_ms: Option<u64>,
    count: usize,
    last_estimate: Option<f32>,
}

impl OdrMeter {
    /// `window` is clamped to at least two samples (one interval).
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            first_ms: None,
            count: 0,
            last_estimate: None,
        }
    }

    pub const fn last_estimate(&self) -> Option<f32> {
        self.last_estimate
    }

    pub fn reset(&mut self) {
        self.first_ms = None;
        self.count = 0;
    }

    /// Record one sample timestamp; returns a fresh estimate (Hz) when a
    /// measurement window completes.
    pub fn tick(&mut self, timestamp_ms: u64) -> Option<f32> {
        let Some(first) = self.first_ms else {
            self.first_ms = Some(timestamp_ms);
            self.count = 1;
            return None;
        };

        self.count += 1;
        if self.count < self.window {
            return None;
        }

        let elapsed_ms = timestamp_ms.saturating_sub(first);
        // The closing sample opens the next window.
        self.first_ms = Some(timestamp_ms);
        self.count = 1;
        if elapsed_ms == 0 {
            return None;
        }
        let intervals = (self.window - 1) as f32;
        let estimate = 1000.0 * intervals / elapsed_ms as f32;
        self.last_estimate = Some(estimate);
        Some(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let odr = OdrState::new(1000.0, 50.0).unwrap();
        assert!((odr.period_s() - 0.001).abs() < 1e-9);
        assert!((odr.lambda() - (-1.0_f32 / 50.0).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_degenerate_rates() {
        assert_eq!(
            OdrState::new(0.0, 50.0),
            Err(ProcessingError::InvalidSamplingRate(0.0))
        );
        assert!(OdrState::new(-5.0, 50.0).is_err());
        assert!(OdrState::new(f32::NAN, 50.0).is_err());
        assert!(OdrState::new(100.0, 0.0).is_err());
    }

    #[test]
    fn test_frequency_change_recomputes_lambda() {
        let mut odr = OdrState::new(100.0, 50.0).unwrap();
        let before = odr.lambda();
        odr.set_frequency(400.0).unwrap();
        assert!(odr.lambda() > before, "faster sampling decays less per sample");
        assert!((odr.period_s() - 0.0025).abs() < 1e-7);
        // Rejected change keeps the previous state
        assert!(odr.set_frequency(0.0).is_err());
        assert!((odr.frequency_hz() - 400.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_meter_estimates_per_window() {
        let mut meter = OdrMeter::new(5);
        // 4 ms spacing -> 250 Hz
        let estimates: Vec<Option<f32>> = (0..9).map(|i| meter.tick(i * 4)).collect();
        assert!(estimates[..4].iter().all(Option::is_none));
        assert!((estimates[4].unwrap() - 250.0).abs() < 1e-3);
        assert!(estimates[5..8].iter().all(Option::is_none));
        assert!((estimates[8].unwrap() - 250.0).abs() < 1e-3);
        assert_eq!(meter.last_estimate(), estimates[8]);
    }

    #[test]
    fn test_meter_ignores_zero_elapsed() {
        let mut meter = OdrMeter::new(2);
        assert!(meter.tick(10).is_none());
        assert!(meter.tick(10).is_none());
        assert!((meter.tick(20).unwrap() - 100.0).abs() < 1e-3);
    }
}
