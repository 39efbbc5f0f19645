//! Acquisition window sequencing
//!
//! Owns the restart flag (forces every filter through its reset branch once
//! per acquisition window), the elapsed-time "finish averaging" trigger and
//! the decision of when an FFT cycle runs.

use super::CircularBuffer;
use crate::config::defaults::{FFT_OVERLAP_MAX_PERCENT, FFT_OVERLAP_MIN_PERCENT};
use crate::processing::ProcessingError;

#[derive(Debug, Clone)]
pub struct AcquisitionController {
    acquisition_time_ms: u64,
    fft_size: usize,
    /// New samples between overlapped FFT cycles; `None` runs one FFT per buffer lap.
    hop: Option<usize>,
    running: bool,
    restart_pending: bool,
    finish_requested: bool,
    window_start_ms: u64,
    samples_since_fft: usize,
    fft_primed: bool,
}

impl AcquisitionController {
    pub fn new(
        acquisition_time_ms: u64,
        fft_size: usize,
        overlap_percent: Option<u8>,
    ) -> Result<Self, ProcessingError> {
        let hop = overlap_percent
            .map(|ovl| hop_for_overlap(fft_size, ovl))
            .transpose()?;
        Ok(Self {
            acquisition_time_ms,
            fft_size,
            hop,
            running: false,
            restart_pending: false,
            finish_requested: false,
            window_start_ms: 0,
            samples_since_fft: 0,
            fft_primed: false,
        })
    }

    pub const fn is_running(&self) -> bool {
        self.running
    }

    pub const fn hop(&self) -> Option<usize> {
        self.hop
    }

    pub const fn acquisition_time_ms(&self) -> u64 {
        self.acquisition_time_ms
    }

    /// Begin a new acquisition; the next sample runs every filter's reset branch.
    pub fn start(&mut self, now_ms: u64) {
        self.running = true;
        self.restart_pending = true;
        self.finish_requested = false;
        self.window_start_ms = now_ms;
        self.samples_since_fft = 0;
        self.fft_primed = false;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub const fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    /// Consume the restart flag: true exactly once per acquisition window.
    pub fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restart_pending)
    }

    /// Externally finalize the in-flight time-based average at the next FFT cycle.
    pub fn request_finish(&mut self) {
        self.finish_requested = true;
    }

    /// Milliseconds since the current acquisition window opened.
    pub const fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.window_start_ms)
    }

    /// True once the acquisition time has elapsed or a finish was requested.
    pub const fn finish_due(&self, now_ms: u64) -> bool {
        self.finish_requested || self.elapsed_ms(now_ms) >= self.acquisition_time_ms
    }

    /// An averaged result went out: open the next window.
    pub fn complete_window(&mut self, now_ms: u64) {
        self.restart_pending = true;
        self.finish_requested = false;
        self.window_start_ms = now_ms;
    }

    /// Decide whether an FFT cycle runs after `new_samples` were pushed.
    ///
    /// Returns the end index of the FFT window (always the latest write).
    pub fn fft_due(&mut self, buffer: &mut CircularBuffer, new_samples: usize) -> Option<usize> {
        self.samples_since_fft = self.samples_since_fft.saturating_add(new_samples);
        let due = match self.hop {
            None => buffer.overflowed(),
            Some(hop) => {
                buffer.len() >= self.fft_size
                    && (!self.fft_primed || self.samples_since_fft >= hop)
            }
        };
        if !due {
            return None;
        }
        buffer.acknowledge_overflow();
        self.fft_primed = true;
        self.samples_since_fft = 0;
        Some(buffer.cursor())
    }
}

/// Hop (new samples between FFTs) for an overlap percentage.
pub fn hop_for_overlap(fft_size: usize, overlap_percent: u8) -> Result<usize, ProcessingError> {
    if !(FFT_OVERLAP_MIN_PERCENT..=FFT_OVERLAP_MAX_PERCENT).contains(&overlap_percent) {
        return Err(ProcessingError::InvalidOverlap(overlap_percent));
    }
    Ok((fft_size * usize::from(100 - overlap_percent) / 100).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample3;

    #[test]
    fn test_restart_consumed_once() {
        let mut ctl = AcquisitionController::new(1000, 4, None).unwrap();
        assert!(!ctl.take_restart());
        ctl.start(0);
        assert!(ctl.restart_pending());
        assert!(ctl.take_restart());
        assert!(!ctl.take_restart());
        ctl.complete_window(10);
        assert!(ctl.take_restart());
    }

    #[test]
    fn test_finish_by_elapsed_time_or_request() {
        let mut ctl = AcquisitionController::new(5000, 4, None).unwrap();
        ctl.start(1_000);
        assert!(!ctl.finish_due(5_999));
        assert!(ctl.finish_due(6_000));
        ctl.complete_window(6_000);
        assert!(!ctl.finish_due(6_001));
        ctl.request_finish();
        assert!(ctl.finish_due(6_001));
    }

    #[test]
    fn test_fft_per_lap_without_overlap() {
        let mut ctl = AcquisitionController::new(1000, 4, None).unwrap();
        let mut buf = CircularBuffer::new(4).unwrap();
        ctl.start(0);
        let mut ends = Vec::new();
        for i in 0..12 {
            buf.push(Sample3::splat(i as f32));
            if let Some(end) = ctl.fft_due(&mut buf, 1) {
                ends.push((i + 1, end));
            }
        }
        assert_eq!(ends, vec![(4, 3), (8, 3), (12, 3)]);
    }

    #[test]
    fn test_fft_hop_with_overlap() {
        // 50% overlap of 8 -> hop 4
        let mut ctl = AcquisitionController::new(1000, 8, Some(50)).unwrap();
        assert_eq!(ctl.hop(), Some(4));
        let mut buf = CircularBuffer::new(8).unwrap();
        ctl.start(0);
        let mut fired = Vec::new();
        for i in 0..20 {
            buf.push(Sample3::splat(i as f32));
            if ctl.fft_due(&mut buf, 1).is_some() {
                fired.push(i + 1);
            }
        }
        assert_eq!(fired, vec![8, 12, 16, 20]);
    }

    #[test]
    fn test_overlap_range_enforced() {
        assert_eq!(hop_for_overlap(1024, 4), Err(ProcessingError::InvalidOverlap(4)));
        assert!(hop_for_overlap(1024, 71).is_err());
        assert_eq!(hop_for_overlap(1024, 70).unwrap(), 307);
        assert_eq!(hop_for_overlap(1024, 5).unwrap(), 972);
    }
}
