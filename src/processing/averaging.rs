//! Spectrum averaging across acquisitions
//!
//! The accumulator holds a running sum between a reset (counter == 0) and
//! completion. On completion the sum is divided in place by the number of
//! spectra and the counter returns to 0; the average stays readable until
//! the next `accumulate` call starts a fresh window.

use super::ProcessingError;
use crate::types::AveragingPolicy;

/// Outcome of one [`SpectrumAccumulator::accumulate`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationStatus {
    /// Still averaging; `count` spectra summed so far.
    Pending { count: u16 },
    /// Average finalized over `spectra` acquisitions.
    Complete { spectra: u16 },
}

impl AccumulationStatus {
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Running per-axis spectrum sum
#[derive(Debug, Clone)]
pub struct SpectrumAccumulator {
    sum: Vec<f32>,
    count: u16,
}

impl SpectrumAccumulator {
    pub fn new(len: usize) -> Self {
        Self {
            sum: vec![0.0; len],
            count: 0,
        }
    }

    /// Spectra summed in the current window.
    pub const fn count(&self) -> u16 {
        self.count
    }

    pub fn len(&self) -> usize {
        self.sum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Running sum while pending, the average right after completion.
    pub fn values(&self) -> &[f32] {
        &self.sum
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.sum
    }

    /// Abandon the in-flight window.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Add one magnitude spectrum.
    ///
    /// `finish` only matters for [`AveragingPolicy::Time`]; count-based
    /// averaging completes on its own after exactly `spectra` calls.
    pub fn accumulate(
        &mut self,
        spectrum: &[f32],
        policy: AveragingPolicy,
        finish: bool,
    ) -> Result<AccumulationStatus, ProcessingError> {
        if spectrum.len() != self.sum.len() {
            return Err(ProcessingError::LengthMismatch {
                expected: self.sum.len(),
                actual: spectrum.len(),
            });
        }

        let complete = match policy {
            AveragingPolicy::Count { spectra } => {
                if spectra == 0 {
                    return Err(ProcessingError::InvalidAveragingCount(spectra));
                }
                if self.count == 0 || self.count >= spectra {
                    self.sum.fill(0.0);
                    self.count = 0;
                }
                self.add(spectrum);
                self.count == spectra
            }
            AveragingPolicy::Time => {
                if self.count == 0 {
                    self.sum.fill(0.0);
                }
                self.add(spectrum);
                finish || self.count == u16::MAX
            }
        };

        if complete {
            let spectra = self.count;
            let n = f32::from(spectra);
            self.sum.iter_mut().for_each(|v| *v /= n);
            self.count = 0;
            Ok(AccumulationStatus::Complete { spectra })
        } else {
            Ok(AccumulationStatus::Pending { count: self.count })
        }
    }

    fn add(&mut self, spectrum: &[f32]) {
        for (acc, &m) in self.sum.iter_mut().zip(spectrum) {
            *acc += m;
        }
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_based_closure() {
        let mut acc = SpectrumAccumulator::new(3);
        let policy = AveragingPolicy::Count { spectra: 4 };
        let spectrum = [1.0, 2.0, 3.0];
        for expected in 1..4 {
            let status = acc.accumulate(&spectrum, policy, false).unwrap();
            assert_eq!(status, AccumulationStatus::Pending { count: expected });
        }
        let status = acc.accumulate(&spectrum, policy, false).unwrap();
        assert_eq!(status, AccumulationStatus::Complete { spectra: 4 });
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.values(), &spectrum);
    }

    #[test]
    fn test_count_based_ignores_finish_flag() {
        let mut acc = SpectrumAccumulator::new(2);
        let policy = AveragingPolicy::Count { spectra: 2 };
        let status = acc.accumulate(&[1.0, 1.0], policy, true).unwrap();
        assert!(!status.is_complete());
    }

    #[test]
    fn test_count_based_restarts_after_completion() {
        let mut acc = SpectrumAccumulator::new(1);
        let policy = AveragingPolicy::Count { spectra: 2 };
        acc.accumulate(&[2.0], policy, false).unwrap();
        acc.accumulate(&[4.0], policy, false).unwrap();
        assert_eq!(acc.values(), &[3.0]);
        // Next window starts from zero rather than the previous average
        acc.accumulate(&[10.0], policy, false).unwrap();
        assert_eq!(acc.values(), &[10.0]);
        assert_eq!(acc.count(), 1);
    }

    #[test]
    fn test_time_based_finalizes_on_finish() {
        let mut acc = SpectrumAccumulator::new(2);
        let policy = AveragingPolicy::Time;
        acc.accumulate(&[1.0, 0.0], policy, false).unwrap();
        acc.accumulate(&[2.0, 0.0], policy, false).unwrap();
        let status = acc.accumulate(&[3.0, 3.0], policy, true).unwrap();
        assert_eq!(status, AccumulationStatus::Complete { spectra: 3 });
        assert_eq!(acc.values(), &[2.0, 1.0]);
        assert_eq!(acc.count(), 0);
    }

    #[test]
    fn test_time_based_single_spectrum() {
        let mut acc = SpectrumAccumulator::new(1);
        let status = acc.accumulate(&[5.0], AveragingPolicy::Time, true).unwrap();
        assert_eq!(status, AccumulationStatus::Complete { spectra: 1 });
        assert_eq!(acc.values(), &[5.0]);
    }

    #[test]
    fn test_reset_discards_partial_sum() {
        let mut acc = SpectrumAccumulator::new(1);
        acc.accumulate(&[100.0], AveragingPolicy::Time, false).unwrap();
        acc.reset();
        acc.accumulate(&[1.0], AveragingPolicy::Time, true).unwrap();
        assert_eq!(acc.values(), &[1.0]);
    }

    #[test]
    fn test_rejects_zero_count_and_bad_length() {
        let mut acc = SpectrumAccumulator::new(2);
        assert_eq!(
            acc.accumulate(&[0.0, 0.0], AveragingPolicy::Count { spectra: 0 }, false),
            Err(ProcessingError::InvalidAveragingCount(0))
        );
        assert!(acc.accumulate(&[0.0], AveragingPolicy::Time, false).is_err());
    }
}
