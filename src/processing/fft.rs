//! FFT computation using rustfft
//!
//! One-sided magnitude spectrum of a real, already-windowed input block.
//!
//! # Features
//!
//! - Pre-planned FFT for consistent per-cycle cost
//! - Scratch buffers allocated once at configuration time
//! - Raw magnitudes only; normalization happens after averaging

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use super::ProcessingError;
use crate::config::defaults::{FFT_SIZE_MAX, FFT_SIZE_MIN};

/// Pre-planned forward FFT for a fixed block size.
pub struct SpectrumCalculator {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl std::fmt::Debug for SpectrumCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumCalculator")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SpectrumCalculator {
    /// Plan an FFT of `size` points (power of two within the supported range).
    pub fn new(size: usize) -> Result<Self, ProcessingError> {
        if !size.is_power_of_two() || !(FFT_SIZE_MIN..=FFT_SIZE_MAX).contains(&size) {
            return Err(ProcessingError::InvalidFftSize(size));
        }
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex32::default(); fft.get_inplace_scratch_len()];
        Ok(Self {
            fft,
            size,
            buffer: vec![Complex32::default(); size],
            scratch,
        })
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of one-sided magnitude bins (`size / 2`).
    pub const fn magnitude_len(&self) -> usize {
        self.size / 2
    }

    /// Compute `|X[k]|` for `k < size/2` of a real input block.
    pub fn magnitude_spectrum(
        &mut self,
        input: &[f32],
        magnitudes: &mut [f32],
    ) -> Result<(), ProcessingError> {
        if input.len() != self.size {
            return Err(ProcessingError::LengthMismatch {
                expected: self.size,
                actual: input.len(),
            });
        }
        if magnitudes.len() != self.magnitude_len() {
            return Err(ProcessingError::LengthMismatch {
                expected: self.magnitude_len(),
                actual: magnitudes.len(),
            });
        }

        for (slot, &x) in self.buffer.iter_mut().zip(input) {
            *slot = Complex32::new(x, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (m, c) in magnitudes.iter_mut().zip(&self.buffer) {
            *m = c.norm();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(SpectrumCalculator::new(100).is_err());
        assert!(SpectrumCalculator::new(8).is_err());
        assert!(SpectrumCalculator::new(4096).is_err());
        assert!(SpectrumCalculator::new(256).is_ok());
    }

    #[test]
    fn test_bin_centered_sine_peak() {
        // 64 Hz at 1024 Hz with 256 points -> exactly bin 16
        let mut calc = SpectrumCalculator::new(256).unwrap();
        let mut mags = vec![0.0; calc.magnitude_len()];
        calc.magnitude_spectrum(&sine(64.0, 1024.0, 256), &mut mags)
            .unwrap();
        assert_eq!(argmax(&mags), 16);
        // Unwindowed bin-centred sine: |X[k]| = N/2
        assert!((mags[16] - 128.0).abs() < 0.05, "peak = {}", mags[16]);
        assert!(mags[40] < 1e-2);
    }

    #[test]
    fn test_dc_input_lands_in_bin_zero() {
        let mut calc = SpectrumCalculator::new(64).unwrap();
        let mut mags = vec![0.0; 32];
        calc.magnitude_spectrum(&[1.0; 64], &mut mags).unwrap();
        assert!((mags[0] - 64.0).abs() < 1e-3);
        assert!(mags[1..].iter().all(|m| *m < 1e-3));
    }

    #[test]
    fn test_length_checks() {
        let mut calc = SpectrumCalculator::new(64).unwrap();
        let mut mags = vec![0.0; 32];
        assert!(calc.magnitude_spectrum(&[0.0; 32], &mut mags).is_err());
        let mut short = vec![0.0; 16];
        assert!(calc.magnitude_spectrum(&[0.0; 64], &mut short).is_err());
    }
}
