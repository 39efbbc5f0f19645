//! Window coefficient synthesis
//!
//! Each window attenuates the signal; the associated scale factor restores
//! the true amplitude and is applied once per averaged spectrum.

use std::f64::consts::PI;

use super::ProcessingError;
use crate::types::WindowType;

/// Five-term flat-top cosine-sum coefficients.
const FLAT_TOP: [f64; 5] = [
    0.215_578_95,
    0.416_631_58,
    0.277_263_158,
    0.083_578_947,
    0.006_947_368,
];

impl WindowType {
    /// Amplitude correction for the attenuation this window introduces.
    pub const fn scale_factor(self) -> f32 {
        match self {
            WindowType::Rectangular => 1.0,
            WindowType::Hanning => 2.0,
            WindowType::Hamming => 1.85,
            WindowType::FlatTop => 4.55,
        }
    }

    /// Coefficient `i` of an `n`-point window. Requires `n >= 2`.
    fn coefficient(self, i: usize, n: usize) -> f64 {
        let phase = 2.0 * PI * i as f64 / (n - 1) as f64;
        match self {
            WindowType::Rectangular => 1.0,
            WindowType::Hanning => 0.5 * (1.0 - phase.cos()),
            WindowType::Hamming => 0.54 - 0.46 * phase.cos(),
            WindowType::FlatTop => {
                FLAT_TOP[0] - FLAT_TOP[1] * phase.cos() + FLAT_TOP[2] * (2.0 * phase).cos()
                    - FLAT_TOP[3] * (3.0 * phase).cos()
                    + FLAT_TOP[4] * (4.0 * phase).cos()
            }
        }
    }
}

/// Fill `coeffs` with the window and return its amplitude scale factor.
pub fn build_window(coeffs: &mut [f32], kind: WindowType) -> Result<f32, ProcessingError> {
    let n = coeffs.len();
    if n < 2 {
        return Err(ProcessingError::WindowTooShort(n));
    }
    for (i, c) in coeffs.iter_mut().enumerate() {
        *c = kind.coefficient(i, n) as f32;
    }
    Ok(kind.scale_factor())
}

/// Precomputed window for one FFT size, read-only during acquisition.
#[derive(Debug, Clone)]
pub struct WindowTable {
    kind: WindowType,
    coefficients: Vec<f32>,
    scale_factor: f32,
}

impl WindowTable {
    pub fn new(kind: WindowType, size: usize) -> Result<Self, ProcessingError> {
        let mut coefficients = vec![0.0; size];
        let scale_factor = build_window(&mut coefficients, kind)?;
        Ok(Self {
            kind,
            coefficients,
            scale_factor,
        })
    }

    pub const fn kind(&self) -> WindowType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    pub const fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    /// Elementwise multiply `input` by the window into `output`.
    pub fn apply(&self, input: &[f32], output: &mut [f32]) -> Result<(), ProcessingError> {
        for len in [input.len(), output.len()] {
            if len != self.coefficients.len() {
                return Err(ProcessingError::LengthMismatch {
                    expected: self.coefficients.len(),
                    actual: len,
                });
            }
        }
        for ((out, x), w) in output.iter_mut().zip(input).zip(&self.coefficients) {
            *out = x * w;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_WINDOWS: [WindowType; 4] = [
        WindowType::Rectangular,
        WindowType::Hanning,
        WindowType::Hamming,
        WindowType::FlatTop,
    ];

    #[test]
    fn test_scale_factors() {
        assert_eq!(WindowType::Rectangular.scale_factor(), 1.0);
        assert_eq!(WindowType::Hanning.scale_factor(), 2.0);
        assert_eq!(WindowType::Hamming.scale_factor(), 1.85);
        assert_eq!(WindowType::FlatTop.scale_factor(), 4.55);
    }

    #[test]
    fn test_dc_gain_normalized() {
        // The fixed flat-top factor (4.55) leaves about 2% residual gain error.
        for kind in ALL_WINDOWS {
            let table = WindowTable::new(kind, 512).unwrap();
            let sum: f32 = table.coefficients().iter().sum();
            let gain = sum / 512.0 * table.scale_factor();
            assert!((gain - 1.0).abs() < 0.025, "{kind}: DC gain {gain}");
        }
    }

    #[test]
    fn test_hanning_shape() {
        let table = WindowTable::new(WindowType::Hanning, 9).unwrap();
        let c = table.coefficients();
        assert!(c[0].abs() < 1e-7);
        assert!(c[8].abs() < 1e-7);
        assert!((c[4] - 1.0).abs() < 1e-6);
        // Symmetric
        for i in 0..9 {
            assert!((c[i] - c[8 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_hamming_endpoints() {
        let table = WindowTable::new(WindowType::Hamming, 16).unwrap();
        assert!((table.coefficients()[0] - 0.08).abs() < 1e-6);
        assert!((table.coefficients()[15] - 0.08).abs() < 1e-6);
    }

    #[test]
    fn test_flat_top_center_is_unity() {
        let table = WindowTable::new(WindowType::FlatTop, 33).unwrap();
        let center = table.coefficients()[16];
        assert!((center - 1.0).abs() < 1e-3, "center = {center}");
    }

    #[test]
    fn test_too_short_window_rejected() {
        let mut one = [0.0_f32; 1];
        assert_eq!(
            build_window(&mut one, WindowType::Hanning),
            Err(ProcessingError::WindowTooShort(1))
        );
        assert!(WindowTable::new(WindowType::Rectangular, 0).is_err());
    }

    #[test]
    fn test_apply_checks_lengths() {
        let table = WindowTable::new(WindowType::Rectangular, 4).unwrap();
        let mut out = [0.0; 4];
        table.apply(&[1.0, 2.0, 3.0, 4.0], &mut out).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
        assert!(table.apply(&[1.0, 2.0], &mut out).is_err());
    }
}
