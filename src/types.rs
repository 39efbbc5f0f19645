//! Shared data structures for tri-axial vibration analysis
//!
//! This module defines the core types that flow through the engine:
//! - Axis / Triaxial: per-axis containers for samples, filter state and results
//! - Analysis options: window type, time-domain mode, averaging and DC-bin policies
//! - VibrationReport: the per-window outbound result (spectrum + time-domain scalars)

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use crate::config::defaults::{AVERAGING_SPECTRA_DEFAULT, DISPLAY_SCALE, STANDARD_GRAVITY};

// ============================================================================
// Axes
// ============================================================================

/// Accelerometer axis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in processing order.
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// One value per accelerometer axis.
///
/// Used for raw samples (`Triaxial<f32>`) as well as for per-axis filter
/// state, so that X/Y/Z never share recursive state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Triaxial<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Triaxial<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }

    /// Build each axis from a closure over the axis id.
    pub fn from_fn(mut f: impl FnMut(Axis) -> T) -> Self {
        Self {
            x: f(Axis::X),
            y: f(Axis::Y),
            z: f(Axis::Z),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Triaxial<U> {
        Triaxial {
            x: f(self.x),
            y: f(self.y),
            z: f(self.z),
        }
    }

    pub const fn as_ref(&self) -> Triaxial<&T> {
        Triaxial {
            x: &self.x,
            y: &self.y,
            z: &self.z,
        }
    }

    /// Iterate `(axis, value)` pairs in X, Y, Z order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &T)> {
        [(Axis::X, &self.x), (Axis::Y, &self.y), (Axis::Z, &self.z)].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Axis, &mut T)> {
        [
            (Axis::X, &mut self.x),
            (Axis::Y, &mut self.y),
            (Axis::Z, &mut self.z),
        ]
        .into_iter()
    }
}

impl<T: Clone> Triaxial<T> {
    /// Same value on every axis.
    pub fn splat(value: T) -> Self {
        Self {
            x: value.clone(),
            y: value.clone(),
            z: value,
        }
    }
}

impl<T> Index<Axis> for Triaxial<T> {
    type Output = T;

    fn index(&self, axis: Axis) -> &T {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

impl<T> IndexMut<Axis> for Triaxial<T> {
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }
}

/// Calibrated acceleration sample in m/s².
pub type Sample3 = Triaxial<f32>;

impl Sample3 {
    /// Convert a raw milli-g reading to m/s².
    pub fn from_milli_g(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z).map(|v| v * STANDARD_GRAVITY / 1000.0)
    }
}

/// Engineering unit of inbound samples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputUnit {
    /// Already calibrated to m/s²
    #[default]
    MetersPerSecondSquared,
    /// Raw sensor output in milli-g
    MilliG,
}

impl InputUnit {
    pub fn to_si(self, raw: Sample3) -> Sample3 {
        match self {
            InputUnit::MetersPerSecondSquared => raw,
            InputUnit::MilliG => Sample3::from_milli_g(raw.x, raw.y, raw.z),
        }
    }
}

// ============================================================================
// Analysis Options
// ============================================================================

/// Window function applied before the FFT
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Rectangular,
    #[default]
    Hanning,
    Hamming,
    FlatTop,
}

impl std::fmt::Display for WindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowType::Rectangular => write!(f, "rectangular"),
            WindowType::Hanning => write!(f, "hanning"),
            WindowType::Hamming => write!(f, "hamming"),
            WindowType::FlatTop => write!(f, "flat_top"),
        }
    }
}

impl FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rectangular" | "rect" | "none" => Ok(Self::Rectangular),
            "hanning" | "hann" => Ok(Self::Hanning),
            "hamming" => Ok(Self::Hamming),
            "flat_top" | "flattop" => Ok(Self::FlatTop),
            other => Err(format!(
                "unknown window '{other}' (expected rectangular, hanning, hamming or flat_top)"
            )),
        }
    }
}

/// Which time-domain pipelines run on each sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TdMode {
    /// Integrate to speed, remove DC, RMS the speed
    #[default]
    Speed,
    /// RMS of the raw acceleration
    Accelero,
    /// Both pipelines, independently
    Both,
}

impl TdMode {
    pub const fn tracks_speed(self) -> bool {
        matches!(self, TdMode::Speed | TdMode::Both)
    }

    pub const fn tracks_acceleration(self) -> bool {
        matches!(self, TdMode::Accelero | TdMode::Both)
    }
}

impl std::fmt::Display for TdMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TdMode::Speed => write!(f, "speed"),
            TdMode::Accelero => write!(f, "accelero"),
            TdMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for TdMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "speed" => Ok(Self::Speed),
            "accelero" | "acceleration" => Ok(Self::Accelero),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown time-domain mode '{other}' (expected speed, accelero or both)"
            )),
        }
    }
}

/// When an in-flight spectrum average is finalized
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AveragingPolicy {
    /// Complete after exactly `spectra` acquisitions.
    Count {
        #[serde(default = "default_spectra")]
        spectra: u16,
    },
    /// Complete when the external finish trigger fires (acquisition time elapsed).
    #[default]
    Time,
}

const fn default_spectra() -> u16 {
    AVERAGING_SPECTRA_DEFAULT
}

/// Treatment of bin 0 when rescaling an averaged spectrum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DcBinPolicy {
    /// Bin 0 divided by `2 * size`, so a DC input reads at its true level
    #[default]
    Halved,
    /// Bin 0 forced to zero
    Zeroed,
}

// ============================================================================
// Results
// ============================================================================

/// Maximum of a spectrum (or spectrum slice) and the absolute bin it sits in
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    pub value: f32,
    pub bin: usize,
}

/// Per-axis section of a [`VibrationReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisReport {
    /// Averaged one-sided magnitude spectrum (m/s²), limited to the usable bandwidth
    pub spectrum: Vec<f32>,
    pub peak: SpectralPeak,
    pub peak_frequency_hz: f32,
    /// Acceleration RMS (m/s²)
    pub acc_rms: f32,
    /// Peak |acceleration| since the last peak clear (m/s²)
    pub acc_peak: f32,
    /// Speed RMS (m/s)
    pub speed_rms: f32,
    /// Number of spectra that went into the average
    pub spectra_averaged: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subranges: Option<Vec<SpectralPeak>>,
}

/// Outbound result of one completed averaging window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibrationReport {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Monotonic report counter since engine creation
    pub sequence: u64,
    pub odr_hz: f32,
    pub fft_size: usize,
    pub bin_width_hz: f32,
    pub window: WindowType,
    pub axes: Triaxial<AxisReport>,
}

impl VibrationReport {
    /// Copy with all spectral magnitudes multiplied by the display scale (×1000).
    ///
    /// Time-domain scalars are left in engineering units.
    pub fn to_display_units(&self) -> Self {
        let mut scaled = self.clone();
        for (_, axis) in scaled.axes.iter_mut() {
            axis.spectrum.iter_mut().for_each(|m| *m *= DISPLAY_SCALE);
            axis.peak.value *= DISPLAY_SCALE;
            if let Some(ranges) = axis.subranges.as_mut() {
                ranges.iter_mut().for_each(|p| p.value *= DISPLAY_SCALE);
            }
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triaxial_index_matches_fields() {
        let mut t = Triaxial::new(1, 2, 3);
        assert_eq!(t[Axis::X], 1);
        assert_eq!(t[Axis::Y], 2);
        assert_eq!(t[Axis::Z], 3);
        t[Axis::Y] = 20;
        assert_eq!(t.y, 20);
    }

    #[test]
    fn test_triaxial_from_fn_and_iter_order() {
        let t = Triaxial::from_fn(|a| a.to_string());
        let order: Vec<Axis> = t.iter().map(|(a, _)| a).collect();
        assert_eq!(order, Axis::ALL.to_vec());
        assert_eq!(t.z, "Z");
    }

    #[test]
    fn test_milli_g_conversion() {
        let s = Sample3::from_milli_g(1000.0, -500.0, 0.0);
        assert!((s.x - 9.80665).abs() < 1e-5);
        assert!((s.y + 4.903_325).abs() < 1e-5);
        assert_eq!(s.z, 0.0);
        assert_eq!(InputUnit::MetersPerSecondSquared.to_si(s), s);
    }

    #[test]
    fn test_window_type_parsing() {
        assert_eq!("Hann".parse::<WindowType>(), Ok(WindowType::Hanning));
        assert_eq!("flat-top".parse::<WindowType>(), Ok(WindowType::FlatTop));
        assert!("kaiser".parse::<WindowType>().is_err());
    }

    #[test]
    fn test_td_mode_flags() {
        assert!(TdMode::Speed.tracks_speed());
        assert!(!TdMode::Speed.tracks_acceleration());
        assert!(TdMode::Both.tracks_speed() && TdMode::Both.tracks_acceleration());
        assert_eq!("ACCELERO".parse::<TdMode>(), Ok(TdMode::Accelero));
    }

    #[test]
    fn test_averaging_policy_toml_shape() {
        #[derive(Deserialize)]
        struct Wrapper {
            averaging: AveragingPolicy,
        }
        let w: Wrapper = toml::from_str("[averaging]\nmode = \"count\"\nspectra = 4\n").unwrap();
        assert_eq!(w.averaging, AveragingPolicy::Count { spectra: 4 });
        let w: Wrapper = toml::from_str("averaging = { mode = \"time\" }").unwrap();
        assert_eq!(w.averaging, AveragingPolicy::Time);
    }

    #[test]
    fn test_display_units_scale_spectrum_only() {
        let axis = AxisReport {
            spectrum: vec![0.001, 0.5],
            peak: SpectralPeak { value: 0.5, bin: 1 },
            peak_frequency_hz: 10.0,
            acc_rms: 0.3,
            acc_peak: 0.7,
            speed_rms: 0.01,
            spectra_averaged: 3,
            subranges: Some(vec![SpectralPeak { value: 0.5, bin: 1 }]),
        };
        let report = VibrationReport {
            timestamp: chrono::Utc::now(),
            sequence: 1,
            odr_hz: 100.0,
            fft_size: 4,
            bin_width_hz: 25.0,
            window: WindowType::Hanning,
            axes: Triaxial::splat(axis),
        };
        let scaled = report.to_display_units();
        assert!((scaled.axes.x.spectrum[0] - 1.0).abs() < 1e-6);
        assert!((scaled.axes.y.peak.value - 500.0).abs() < 1e-3);
        assert_eq!(scaled.axes.z.acc_rms, 0.3);
        assert!((scaled.axes.x.subranges.as_ref().unwrap()[0].value - 500.0).abs() < 1e-3);
    }
}
