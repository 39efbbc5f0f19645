//! Engine Configuration - analysis parameters as operator-tunable TOML values
//!
//! Each struct implements `Default` with the reference firmware defaults, so
//! a missing config file reproduces the stock behavior.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{
    ACQUISITION_TIME_DEFAULT_MS, DC_SMOOTH, FFT_OVERLAP_MAX_PERCENT, FFT_OVERLAP_MIN_PERCENT,
    FFT_SIZE_DEFAULT, FFT_SIZE_MAX, FFT_SIZE_MIN, INTEGRATION_GAMMA, ODR_DEFAULT_HZ,
    ODR_MEASUREMENT_SAMPLES, SUBRANGE_MAX, TAU_DEFAULT_MS,
};
use crate::processing::{FrequencySettings, TimeDomainSettings};
use crate::types::{AveragingPolicy, DcBinPolicy, InputUnit, TdMode, WindowType};

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "MOTIONSP_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "motion_sp.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration of a vibration analysis engine.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$MOTIONSP_CONFIG` env var
/// 2. `./motion_sp.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sample stream and acquisition window
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// FFT pipeline
    #[serde(default)]
    pub fft: FftConfig,

    /// Time-domain filters
    #[serde(default)]
    pub time_domain: TimeDomainConfig,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$MOTIONSP_CONFIG` environment variable
    /// 2. `./motion_sp.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), fft_size = config.fft.size, "Loaded engine config from MOTIONSP_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from MOTIONSP_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "MOTIONSP_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(fft_size = config.fft.size, "Loaded engine config from ./motion_sp.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./motion_sp.toml, using defaults");
                }
            }
        }

        info!("No motion_sp.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    ///
    /// Unknown keys and suspicious values are logged as warnings; impossible
    /// values fail with `ConfigError::Validation`.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;

        let (mut errors, warnings) = super::validation::validate_physical_ranges(&config);
        for w in &warnings {
            warn!(field = %w.field, "{}", w);
        }
        if let Err(ConfigError::Validation(mut structural)) = config.validate() {
            structural.append(&mut errors);
            errors = structural;
        }
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Validate all parameters for internal consistency.
    ///
    /// Rules:
    /// - FFT size is a power of two within the supported range
    /// - Count-based averaging needs at least one spectrum
    /// - Overlap, when enabled, lies in the supported percentage range
    /// - Sub-range count fits the one-sided spectrum and the sub-range maximum
    /// - Rates, time constants and filter constants are finite and in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();
        let a = &self.acquisition;
        let f = &self.fft;
        let t = &self.time_domain;

        if !f.size.is_power_of_two() || !(FFT_SIZE_MIN..=FFT_SIZE_MAX).contains(&f.size) {
            errors.push(format!(
                "fft.size = {} must be a power of two between {FFT_SIZE_MIN} and {FFT_SIZE_MAX}",
                f.size
            ));
        }
        if let AveragingPolicy::Count { spectra: 0 } = f.averaging {
            errors.push("fft.averaging.spectra must be >= 1".to_string());
        }
        if let Some(ovl) = f.overlap_percent {
            if !(FFT_OVERLAP_MIN_PERCENT..=FFT_OVERLAP_MAX_PERCENT).contains(&ovl) {
                errors.push(format!(
                    "fft.overlap_percent = {ovl} must be between {FFT_OVERLAP_MIN_PERCENT} and {FFT_OVERLAP_MAX_PERCENT}"
                ));
            }
        }
        if let Some(count) = f.subranges {
            let bins = f.size / 2;
            if count == 0 || count > SUBRANGE_MAX || count > bins {
                errors.push(format!(
                    "fft.subranges = {count} must be between 1 and {}",
                    SUBRANGE_MAX.min(bins.max(1))
                ));
            }
        }
        if let Some(bw) = f.bandwidth_hz {
            if !bw.is_finite() || bw <= 0.0 {
                errors.push(format!("fft.bandwidth_hz = {bw} must be a positive frequency"));
            }
        }

        check_positive(a.odr_hz, "acquisition.odr_hz", &mut errors);
        if a.acquisition_time_ms == 0 {
            errors.push("acquisition.acquisition_time_ms must be > 0".to_string());
        }
        if a.odr_measurement_samples < 2 {
            errors.push(format!(
                "acquisition.odr_measurement_samples = {} must be >= 2",
                a.odr_measurement_samples
            ));
        }

        check_positive(t.tau_ms, "time_domain.tau_ms", &mut errors);
        if !(t.dc_smooth > 0.0 && t.dc_smooth < 1.0) {
            errors.push(format!(
                "time_domain.dc_smooth = {} must be in (0, 1)",
                t.dc_smooth
            ));
        }
        if !(0.0..=1.0).contains(&t.integration_gamma) {
            errors.push(format!(
                "time_domain.integration_gamma = {} must be in [0, 1]",
                t.integration_gamma
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Frequency-domain slice of the configuration.
    pub const fn frequency_settings(&self) -> FrequencySettings {
        FrequencySettings {
            fft_size: self.fft.size,
            window: self.fft.window,
            averaging: self.fft.averaging,
            dc_bin: self.fft.dc_bin,
            subranges: self.fft.subranges,
            bandwidth_hz: self.fft.bandwidth_hz,
        }
    }

    /// Time-domain slice of the configuration.
    pub const fn time_domain_settings(&self) -> TimeDomainSettings {
        TimeDomainSettings {
            mode: self.time_domain.mode,
            dc_smooth: self.time_domain.dc_smooth,
            gamma: self.time_domain.integration_gamma,
        }
    }
}

fn check_positive(value: f32, name: &str, errors: &mut Vec<String>) {
    // NaN comparisons silently pass, so test finiteness first
    if !value.is_finite() || value <= 0.0 {
        errors.push(format!("{name} = {value} must be a finite value > 0"));
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Acquisition
// ============================================================================

/// Sample stream and acquisition window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Nominal output data rate (Hz), used until a measurement is available
    #[serde(default = "default_odr_hz")]
    pub odr_hz: f32,

    /// Length of one averaging window for time-based averaging (ms)
    #[serde(default = "default_acquisition_time_ms")]
    pub acquisition_time_ms: u64,

    /// Unit of inbound samples
    #[serde(default)]
    pub input_unit: InputUnit,

    /// High-pass each raw axis before it enters the circular buffer
    #[serde(default = "default_true")]
    pub remove_input_offset: bool,

    /// Derive the ODR from sample timestamps
    #[serde(default = "default_true")]
    pub measure_odr: bool,

    /// Samples per ODR measurement window
    #[serde(default = "default_odr_measurement_samples")]
    pub odr_measurement_samples: usize,
}

fn default_odr_hz() -> f32 {
    ODR_DEFAULT_HZ
}
fn default_acquisition_time_ms() -> u64 {
    ACQUISITION_TIME_DEFAULT_MS
}
fn default_true() -> bool {
    true
}
fn default_odr_measurement_samples() -> usize {
    ODR_MEASUREMENT_SAMPLES
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            odr_hz: default_odr_hz(),
            acquisition_time_ms: default_acquisition_time_ms(),
            input_unit: InputUnit::default(),
            remove_input_offset: true,
            measure_odr: true,
            odr_measurement_samples: default_odr_measurement_samples(),
        }
    }
}

// ============================================================================
// FFT
// ============================================================================

/// FFT pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FftConfig {
    /// Samples per FFT (power of two)
    #[serde(default = "default_fft_size")]
    pub size: usize,

    #[serde(default)]
    pub window: WindowType,

    /// Bin 0 rescale convention
    #[serde(default)]
    pub dc_bin: DcBinPolicy,

    /// Overlap between consecutive FFT windows (percent); off when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_percent: Option<u8>,

    /// Usable bandwidth (Hz); all bins when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_hz: Option<f32>,

    /// Number of sub-ranges for multi-band peak analysis; off when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subranges: Option<usize>,

    /// Averaging policy (`mode = "time"` or `mode = "count"` with `spectra`)
    #[serde(default)]
    pub averaging: AveragingPolicy,
}

fn default_fft_size() -> usize {
    FFT_SIZE_DEFAULT
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            size: default_fft_size(),
            window: WindowType::default(),
            dc_bin: DcBinPolicy::default(),
            overlap_percent: None,
            bandwidth_hz: None,
            subranges: None,
            averaging: AveragingPolicy::default(),
        }
    }
}

// ============================================================================
// Time Domain
// ============================================================================

/// Time-domain filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDomainConfig {
    #[serde(default)]
    pub mode: TdMode,

    /// RMS averaging time constant (ms)
    #[serde(default = "default_tau_ms")]
    pub tau_ms: f32,

    /// Smoothing constant of the DC-removal high-pass
    #[serde(default = "default_dc_smooth")]
    pub dc_smooth: f32,

    /// Trapezoidal integration blend
    #[serde(default = "default_integration_gamma")]
    pub integration_gamma: f32,

    /// Clear peak-hold after every emitted report
    #[serde(default)]
    pub reset_peak_each_report: bool,
}

fn default_tau_ms() -> f32 {
    TAU_DEFAULT_MS
}
fn default_dc_smooth() -> f32 {
    DC_SMOOTH
}
fn default_integration_gamma() -> f32 {
    INTEGRATION_GAMMA
}

impl Default for TimeDomainConfig {
    fn default() -> Self {
        Self {
            mode: TdMode::default(),
            tau_ms: default_tau_ms(),
            dc_smooth: default_dc_smooth(),
            integration_gamma: default_integration_gamma(),
            reset_peak_each_report: false,
        }
    }
}
