//! Checks on an `EngineConfig` beyond what serde enforces.
//!
//! - Keys outside `[acquisition]`, `[fft]`, `[fft.averaging]` and
//!   `[time_domain]` produce warnings, with the nearest known key as a hint
//!   when one is within three edits. They are ignored on load.
//! - Physical plausibility: ODR against MEMS accelerometer limits, the RMS
//!   time constant against the sample period, the acquisition window
//!   against one FFT frame, and the usable bandwidth against Nyquist.

use std::collections::HashSet;

use super::defaults::FFT_SIZE_MAX;
use super::EngineConfig;
use crate::types::AveragingPolicy;

/// Highest output data rate of any supported MEMS accelerometer (Hz).
const ODR_PHYSICAL_MAX_HZ: f32 = 100_000.0;

/// Typical accelerometer ODR range (Hz).
const ODR_TYPICAL_MIN_HZ: f32 = 1.6;
const ODR_TYPICAL_MAX_HZ: f32 = 26_667.0;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for EngineConfig.
///
/// Maintained by hand to match the struct hierarchy in engine_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [acquisition]
        "acquisition",
        "acquisition.odr_hz",
        "acquisition.acquisition_time_ms",
        "acquisition.input_unit",
        "acquisition.remove_input_offset",
        "acquisition.measure_odr",
        "acquisition.odr_measurement_samples",
        // [fft]
        "fft",
        "fft.size",
        "fft.window",
        "fft.dc_bin",
        "fft.overlap_percent",
        "fft.bandwidth_hz",
        "fft.subranges",
        // [fft.averaging]
        "fft.averaging",
        "fft.averaging.mode",
        "fft.averaging.spectra",
        // [time_domain]
        "time_domain",
        "time_domain.mode",
        "time_domain.tau_ms",
        "time_domain.dc_smooth",
        "time_domain.integration_gamma",
        "time_domain.reset_peak_each_report",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Dotted paths of every table and key in `value`, parents before children.
///
/// `[fft.averaging] mode = "count"` yields `fft`, `fft.averaging`,
/// `fft.averaging.mode`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        collect_keys(table, prefix, &mut keys);
    }
    keys
}

fn collect_keys(table: &toml::Table, prefix: &str, out: &mut Vec<String>) {
    for (name, child) in table {
        let path = match prefix {
            "" => name.clone(),
            _ => format!("{prefix}.{name}"),
        };
        match child.as_table() {
            Some(nested) => {
                out.push(path.clone());
                collect_keys(nested, &path, out);
            }
            None => out.push(path),
        }
    }
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Edit distance (insert, delete, substitute) between two keys.
fn levenshtein(a: &str, b: &str) -> usize {
    let target: Vec<char> = b.chars().collect();
    // row[j] = distance between the consumed prefix of `a` and target[..j]
    let mut row: Vec<usize> = (0..=target.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in target.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[target.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new(); // parse errors are reported by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed EngineConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(config: &EngineConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let odr = config.acquisition.odr_hz;
    if odr > ODR_PHYSICAL_MAX_HZ {
        errors.push(format!(
            "acquisition.odr_hz = {odr:.1} exceeds any accelerometer output data rate ({ODR_PHYSICAL_MAX_HZ} Hz)"
        ));
    } else if odr > 0.0 && !(ODR_TYPICAL_MIN_HZ..=ODR_TYPICAL_MAX_HZ).contains(&odr) {
        warnings.push(ValidationWarning {
            field: "acquisition.odr_hz".to_string(),
            message: format!(
                "odr_hz = {odr:.1} is outside the typical range ({ODR_TYPICAL_MIN_HZ}-{ODR_TYPICAL_MAX_HZ} Hz)"
            ),
            suggestion: None,
        });
    }

    if odr > 0.0 && odr.is_finite() {
        let period_ms = 1000.0 / odr;

        // Fewer than ~2 samples per time constant leaves the RMS unsmoothed
        let tau = config.time_domain.tau_ms;
        if tau > 0.0 && tau < 2.0 * period_ms {
            warnings.push(ValidationWarning {
                field: "time_domain.tau_ms".to_string(),
                message: format!(
                    "tau_ms = {tau:.1} is shorter than two sample periods ({:.1} ms)",
                    2.0 * period_ms
                ),
                suggestion: None,
            });
        }

        // Time-based averaging over less than one FFT frame averages a single spectrum
        let frame_ms = config.fft.size.min(FFT_SIZE_MAX) as f32 * period_ms;
        if config.fft.averaging == AveragingPolicy::Time
            && (config.acquisition.acquisition_time_ms as f32) < frame_ms
        {
            warnings.push(ValidationWarning {
                field: "acquisition.acquisition_time_ms".to_string(),
                message: format!(
                    "acquisition_time_ms = {} is shorter than one FFT frame ({frame_ms:.0} ms); each report averages a single spectrum",
                    config.acquisition.acquisition_time_ms
                ),
                suggestion: None,
            });
        }

        if let Some(bw) = config.fft.bandwidth_hz {
            let nyquist = odr / 2.0;
            if bw > nyquist {
                warnings.push(ValidationWarning {
                    field: "fft.bandwidth_hz".to_string(),
                    message: format!(
                        "bandwidth_hz = {bw:.1} is above Nyquist ({nyquist:.1} Hz); the full spectrum is used"
                    ),
                    suggestion: None,
                });
            }
        }
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
