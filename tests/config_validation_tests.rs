//! Config Validation Tests
//!
//! Typo detection, physical range checks and file round-trips for the
//! engine configuration, exercised independently from the signal pipeline.

use std::io::Write;

use motion_sp::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use motion_sp::config::{ConfigError, EngineConfig};
use motion_sp::types::{AveragingPolicy, DcBinPolicy, InputUnit, TdMode, WindowType};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_fft_key_warns_with_suggestion() {
    let toml_str = r#"
[fft]
windw = "hamming"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("windw"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("fft.window"));
    assert!(warnings[0].to_string().contains("did you mean 'fft.window'"));
}

#[test]
fn typo_in_nested_averaging_table_warns() {
    let toml_str = r#"
[fft.averaging]
mode = "count"
spectr = 4
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("fft.averaging.spectra")
    );
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[acquisition]
odr_hz = 833.0
acquisition_time_ms = 2000
input_unit = "milli_g"
remove_input_offset = true
measure_odr = false
odr_measurement_samples = 200

[fft]
size = 512
window = "flat_top"
dc_bin = "zeroed"
overlap_percent = 50
bandwidth_hz = 200.0
subranges = 16

[fft.averaging]
mode = "count"
spectra = 8

[time_domain]
mode = "both"
tau_ms = 100.0
dc_smooth = 0.98
integration_gamma = 0.5
reset_peak_each_report = true
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
    let config = EngineConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.acquisition.input_unit, InputUnit::MilliG);
    assert_eq!(config.fft.window, WindowType::FlatTop);
    assert_eq!(config.fft.dc_bin, DcBinPolicy::Zeroed);
    assert_eq!(config.fft.averaging, AveragingPolicy::Count { spectra: 8 });
    assert_eq!(config.time_domain.mode, TdMode::Both);
    assert!(config.time_domain.reset_peak_each_report);
}

#[test]
fn unknown_section_warns() {
    let warnings = validate_unknown_keys("[wireless]\nchannel = 6\n");
    assert_eq!(warnings.len(), 2, "section and its key are both unknown");
}

#[test]
fn empty_toml_produces_zero_warnings() {
    assert!(validate_unknown_keys("").is_empty());
}

#[test]
fn known_keys_cover_every_section() {
    let keys = known_config_keys();
    for key in [
        "acquisition.odr_hz",
        "fft.size",
        "fft.averaging.spectra",
        "time_domain.tau_ms",
    ] {
        assert!(keys.contains(key), "missing {key}");
    }
}

#[test]
fn suggest_correction_returns_none_for_garbage() {
    let keys = known_config_keys();
    assert_eq!(suggest_correction("zzzzzzzzzzzzzzzzzz", &keys), None);
    assert_eq!(
        suggest_correction("time_domain.tau", &keys).as_deref(),
        Some("time_domain.tau_ms")
    );
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn non_power_of_two_fft_size_is_error() {
    let err = EngineConfig::from_toml_str("[fft]\nsize = 1000\n").unwrap_err();
    match err {
        ConfigError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.contains("fft.size")), "{errors:?}");
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn oversized_fft_is_error() {
    assert!(EngineConfig::from_toml_str("[fft]\nsize = 4096\n").is_err());
}

#[test]
fn zero_spectra_count_is_error() {
    let toml_str = "[fft.averaging]\nmode = \"count\"\nspectra = 0\n";
    assert!(matches!(
        EngineConfig::from_toml_str(toml_str),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn too_many_subranges_is_error() {
    // 16-point FFT has 8 one-sided bins
    let toml_str = "[fft]\nsize = 16\nsubranges = 9\n";
    assert!(EngineConfig::from_toml_str(toml_str).is_err());
}

#[test]
fn impossible_odr_is_error() {
    assert!(EngineConfig::from_toml_str("[acquisition]\nodr_hz = 500000.0\n").is_err());
}

#[test]
fn bandwidth_above_nyquist_is_warning_only() {
    let mut config = EngineConfig::default();
    config.acquisition.odr_hz = 400.0;
    config.fft.bandwidth_hz = Some(300.0);
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "fft.bandwidth_hz"));
    assert!(config.validate().is_ok());
}

#[test]
fn short_acquisition_window_is_warning() {
    let mut config = EngineConfig::default();
    // 1024 samples at 417 Hz is ~2.5 s
    config.acquisition.acquisition_time_ms = 1000;
    let (_, warnings) = validate_physical_ranges(&config);
    assert!(warnings
        .iter()
        .any(|w| w.field == "acquisition.acquisition_time_ms"));
}

#[test]
fn all_defaults_pass_validation() {
    let config = EngineConfig::default();
    assert!(config.validate().is_ok());
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.is_empty(), "{warnings:?}");
}

// ============================================================================
// File Round-Trips
// ============================================================================

#[test]
fn config_file_roundtrip_preserves_values() {
    let mut config = EngineConfig::default();
    config.fft.size = 256;
    config.fft.window = WindowType::Hamming;
    config.fft.overlap_percent = Some(25);
    config.time_domain.mode = TdMode::Accelero;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("motion_sp.toml");
    config.save_to_file(&path).unwrap();
    let loaded = EngineConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn malformed_file_reports_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[fft\nsize = ").unwrap();
    match EngineConfig::load_from_file(file.path()) {
        Err(ConfigError::Parse(path, _)) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = EngineConfig::load_from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_, _))));
}

#[test]
fn old_keys_still_load_with_warning() {
    let toml_str = r#"
[fft]
size = 512
legacy_scale = 2.0
"#;
    assert_eq!(validate_unknown_keys(toml_str).len(), 1);
    let config = EngineConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.fft.size, 512);
}
