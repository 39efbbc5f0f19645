//! Sample source abstraction for accelerometer data ingestion.
//!
//! Provides a unified trait for reading samples from different sources:
//! stdin (JSON lines, live or simulated) and preloaded records (CSV replay).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::types::Sample3;

/// One accelerometer sample with its optional acquisition timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    /// Sensor timestamp (ms); the loop synthesizes one from the ODR when absent
    pub timestamp_ms: Option<u64>,
    pub sample: Sample3,
}

/// Events produced by a sample source.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// A sample was read.
    Sample(TimedSample),
    /// The producer announced its output data rate.
    OdrUpdate(f32),
    /// Source reached end of data.
    Eof,
}

/// Wire shape of one input line.
///
/// ```text
/// {"t_ms": 12, "x": 0.01, "y": -0.02, "z": 9.81}
/// {"odr_hz": 833.0}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputRecord {
    Odr {
        odr_hz: f32,
    },
    Sample {
        #[serde(default, alias = "t", skip_serializing_if = "Option::is_none")]
        t_ms: Option<u64>,
        x: f32,
        y: f32,
        z: f32,
    },
}

impl From<InputRecord> for SampleEvent {
    fn from(record: InputRecord) -> Self {
        match record {
            InputRecord::Odr { odr_hz } => Self::OdrUpdate(odr_hz),
            InputRecord::Sample { t_ms, x, y, z } => Self::Sample(TimedSample {
                timestamp_ms: t_ms,
                sample: Sample3::new(x, y, z),
            }),
        }
    }
}

/// Trait abstracting where samples come from.
///
/// Implementations handle format parsing and pacing internally.
/// The processing loop calls [`next_event`](SampleSource::next_event) in a
/// select! with cancellation.
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Read the next event from the source.
    ///
    /// Returns `SampleEvent::Eof` when no more data is available.
    /// Returns `Err` on unrecoverable I/O errors.
    async fn next_event(&mut self) -> Result<SampleEvent>;

    /// Human-readable name for logging (e.g. "replay", "stdin").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Replay Source (preloaded records / CSV file)
// ============================================================================

/// Replays preloaded events with optional inter-event delay.
pub struct ReplaySource {
    events: std::vec::IntoIter<SampleEvent>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(events: Vec<SampleEvent>, delay_ms: u64) -> Self {
        Self {
            events: events.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    /// Load a `t_ms,x,y,z` CSV file.
    pub fn from_csv(path: &Path, delay_ms: u64) -> Result<Self> {
        let samples = read_csv_samples(path)?;
        Ok(Self::new(
            samples.into_iter().map(SampleEvent::Sample).collect(),
            delay_ms,
        ))
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn next_event(&mut self) -> Result<SampleEvent> {
        // No delay before the first event
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.events.next() {
            Some(e) => {
                self.yielded_first = true;
                Ok(e)
            }
            None => Ok(SampleEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

/// Read accelerometer samples from a CSV file.
///
/// Expected format: `t_ms,x,y,z` (header optional). A three-column file
/// (`x,y,z`) is accepted and yields samples without timestamps.
/// Malformed lines are logged and skipped.
pub fn read_csv_samples(path: &Path) -> Result<Vec<TimedSample>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open CSV file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut samples = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_num = idx + 1;
        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(line = line_num, error = %e, "Error reading CSV line");
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        // Header line
        if line_num == 1 && trimmed.chars().next().is_some_and(char::is_alphabetic) {
            continue;
        }

        match parse_csv_line(trimmed) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                tracing::warn!(line = line_num, error = %e, "Error parsing CSV line");
            }
        }
    }

    tracing::info!(count = samples.len(), path = %path.display(), "Loaded samples from CSV");
    Ok(samples)
}

fn parse_csv_line(line: &str) -> Result<TimedSample, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let (timestamp_ms, axes) = match fields.as_slice() {
        [t, x, y, z] => (
            Some(t.parse::<u64>().map_err(|e| format!("t_ms '{t}': {e}"))?),
            [*x, *y, *z],
        ),
        [x, y, z] => (None, [*x, *y, *z]),
        other => return Err(format!("Expected 3 or 4 fields, got {}", other.len())),
    };
    let mut values = [0.0f32; 3];
    for (slot, (raw, name)) in values.iter_mut().zip(axes.iter().zip(["x", "y", "z"])) {
        *slot = raw.parse().map_err(|e| format!("{name} '{raw}': {e}"))?;
    }
    Ok(TimedSample {
        timestamp_ms,
        sample: Sample3::new(values[0], values[1], values[2]),
    })
}

// ============================================================================
// Stdin Source (JSON lines)
// ============================================================================

/// Reads JSON-formatted samples from stdin, one record per line.
///
/// Used with the simulation harness:
/// `simulation --tone x=50:1.0 | motion-sp --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(256),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for StdinSource {
    async fn next_event(&mut self) -> Result<SampleEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<InputRecord>(line) {
                Ok(record) => return Ok(record.into()),
                Err(e) => {
                    // Skip malformed lines and keep reading
                    tracing::warn!(error = %e, "[StdinSource] Failed to parse record");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}
