//! Accelerometer Vibration Simulation
//!
//! Generates synthetic tri-axial accelerometer samples for testing motion-sp:
//! - Per-axis sinusoidal tones (frequency and amplitude)
//! - Gaussian measurement noise
//! - Gravity offset on Z (exercises input offset removal)
//! - Timestamp jitter around the nominal output data rate
//!
//! # Usage
//! ```bash
//! ./simulation --odr 417 --tone x=50:1.0 --tone z=120:0.3 --seconds 20 | ./motion-sp --stdin
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use motion_sp::config::defaults::{ODR_DEFAULT_HZ, STANDARD_GRAVITY};
use motion_sp::pipeline::InputRecord;
use motion_sp::types::{Axis, Sample3, Triaxial};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "motion-sp-simulation")]
#[command(about = "Synthetic accelerometer data for motion-sp testing")]
#[command(version)]
struct Args {
    /// Output data rate (Hz)
    #[arg(long, default_value_t = ODR_DEFAULT_HZ)]
    odr: f32,

    /// Duration of generated data (seconds)
    #[arg(short, long, default_value = "10")]
    seconds: f32,

    /// Tone on one axis as AXIS=FREQ_HZ:AMPLITUDE (repeatable), e.g. x=50:1.0
    #[arg(long = "tone", value_parser = parse_tone)]
    tones: Vec<Tone>,

    /// Standard deviation of additive noise (m/s²)
    #[arg(long, default_value = "0.01")]
    noise: f32,

    /// Standard deviation of timestamp jitter (ms)
    #[arg(long, default_value = "0.0")]
    jitter_ms: f64,

    /// Add standard gravity to the Z axis
    #[arg(long)]
    gravity: bool,

    /// Emit an {"odr_hz": ...} record before the samples
    #[arg(long)]
    announce_odr: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Pace output in real time (1 = real-time, 10 = 10x faster, 0 = no pacing)
    #[arg(long, default_value = "0")]
    speed: u32,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the banner on stderr
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy)]
struct Tone {
    axis: Axis,
    frequency_hz: f32,
    amplitude: f32,
}

fn parse_tone(s: &str) -> Result<Tone, String> {
    let (axis, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("expected AXIS=FREQ:AMP, got '{s}'"))?;
    let axis = match axis.trim().to_ascii_lowercase().as_str() {
        "x" => Axis::X,
        "y" => Axis::Y,
        "z" => Axis::Z,
        other => return Err(format!("unknown axis '{other}'")),
    };
    let (freq, amp) = rest.split_once(':').unwrap_or((rest, "1.0"));
    let frequency_hz: f32 = freq
        .trim()
        .parse()
        .map_err(|e| format!("frequency '{freq}': {e}"))?;
    let amplitude: f32 = amp
        .trim()
        .parse()
        .map_err(|e| format!("amplitude '{amp}': {e}"))?;
    Ok(Tone {
        axis,
        frequency_hz,
        amplitude,
    })
}

// ============================================================================
// Signal Generator
// ============================================================================

struct SignalGenerator {
    rng: StdRng,
    odr: f32,
    tones: Vec<Tone>,
    noise: Option<Normal<f32>>,
    jitter: Option<Normal<f64>>,
    gravity: bool,
    index: u64,
    last_timestamp_ms: u64,
}

impl SignalGenerator {
    fn new(args: &Args) -> Result<Self> {
        let rng = match args.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let noise = (args.noise > 0.0)
            .then(|| Normal::new(0.0, args.noise))
            .transpose()
            .map_err(|e| anyhow!("invalid noise: {e}"))?;
        let jitter = (args.jitter_ms > 0.0)
            .then(|| Normal::new(0.0, args.jitter_ms))
            .transpose()
            .map_err(|e| anyhow!("invalid jitter: {e}"))?;
        Ok(Self {
            rng,
            odr: args.odr,
            tones: args.tones.clone(),
            noise,
            jitter,
            gravity: args.gravity,
            index: 0,
            last_timestamp_ms: 0,
        })
    }

    fn next_sample(&mut self) -> (u64, Sample3) {
        let t_s = self.index as f64 / f64::from(self.odr);
        let mut sample = Triaxial::splat(0.0f32);
        for tone in &self.tones {
            let phase = 2.0 * std::f64::consts::PI * f64::from(tone.frequency_hz) * t_s;
            sample[tone.axis] += tone.amplitude * phase.sin() as f32;
        }
        if self.gravity {
            sample.z += STANDARD_GRAVITY;
        }
        if let Some(noise) = self.noise {
            for (_, v) in sample.iter_mut() {
                *v += noise.sample(&mut self.rng);
            }
        }

        let jitter = self.jitter.map_or(0.0, |j| j.sample(&mut self.rng));
        let nominal_ms = (t_s * 1000.0 + jitter).round().max(0.0) as u64;
        // Timestamps never run backwards
        let timestamp_ms = nominal_ms.max(self.last_timestamp_ms);
        self.last_timestamp_ms = timestamp_ms;
        self.index += 1;
        (timestamp_ms, sample)
    }
}

fn log_banner(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    if !(args.odr.is_finite() && args.odr > 0.0) {
        return Err(anyhow!("--odr must be a positive frequency"));
    }

    let mut generator = SignalGenerator::new(&args)?;
    let total_samples = (args.seconds.max(0.0) * args.odr) as u64;
    let pacing = (args.speed > 0)
        .then(|| Duration::from_secs_f64(1.0 / (f64::from(args.odr) * f64::from(args.speed))));

    log_banner(&"=".repeat(60), args.quiet);
    log_banner("ACCELEROMETER VIBRATION SIMULATION", args.quiet);
    log_banner(&format!("  ODR: {:.1} Hz | {total_samples} samples", args.odr), args.quiet);
    for tone in &args.tones {
        log_banner(
            &format!("  Tone {}: {:.1} Hz @ {:.3} m/s²", tone.axis, tone.frequency_hz, tone.amplitude),
            args.quiet,
        );
    }
    log_banner(&format!("  Noise σ: {} m/s² | Jitter σ: {} ms", args.noise, args.jitter_ms), args.quiet);
    if let Some(seed) = args.seed {
        log_banner(&format!("  Random seed: {seed}"), args.quiet);
    }
    log_banner(&"=".repeat(60), args.quiet);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.format {
        Format::Json if args.announce_odr => {
            let record = InputRecord::Odr { odr_hz: args.odr };
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        }
        Format::Json => {}
        Format::Csv => writeln!(out, "t_ms,x,y,z")?,
    }

    let start = Instant::now();
    for n in 0..total_samples {
        let (t_ms, s) = generator.next_sample();
        match args.format {
            Format::Json => {
                let record = InputRecord::Sample {
                    t_ms: Some(t_ms),
                    x: s.x,
                    y: s.y,
                    z: s.z,
                };
                writeln!(out, "{}", serde_json::to_string(&record)?)?;
            }
            Format::Csv => writeln!(out, "{t_ms},{:.6},{:.6},{:.6}", s.x, s.y, s.z)?,
        }

        if let Some(interval) = pacing {
            out.flush()?;
            let due = interval.mul_f64((n + 1) as f64);
            if let Some(wait) = due.checked_sub(start.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    }
    out.flush()?;

    log_banner(
        &format!("SIMULATION COMPLETE: {total_samples} samples in {:.1}s", start.elapsed().as_secs_f64()),
        args.quiet,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tone() {
        let tone = parse_tone("X=50:0.5").unwrap();
        assert_eq!(tone.axis, Axis::X);
        assert!((tone.frequency_hz - 50.0).abs() < f32::EPSILON);
        assert!((tone.amplitude - 0.5).abs() < f32::EPSILON);
        assert!((parse_tone("z=10").unwrap().amplitude - 1.0).abs() < f32::EPSILON);
        assert!(parse_tone("w=10:1").is_err());
        assert!(parse_tone("x10").is_err());
    }

    #[test]
    fn test_seeded_generator_is_reproducible() {
        let args = Args::parse_from(["simulation", "--seed", "7", "--jitter-ms", "0.3", "--tone", "y=20:1"]);
        let mut a = SignalGenerator::new(&args).unwrap();
        let mut b = SignalGenerator::new(&args).unwrap();
        let mut last = 0;
        for _ in 0..100 {
            let (ta, sa) = a.next_sample();
            let (tb, sb) = b.next_sample();
            assert_eq!(ta, tb);
            assert_eq!(sa, sb);
            assert!(ta >= last);
            last = ta;
        }
    }
}
