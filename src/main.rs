//! motion-sp - vibration analysis for tri-axial accelerometer streams
//!
//! Reads accelerometer samples, runs the time-domain and FFT pipelines and
//! writes one JSON report per completed averaging window to stdout. Logs go
//! to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Live or simulated samples on stdin (JSON lines)
//! simulation --tone x=50:1.0 | motion-sp --stdin
//!
//! # Replay a recorded CSV (t_ms,x,y,z)
//! motion-sp --csv capture.csv --fft-size 512 --window flat_top
//!
//! # Show the effective configuration
//! motion-sp --config motion_sp.toml print-config
//! ```
//!
//! # Environment Variables
//!
//! - `MOTIONSP_CONFIG`: Path to the engine config TOML
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use motion_sp::config::defaults::{AVERAGING_SPECTRA_DEFAULT, SUBRANGE_DEFAULT};
use motion_sp::config::EngineConfig;
use motion_sp::pipeline::{JsonLinesSink, ProcessingLoop, ReplaySource, SampleSource, StdinSource};
use motion_sp::types::{AveragingPolicy, TdMode, WindowType};
use motion_sp::MotionSpEngine;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "motion-sp")]
#[command(about = "Vibration analysis for tri-axial accelerometer streams")]
#[command(version)]
struct CliArgs {
    /// Read JSON-lines samples from stdin (default input)
    #[arg(long, conflicts_with = "csv")]
    stdin: bool,

    /// Replay samples from a CSV file (t_ms,x,y,z)
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Delay between replayed samples (ms, 0 = as fast as possible)
    #[arg(long, default_value = "0")]
    replay_delay_ms: u64,

    /// Engine config TOML (overrides MOTIONSP_CONFIG and ./motion_sp.toml)
    #[arg(short, long, value_name = "PATH", env = "MOTIONSP_CONFIG")]
    config: Option<PathBuf>,

    /// FFT size (power of two, 16-2048)
    #[arg(long)]
    fft_size: Option<usize>,

    /// FFT window: rectangular, hanning, hamming, flat_top
    #[arg(long)]
    window: Option<WindowType>,

    /// Time-domain mode: speed, accelero, both
    #[arg(long)]
    mode: Option<TdMode>,

    /// RMS time constant (ms)
    #[arg(long)]
    tau_ms: Option<f32>,

    /// Time-based averaging window (ms)
    #[arg(long)]
    acquisition_ms: Option<u64>,

    /// Average a fixed number of spectra per report instead of a time window
    /// (bare flag: 8)
    #[arg(long, value_name = "COUNT")]
    spectra: Option<Option<u16>>,

    /// Number of sub-ranges for multi-band peak analysis (bare flag: 8)
    #[arg(long, value_name = "COUNT")]
    subranges: Option<Option<usize>>,

    /// FFT overlap (percent, 5-70)
    #[arg(long)]
    overlap: Option<u8>,

    /// Emit spectra in m/s² instead of display units (x1000)
    #[arg(long)]
    raw_units: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Print the effective configuration as TOML and exit
    PrintConfig,
}

impl CliArgs {
    fn apply_overrides(&self, config: &mut EngineConfig) {
        if let Some(size) = self.fft_size {
            config.fft.size = size;
        }
        if let Some(window) = self.window {
            config.fft.window = window;
        }
        if let Some(mode) = self.mode {
            config.time_domain.mode = mode;
        }
        if let Some(tau) = self.tau_ms {
            config.time_domain.tau_ms = tau;
        }
        if let Some(ms) = self.acquisition_ms {
            config.acquisition.acquisition_time_ms = ms;
        }
        if let Some(spectra) = self.spectra {
            config.fft.averaging = AveragingPolicy::Count {
                spectra: spectra.unwrap_or(AVERAGING_SPECTRA_DEFAULT),
            };
        }
        if let Some(count) = self.subranges {
            config.fft.subranges = Some(count.unwrap_or(SUBRANGE_DEFAULT));
        }
        if let Some(ovl) = self.overlap {
            config.fft.overlap_percent = Some(ovl);
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &CliArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load(),
    };
    args.apply_overrides(&mut config);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;
    Ok(config)
}

async fn run<S: SampleSource>(
    source: &mut S,
    config: EngineConfig,
    display_units: bool,
    cancel_token: CancellationToken,
) -> Result<()> {
    let measure = config
        .acquisition
        .measure_odr
        .then_some(config.acquisition.odr_measurement_samples);
    let engine = MotionSpEngine::new(config).context("Failed to build engine")?;
    let sink = JsonLinesSink::new(std::io::stdout());

    let mut pipeline =
        ProcessingLoop::new(engine, sink, cancel_token).with_display_units(display_units);
    if let Some(window) = measure {
        pipeline = pipeline.with_odr_measurement(window);
    }
    let (stats, _, _) = pipeline.run(source).await?;
    info!(
        samples = stats.samples_processed,
        reports = stats.reports_emitted,
        "Processing finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = load_config(&args)?;

    if let Some(SubCommand::PrintConfig) = args.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  motion-sp v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "  FFT {} / {} / {} | TD {} | tau {} ms",
        config.fft.size,
        config.fft.window,
        match config.fft.averaging {
            AveragingPolicy::Time => format!("{} ms window", config.acquisition.acquisition_time_ms),
            AveragingPolicy::Count { spectra } => format!("{spectra} spectra"),
        },
        config.time_domain.mode,
        config.time_domain.tau_ms
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if let Some(path) = &args.csv {
        info!(path = %path.display(), "Input: CSV replay");
        let mut source = ReplaySource::from_csv(path, args.replay_delay_ms)?;
        run(&mut source, config, !args.raw_units, cancel_token).await?;
    } else {
        info!("Input: stdin (JSON lines)");
        let mut source = StdinSource::new();
        run(&mut source, config, !args.raw_units, cancel_token).await?;
    }

    info!("motion-sp shutdown complete");
    Ok(())
}
