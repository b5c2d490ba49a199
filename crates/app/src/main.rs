mod signal;
mod spectrum;

use std::path::PathBuf;

use beat_detect_core::{BandEnergySource, BeatDetect, EngineConfig, PcmBlock, WindowedEnergy};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::{signal::SyntheticSignal, spectrum::SpectrumEnergy};

const SAMPLE_RATE: u32 = 44_100;
const BLOCK_SIZE: usize = 512;

fn main() -> beat_detect_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            frames,
            sensitivity,
            source,
            every,
            bpm,
        } => {
            let mut config = match config {
                Some(path) => EngineConfig::load(path)?,
                None => EngineConfig::default(),
            };
            if every == 0 {
                return Err("--every must be at least 1".into());
            }
            if let Some(sensitivity) = sensitivity {
                config.beat_sensitivity = sensitivity;
            }
            let options = RunOptions {
                frames,
                every,
                bpm,
            };

            match source {
                SourceKind::Windowed => run(WindowedEnergy::new(), &config, &options),
                SourceKind::Spectrum => run(
                    SpectrumEnergy::new(BLOCK_SIZE, SAMPLE_RATE),
                    &config,
                    &options,
                ),
            }
        }
        Commands::Config => {
            println!("{}", EngineConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

struct RunOptions {
    frames: u64,
    every: u64,
    bpm: f32,
}

fn run<S: BandEnergySource>(
    source: S,
    config: &EngineConfig,
    options: &RunOptions,
) -> beat_detect_core::Result<()> {
    tracing::info!(
        frames = options.frames,
        bpm = options.bpm,
        sensitivity = config.beat_sensitivity,
        "driving beat detector with synthetic signal"
    );

    let mut engine = BeatDetect::with_config(source, config)?;
    let mut signal = SyntheticSignal::new(SAMPLE_RATE, options.bpm);
    let mut left = vec![0.0; BLOCK_SIZE];
    let mut right = vec![0.0; BLOCK_SIZE];

    for tick in 0..options.frames {
        signal.fill(&mut left, &mut right);
        let frame = engine.tick(&PcmBlock::new(&left, &right));

        if tick % options.every == 0 {
            let record = serde_json::json!({
                "tick": tick,
                "pcm_scale": engine.pcm_scale(),
                "bass_pulse": frame.bass_pulse(),
                "mid_pulse": frame.mid_pulse(),
                "treb_pulse": frame.treb_pulse(),
                "frame": frame,
            });
            println!("{record}");
        }
    }

    tracing::info!(state = ?engine.state(), ticks = engine.ticks(), "run finished");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time beat detection for visualisers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the engine with a synthetic signal and print frames as JSON lines.
    Run {
        /// Engine configuration file (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of blocks to process.
        #[arg(short, long, default_value_t = 430)]
        frames: u64,
        /// Overrides the configured beat sensitivity.
        #[arg(short, long)]
        sensitivity: Option<f32>,
        /// Band energy source used to analyse each block.
        #[arg(long, value_enum, default_value_t = SourceKind::Windowed)]
        source: SourceKind,
        /// Print every n-th frame.
        #[arg(short, long, default_value_t = 1)]
        every: u64,
        /// Tempo of the synthetic kick.
        #[arg(long, default_value_t = 120.0)]
        bpm: f32,
    },
    /// Print the default engine configuration.
    Config,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Time-domain windows, no transform.
    Windowed,
    /// Log-spaced FFT bands.
    Spectrum,
}
