use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use keydetect::{AppConfig, ChromaClassifier, KeyDetector, KeyUpdate};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Upper bound on waiting for the analysis thread to drain
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(
    name = "keydetect_cli",
    about = "Stream audio files through the real-time key detector"
)]
struct Cli {
    /// JSON configuration file (defaults are used when missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect the key of a WAV file
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Analysis window in seconds (clamped to 1.0-8.0)
        #[arg(long)]
        window: Option<f32>,
        /// Frames per simulated audio callback
        #[arg(long)]
        block: Option<usize>,
        /// Pace blocks at the file's sample rate and let windows drop
        #[arg(long)]
        realtime: bool,
        /// Emit updates and the summary as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    input: &'a str,
    sample_rate: u32,
    window: f32,
    key: &'a str,
    stats: keydetect::StatsSnapshot,
}

fn main() -> ExitCode {
    keydetect::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_deref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Analyze {
            input,
            window,
            block,
            realtime,
            json,
        } => run_analyze(&config, &input, window, block, realtime, json),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn run_analyze(
    config: &AppConfig,
    input: &Path,
    window: Option<f32>,
    block: Option<usize>,
    realtime: bool,
    json: bool,
) -> Result<ExitCode> {
    let (stereo, sample_rate) = read_wav_stereo(input)?;

    let mut detector_config = config.detector.clone();
    if let Some(seconds) = window {
        detector_config.window_seconds = seconds;
    }
    let mut detector =
        KeyDetector::with_config(sample_rate, ChromaClassifier::default(), &detector_config)
            .with_context(|| format!("creating detector for {}", input.display()))?;
    let mut updates = detector.subscribe();

    let block_frames = block.unwrap_or(config.audio.block_frames).max(1);
    let block_duration = Duration::from_secs_f64(block_frames as f64 / sample_rate as f64);

    for chunk in stereo.chunks(block_frames * 2) {
        detector.feed(chunk);
        if realtime {
            thread::sleep(block_duration);
        } else {
            wait_for_idle(&detector)?;
        }
        print_updates(&mut updates, json)?;
    }

    wait_for_idle(&detector)?;
    print_updates(&mut updates, json)?;

    let input_name = input.display().to_string();
    let summary = Summary {
        input: &input_name,
        sample_rate,
        window: detector.window(),
        key: detector.current_key_display(),
        stats: detector.stats(),
    };
    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "{}: {} (windows: {} classified, {} silent, {} dropped)",
            summary.input,
            summary.key,
            summary.stats.windows_classified,
            summary.stats.silent_windows,
            summary.stats.windows_dropped
        );
    }

    Ok(ExitCode::from(0))
}

/// Block until no window is pending or being classified
fn wait_for_idle(detector: &KeyDetector) -> Result<()> {
    let started = Instant::now();
    while detector.has_pending_work() {
        if started.elapsed() > DRAIN_TIMEOUT {
            bail!("analysis thread did not drain within {:?}", DRAIN_TIMEOUT);
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn print_updates(updates: &mut broadcast::Receiver<KeyUpdate>, json: bool) -> Result<()> {
    loop {
        match updates.try_recv() {
            Ok(update) => {
                if json {
                    println!("{}", serde_json::to_string(&update)?);
                } else {
                    println!(
                        "window {:>4}: {:<7} -> {:<7} ({:.0}%)",
                        update.window_index,
                        update.raw,
                        update.displayed,
                        update.confidence * 100.0
                    );
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("[CLI] Skipped {} key updates", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

/// Decode a WAV file to interleaved 16-bit stereo
///
/// Accepts 8/16/24/32-bit integer or float samples.
///
/// Mono is duplicated to both channels; channels beyond the first two are
/// discarded.
fn read_wav_stereo(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        bail!("{} has no channels", path.display());
    }

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| {
                sample
                    .map(|value| (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .map_err(|err| anyhow!(err))
            })
            .collect::<Result<Vec<i16>>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|sample| {
                    sample
                        .map(|value| i16::from(value) << 8)
                        .map_err(|err| anyhow!(err))
                })
                .collect::<Result<Vec<i16>>>()?,
            16 => reader
                .samples::<i16>()
                .map(|sample| sample.map_err(|err| anyhow!(err)))
                .collect::<Result<Vec<i16>>>()?,
            bits @ (24 | 32) => {
                let shift = bits - 16;
                reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| (value >> shift) as i16)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<i16>>>()?
            }
            other => bail!(
                "Unsupported bits per sample {} in {}",
                other,
                path.display()
            ),
        },
    };

    let stereo = samples
        .chunks_exact(channels)
        .flat_map(|frame| {
            let left = frame[0];
            let right = if channels > 1 { frame[1] } else { frame[0] };
            [left, right]
        })
        .collect();

    Ok((stereo, spec.sample_rate))
}
