mod simulate;

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use phasor_core::{estimate_phasors, synth, Capture, ChannelId, EstimationReport};
use pmu_station::{summarize, StationConfig};
use tokio::time::{self, MissedTickBehavior};

use simulate::DriftingSource;

#[derive(Debug, Parser)]
#[command(name = "pmu-estimate")]
#[command(about = "Synchrophasor estimation from sampled captures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Estimate every channel of a capture file and print the report as JSON.
    Estimate {
        /// Capture JSON; `-` reads stdin.
        #[arg(short, long)]
        input: PathBuf,
        /// Station config JSON; its estimator section is used.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print a synthetic capture as JSON.
    Synth {
        #[arg(long, default_value_t = 50.0)]
        frequency: f64,
        /// Phase of the first channel in degrees; further channels lag by 120° each.
        #[arg(long, default_value_t = 90.0)]
        phase: f64,
        #[arg(long, default_value_t = 1.0)]
        amplitude: f64,
        #[arg(long, default_value_t = 10_000.0)]
        sampling_frequency: f64,
        #[arg(long, default_value_t = 1600)]
        samples: usize,
        #[arg(long, value_delimiter = ',', default_value = "1,2,3")]
        channels: Vec<u16>,
        /// Linear frequency ramp, Hz/s.
        #[arg(long, default_value_t = 0.0)]
        ramp_hz_per_s: f64,
        #[arg(long, default_value_t = 50.0)]
        nominal: f64,
    },
    /// Run the trigger loop against a simulated converter.
    Watch {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many triggers.
        #[arg(long)]
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    match args.command {
        Commands::Estimate {
            input,
            config,
            pretty,
        } => estimate(&input, config.as_deref(), pretty),
        Commands::Synth {
            frequency,
            phase,
            amplitude,
            sampling_frequency,
            samples,
            channels,
            ramp_hz_per_s,
            nominal,
        } => {
            let signals = channels
                .iter()
                .enumerate()
                .map(|(position, &channel)| {
                    let phase = (phase - 120.0 * position as f64) * PI / 180.0;
                    let signal = synth::chirp(
                        frequency,
                        ramp_hz_per_s,
                        phase,
                        amplitude,
                        sampling_frequency,
                        samples,
                    );
                    (ChannelId::from(channel), signal)
                })
                .collect::<BTreeMap<_, _>>();
            let capture = Capture::new(sampling_frequency, nominal, samples, signals)?;
            println!("{}", serde_json::to_string(&capture)?);
            Ok(())
        }
        Commands::Watch {
            config,
            interval_ms,
            count,
        } => {
            if interval_ms == 0 {
                bail!("--interval-ms must be positive");
            }
            let config = load_config(config.as_deref())?;
            watch(config, Duration::from_millis(interval_ms), count).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<StationConfig> {
    match path {
        Some(path) => StationConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(StationConfig::default()),
    }
}

fn estimate(input: &Path, config: Option<&Path>, pretty: bool) -> Result<()> {
    let config = load_config(config)?;
    let text = if input == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("reading capture from stdin")?
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?
    };
    let capture: Capture = serde_json::from_str(&text).context("parsing capture")?;
    info!(
        "{} channels x {} samples at {} Hz ({:.3} s)",
        capture.channels().len(),
        capture.sample_count(),
        capture.sampling_frequency(),
        capture.duration_secs()
    );

    let report = estimate_phasors(&capture, &config.estimator);
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

/// One estimation per tick. A result not ready by the next tick is dropped;
/// the loop never queues work behind a slow trigger.
async fn watch(config: StationConfig, interval: Duration, count: Option<u64>) -> Result<()> {
    config.scan.validate()?;
    info!(
        "{}: channels {:?} at {} Hz, {} samples per trigger",
        config.name, config.scan.channels, config.scan.sampling_frequency, config.scan.samples_per_channel
    );

    let mut source = DriftingSource::new(config.scan.nominal_frequency, 5.0);
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut trigger = 0u64;
    while count.map_or(true, |n| trigger < n) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted after {trigger} triggers");
                break;
            }
        }
        trigger += 1;

        let raw = source.next_scan(&config.scan, interval.as_secs_f64())?;
        let scan = config.scan.clone();
        let estimator = config.estimator.clone();
        let job = tokio::task::spawn_blocking(move || -> Result<EstimationReport> {
            let capture = scan.decode(&raw)?;
            Ok(estimate_phasors(&capture, &estimator))
        });

        let report = match time::timeout(interval, job).await {
            Ok(joined) => joined.context("estimation task panicked")??,
            Err(_) => {
                warn!("trigger {trigger}: estimation missed its {interval:?} deadline, frame dropped");
                continue;
            }
        };

        match summarize(&report.estimates, config.scan.nominal_frequency) {
            Some(frame) => {
                let phases: Vec<String> = frame
                    .phasors
                    .iter()
                    .map(|p| format!("ch{} {:.3}@{}°", p.channel, p.amplitude, p.degrees))
                    .collect();
                info!(
                    "trigger {trigger}: df {:.4} Hz, rocof {:.5} Hz/s, {}",
                    frame.frequency_deviation,
                    frame.rocof,
                    phases.join(", ")
                );
            }
            None => warn!("trigger {trigger}: no channel produced an estimate"),
        }
    }
    Ok(())
}
