//! Venturi CLI - adaptive self-tuning optimizer.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use venturi_control::AdaptiveBatchController;
use venturi_core::{Observation, VenturiConfig};
use venturi_execution::JsonFileTarget;
use venturi_reflection::{EnvironmentContext, LearnerSnapshot};
use venturi_runtime::{Optimizer, SNAPSHOT_KEY};
use venturi_storage::{Bucket, JsonStorage, StorageExt};

#[derive(Parser)]
#[command(name = "venturi")]
#[command(about = "Adaptive self-tuning optimizer", long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for optimizer history
    #[arg(long, global = true, default_value = ".venturi")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a latency series through the batch controller
    SimulateController {
        /// Comma-separated latencies in milliseconds
        #[arg(long, value_delimiter = ',')]
        latencies: Vec<f64>,
        /// File with one latency per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Run the optimizer against a directory of JSON area documents
    Run {
        /// Target directory (one `<area>.json` per area)
        #[arg(long)]
        target: PathBuf,
        /// Telemetry file: JSON array of observations
        #[arg(long)]
        telemetry: Option<PathBuf>,
        /// Latency target for learning; defaults to the controller target
        #[arg(long)]
        target_latency_ms: Option<f64>,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Show deployments, manual review and learner state
    Status,
    /// Print the effective configuration
    Config {
        /// Only validate, print nothing on success
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::SimulateController { latencies, file } => {
            let mut series = latencies;
            if let Some(path) = file {
                series.extend(read_latencies(&path)?);
            }
            anyhow::ensure!(!series.is_empty(), "no latencies given (use --latencies or --file)");
            simulate(&config, &series);
        }
        Commands::Run {
            target,
            telemetry,
            target_latency_ms,
            once,
        } => {
            let adapter = Arc::new(JsonFileTarget::open(&target).await?);
            let storage = Arc::new(JsonStorage::new(&cli.data_dir).await?);
            let mut optimizer = Optimizer::init(config, adapter, storage).await?;

            let context = match target_latency_ms {
                Some(ms) => EnvironmentContext::new(ms),
                None => optimizer.default_context(),
            };
            context.validate()?;

            if let Some(path) = telemetry {
                let observations = read_telemetry(&path)?;
                let mut rejected = 0;
                for observation in observations {
                    if optimizer.observe(observation).is_err() {
                        rejected += 1;
                    }
                }
                if rejected > 0 {
                    info!("Rejected {} malformed observation(s)", rejected);
                }
            }

            if once {
                let report = optimizer.run_cycle(&context).await;
                println!("{}", serde_json::to_string_pretty(&report)?);
                optimizer.shutdown().await?;
            } else {
                optimizer.spawn(context)?;
                info!(
                    "Optimizer running, first cycle in {:?}; Ctrl-C to stop",
                    optimizer.next_interval().await
                );
                tokio::signal::ctrl_c().await?;
                optimizer.shutdown().await?;
            }
        }
        Commands::Status => {
            print_status(&cli.data_dir).await?;
        }
        Commands::Config { validate } => {
            config.validate()?;
            if !validate {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<VenturiConfig> {
    let Some(path) = path else {
        return Ok(VenturiConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    VenturiConfig::from_json(&json).with_context(|| format!("loading config {}", path.display()))
}

fn read_latencies(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading latencies {}", path.display()))?;
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.parse::<f64>().with_context(|| format!("bad latency '{}'", line)))
        .collect()
}

fn read_telemetry(path: &Path) -> Result<Vec<Observation>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading telemetry {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing telemetry {}", path.display()))
}

fn simulate(config: &VenturiConfig, series: &[f64]) {
    let mut controller = AdaptiveBatchController::new(config.controller.clone());
    println!(
        "{:>5}  {:>10}  {:>10}  {:>6}  {:>7}  {:>5}  {}",
        "tick", "latency", "smoothed", "ratio", "aggr", "batch", "step"
    );
    for (i, &latency) in series.iter().enumerate() {
        match controller.adjust(latency) {
            Ok(state) => println!(
                "{:>5}  {:>10.2}  {:>10.2}  {:>6.3}  {:>7.4}  {:>5}  {:?}",
                i + 1,
                latency,
                controller.smoothed_latency().unwrap_or(latency),
                state.last_latency_ratio,
                state.aggressiveness,
                state.batch_size_bound,
                controller.last_adjustment()
            ),
            Err(e) => println!("{:>5}  {:>10}  ignored: {}", i + 1, latency, e),
        }
    }
}

async fn print_status(data_dir: &Path) -> Result<()> {
    let storage = JsonStorage::new(data_dir).await?;

    println!("Venturi Status ({})", data_dir.display());

    match storage.load_json::<LearnerSnapshot>(Bucket::Learner, SNAPSHOT_KEY).await? {
        Some(snapshot) => {
            println!("  Learner: {} cycle(s), {} experience(s)", snapshot.cycles, snapshot.experiences.len());
            for t in &snapshot.traits {
                println!("    {}: {:.3} (baseline {:.3})", t.name, t.current, t.baseline);
            }
        }
        None => println!("  Learner: no snapshot"),
    }

    let deployments = storage.list_deployments().await?;
    println!("  Deployments ({})", deployments.len());
    for record in deployments.iter().rev().take(10) {
        println!(
            "    {} | {} | {} | {}",
            record.id,
            record.status,
            record.target_area,
            record.reason.as_deref().unwrap_or("-")
        );
    }

    let review = storage.list_manual_review().await?;
    println!("  Manual review ({})", review.len());
    for item in review {
        println!("    {} | {} | {}", item.id, item.opportunity.area, item.reason);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_once() {
        let cli = Cli::try_parse_from(["venturi", "--data-dir", "/tmp/v", "run", "--target", "t", "--once"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/v"));
        assert!(matches!(cli.command, Commands::Run { once: true, .. }));
    }

    #[test]
    fn test_load_config_defaults_and_file() {
        assert_eq!(load_config(None).unwrap(), VenturiConfig::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venturi.json");
        std::fs::write(&path, r#"{"controller":{"target_latency_ms":80.0}}"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.controller.target_latency_ms, 80.0);

        std::fs::write(&path, r#"{"telemetry_queue_capacity":0}"#).unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_read_latencies_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lat.txt");
        std::fs::write(&path, "# warmup\n70\n\n75.5\n").unwrap();
        assert_eq!(read_latencies(&path).unwrap(), vec![70.0, 75.5]);

        std::fs::write(&path, "fast\n").unwrap();
        assert!(read_latencies(&path).is_err());
    }

    #[test]
    fn test_read_telemetry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.json");
        let observations = vec![Observation::latency(120.0).in_area("ingest")];
        std::fs::write(&path, serde_json::to_string(&observations).unwrap()).unwrap();
        assert_eq!(read_telemetry(&path).unwrap(), observations);
    }
}
