use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use onlearn::config::Architecture;
use onlearn::core::FEATURE_COUNT;
use onlearn::sim::generate_market_series;
use onlearn::training::{Checkpointer, ModelCheckpoint, TrainingEngine, TrainingSession};
use onlearn::EngineConfig;

#[derive(Parser)]
#[command(name = "onlearn", about = "Online training engine for streamed trading experiences")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a fresh model on synthetic market data
    Train {
        /// Optional TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Architecture variant: compact | standard | hybrid | deep
        #[arg(long, default_value = "hybrid")]
        architecture: String,
        /// Override the configured epoch count
        #[arg(long)]
        epochs: Option<usize>,
        /// Synthetic ticks to generate
        #[arg(long, default_value_t = 4096)]
        ticks: usize,
        /// Random-walk volatility
        #[arg(long, default_value_t = 0.02)]
        volatility: f64,
        /// Seed for init, sampling and data generation
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Checkpoint directory
        #[arg(long, default_value = "./checkpoints")]
        checkpoint_dir: PathBuf,
    },
    /// Resume training from a checkpoint file
    Resume {
        /// Checkpoint to load
        checkpoint: PathBuf,
        /// Override the configured epoch count
        #[arg(long)]
        epochs: Option<usize>,
        /// Synthetic ticks to generate for the continued run
        #[arg(long, default_value_t = 4096)]
        ticks: usize,
        /// Random-walk volatility
        #[arg(long, default_value_t = 0.02)]
        volatility: f64,
        /// Seed for the generated data
        #[arg(long, default_value_t = 43)]
        seed: u64,
        /// Checkpoint directory
        #[arg(long, default_value = "./checkpoints")]
        checkpoint_dir: PathBuf,
    },
    /// Print a checkpoint's summary
    Inspect {
        /// Checkpoint to read
        checkpoint: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            architecture,
            epochs,
            ticks,
            volatility,
            seed,
            checkpoint_dir,
        } => {
            init_logging();
            let mut cfg = EngineConfig::load(config.as_deref())?;
            if let Some(epochs) = epochs {
                cfg.training.epochs = epochs;
            }
            cfg.network.init_seed.get_or_insert(seed);
            cfg.buffer.seed.get_or_insert(seed ^ 0xA5A5);

            let architecture = Architecture::from_str(&architecture)?;
            let mut engine = TrainingEngine::new(cfg)?;
            engine.initialize_network(architecture, FEATURE_COUNT, 1)?;

            run_session(engine, ticks, volatility, seed, checkpoint_dir).await?;
        }
        Commands::Resume {
            checkpoint,
            epochs,
            ticks,
            volatility,
            seed,
            checkpoint_dir,
        } => {
            init_logging();
            let cp = ModelCheckpoint::load(&checkpoint)
                .with_context(|| format!("loading {}", checkpoint.display()))?;
            let mut cfg = cp.config.clone();
            if let Some(epochs) = epochs {
                cfg.training.epochs = epochs;
            }
            let mut engine = TrainingEngine::new(cfg)?;
            engine.apply_checkpoint(cp)?;

            run_session(engine, ticks, volatility, seed, checkpoint_dir).await?;
        }
        Commands::Inspect { checkpoint } => {
            init_logging_simple();
            let cp = ModelCheckpoint::load(&checkpoint)
                .with_context(|| format!("loading {}", checkpoint.display()))?;
            println!("version:        {}", cp.version);
            println!("saved:          {}", cp.timestamp);
            println!("architecture:   {}", cp.network.architecture);
            println!(
                "network:        {} -> {} ({} layers)",
                cp.network.input_size,
                cp.network.output_size,
                cp.network.num_layers()
            );
            println!("parameters:     {}", cp.parameters.num_params());
            println!("epoch:          {}", cp.training.epoch);
            println!("global step:    {}", cp.training.global_step);
            println!(
                "best val loss:  {}",
                cp.training
                    .best_validation_loss
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!("learning rate:  {}", cp.scheduler.current_lr);
            println!("resets:         {}", cp.watchdog.reset_count);
            for event in &cp.watchdog.reset_log {
                println!(
                    "  reset @ step {}: {} (loss {:.4}, grad {:.4})",
                    event.step, event.cause, event.loss, event.gradient_norm
                );
            }
        }
    }

    Ok(())
}

async fn run_session(
    engine: TrainingEngine,
    ticks: usize,
    volatility: f64,
    seed: u64,
    checkpoint_dir: PathBuf,
) -> anyhow::Result<()> {
    let mut engine = engine;
    let series = generate_market_series(ticks, volatility, seed);
    let added =
        engine.add_market_data_experiences(&series.snapshots, &series.actions, &series.rewards)?;
    info!(added, "synthetic experiences buffered");

    let checkpointer = Checkpointer::new(&checkpoint_dir, 5);
    let mut session = TrainingSession::new(engine, Some(checkpointer));

    // Ctrl+C flips the cooperative stop flag; the loop exits at the next step.
    let stop = session.stop_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            stop.store(true, Ordering::SeqCst);
        }
    });

    match session.run().await {
        Ok(report) => {
            info!(
                epochs = report.epochs_run,
                reason = ?report.stop_reason,
                final_loss = report.summary.final_loss,
                avg_directional_accuracy = report.summary.avg_directional_accuracy,
                resets = report.summary.resets,
                "done"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "training failed");
            Err(e.into())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,onlearn=debug"));

    // Optional daily-rolling file layer; preflight writability because the
    // appender aborts if it cannot create its first file.
    let file_layer = std::env::var("ONLEARN_LOG_DIR").ok().and_then(|log_dir| {
        if std::fs::create_dir_all(&log_dir).is_err() {
            eprintln!("Warning: could not create log directory {log_dir}, file logging disabled");
            return None;
        }
        let test_path = std::path::Path::new(&log_dir).join(".onlearn_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let appender = tracing_appender::rolling::daily(&log_dir, "onlearn.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                // Long-running process; keep the guard for the lifetime.
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: could not write to log directory {log_dir} ({e}), file logging disabled");
                None
            }
        }
    });

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn init_logging_simple() {
    // Minimal logging for read-only commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
