mod config;
mod feed;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tickavg_core::{round_price, AverageConfig, Clock, SystemClock};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "tickavg")]
#[command(about = "Streaming moving averages over a live tick feed")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Path to a TOML config file
    #[arg(short, long, env = "TICKAVG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an average over the demo feed until it ends or Ctrl-C
    Run(RunArgs),

    /// List available averages
    Averages,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Average to run (overrides the config file)
    #[arg(short, long, value_enum)]
    average: Option<AverageKind>,

    /// Window size in ticks (moving, exponential)
    #[arg(short, long)]
    window: Option<usize>,

    /// Smoothing factor in (0, 1] (exponential)
    #[arg(long)]
    alpha: Option<Decimal>,

    /// Window length in seconds (windowed)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Number of ticks to send, 0 for an endless feed
    #[arg(long)]
    ticks: Option<u64>,

    /// Milliseconds between ticks
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Decimal places to print
    #[arg(long)]
    decimals: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AverageKind {
    Moving,
    Exponential,
    Windowed,
}

const DEFAULT_WINDOW: usize = 10;
const DEFAULT_DURATION_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let mut config = AppConfig::load(cli.config.as_deref())?;
            apply_overrides(&mut config, &args);
            config.validate()?;
            run(config).await?;
        }
        Commands::Averages => {
            println!("Available averages:");
            println!("  moving      - Mean of the last N prices (--window)");
            println!("  exponential - EMA bounded to the last N prices (--window, --alpha)");
            println!("  windowed    - Mean of the prices seen in the last D seconds (--duration-secs)");
        }
    }

    Ok(())
}

async fn run(config: AppConfig) -> Result<()> {
    use tickavg_engine::spawn_average;
    use tickavg_indicators::{build_average, Average};

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let average = build_average(&config.average, clock.clone())?;
    let name = average.name();

    tracing::info!(
        average = name,
        config = ?config.average,
        ticks = config.feed.ticks,
        "Starting run"
    );

    let cancel = CancellationToken::new();
    let ticks = feed::spawn_feed(config.feed.clone(), clock, cancel.clone());
    let mut stream = spawn_average(average, ticks, &cancel);

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            ctrl_c.cancel();
        }
    });

    while let Some(value) = stream.recv().await {
        println!("{name} average: {}", round_price(value, config.output.decimals));
    }

    let summary = stream.join().await?;
    cancel.cancel();

    tracing::info!(
        ticks = summary.ticks_processed,
        values = summary.values_emitted,
        exit = ?summary.exit,
        "Run complete"
    );

    Ok(())
}

/// Layer command-line flags over the loaded config.
fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    config.average = resolve_average(&config.average, args);
    if let Some(ticks) = args.ticks {
        config.feed.ticks = ticks;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.feed.interval_ms = interval_ms;
    }
    if let Some(decimals) = args.decimals {
        config.output.decimals = decimals;
    }
}

fn resolve_average(current: &AverageConfig, args: &RunArgs) -> AverageConfig {
    let (kind, window, alpha, duration_secs) = match *current {
        AverageConfig::Moving { window } => {
            (AverageKind::Moving, window, default_alpha(), DEFAULT_DURATION_SECS)
        }
        AverageConfig::Exponential { window, alpha } => {
            (AverageKind::Exponential, window, alpha, DEFAULT_DURATION_SECS)
        }
        AverageConfig::Windowed { duration_secs } => {
            (AverageKind::Windowed, DEFAULT_WINDOW, default_alpha(), duration_secs)
        }
    };

    match args.average.unwrap_or(kind) {
        AverageKind::Moving => AverageConfig::Moving {
            window: args.window.unwrap_or(window),
        },
        AverageKind::Exponential => AverageConfig::Exponential {
            window: args.window.unwrap_or(window),
            alpha: args.alpha.unwrap_or(alpha),
        },
        AverageKind::Windowed => AverageConfig::Windowed {
            duration_secs: args.duration_secs.unwrap_or(duration_secs),
        },
    }
}

fn default_alpha() -> Decimal {
    Decimal::new(1, 1)
}
