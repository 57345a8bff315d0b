use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use survivoor::config::Config;
use survivoor::reconcile::service::ServiceSlots;
use survivoor::reconcile::Pipeline;
use survivoor::table::{emit, source};

/// Reconstructs GPU operational lifetimes from periodic inventory scans.
#[derive(Parser)]
#[command(name = "survivoor", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info, injected via RUSTFLAGS or the environment.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("survivoor {}", version::full());
        return Ok(());
    }

    // Initialize tracing.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    // Config is required for a reconciliation run.
    let config_path = cli
        .config
        .context("--config is required (use --help for usage)")?;

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting survivoor",
    );

    run(cfg)
}

fn run(cfg: Config) -> Result<()> {
    let records = source::read_history(&cfg.input.history)?;

    let service = match &cfg.input.service_slots {
        Some(path) => {
            let service = ServiceSlots::new(source::read_service_slots(path)?);
            tracing::info!(slots = service.len(), "loaded service-slot reference");
            service
        }
        None => ServiceSlots::default(),
    };

    let pipeline = Pipeline::new(service, cfg.batch_cutoff);
    let output = pipeline.run(&records);

    emit::write_intervals(
        &cfg.output.intervals,
        &output.intervals,
        &cfg.output.null_marker,
    )?;
    emit::write_lifetimes(
        &cfg.output.lifetimes,
        &output.lifetimes,
        &cfg.output.null_marker,
    )?;

    tracing::info!(
        intervals = output.intervals.len(),
        lifetimes = output.lifetimes.len(),
        "survivoor finished"
    );
    Ok(())
}
