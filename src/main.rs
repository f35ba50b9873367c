//! Sentinel - Smart Money Correlation Monitor
//!
//! Host binary: wires the correlation engine to a JSONL event feed, the
//! DexScreener token data source, and the logging alert sink.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use sentinel::adapters::{DexScreenerClient, JsonlEventSource, TracingAlertSink};
use sentinel::application::{CorrelationEngine, EngineConfig};
use sentinel::config::load_config;
use sentinel::domain::{AlertStatus, StateSnapshot, TrustStatus, STATE_FILE};

#[derive(Parser)]
#[command(name = "sentinel", about = "Smart money correlation monitor for Solana")]
struct CliApp {
    /// Verbose output (info level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitor against a normalized event feed
    Run(RunCmd),
    /// Show a summary of the persisted state
    Status(StatusCmd),
    /// List tracked wallet scores
    Wallets(StatusCmd),
}

#[derive(clap::Args)]
struct RunCmd {
    /// Path to config.toml
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// JSONL file of normalized buy events (one BuyEvent per line)
    #[arg(short, long)]
    events: PathBuf,
}

#[derive(clap::Args)]
struct StatusCmd {
    /// Path to config.toml
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (secrets and path overrides go here)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Status(cmd) => status_command(cmd),
        Command::Wallets(cmd) => wallets_command(cmd),
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).init();
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    tracing::info!("Starting sentinel...");

    let config = load_config(&cmd.config).context("Failed to load configuration")?;

    let token_data = DexScreenerClient::new()
        .map_err(|e| anyhow::anyhow!("Failed to create DexScreener client: {}", e))?;
    let alert_sink = TracingAlertSink::new();

    let engine = CorrelationEngine::new(
        EngineConfig::from_config(&config),
        Arc::new(token_data),
        Arc::new(alert_sink),
    );

    // Corrupt persisted state must halt startup, not be repaired over
    let state_path = engine.state_path();
    match engine.restore_from(&state_path).await {
        Ok(true) => tracing::info!("Restored state from {}", state_path.display()),
        Ok(false) => tracing::info!("No persisted state, starting fresh"),
        Err(e) => {
            return Err(anyhow::anyhow!(e)).context(format!(
                "Refusing to start with corrupt state at {} - inspect or remove the file",
                state_path.display()
            ));
        }
    }

    // Graceful shutdown: stop intake, cancel outcome timers, persist
    let handle = engine.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.shutdown();
    });

    let source = JsonlEventSource::new(cmd.events);
    engine
        .run(&source)
        .await
        .context("Engine terminated with an error")?;

    engine.persist().await.context("Failed to persist state")?;
    tracing::info!(
        "Sentinel stopped: {} alert(s) in archive, {} wallet(s) scored",
        engine.alerts().await.len(),
        engine.wallet_scores().await.len()
    );
    Ok(())
}

fn load_snapshot(cmd: &StatusCmd) -> Result<Option<StateSnapshot>> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let path = config.persistence.resolved_data_dir().join(STATE_FILE);
    StateSnapshot::load(&path).map_err(|e| anyhow::anyhow!(e))
}

fn status_command(cmd: StatusCmd) -> Result<()> {
    let Some(snapshot) = load_snapshot(&cmd)? else {
        println!("No persisted state found");
        return Ok(());
    };

    let confirmed = snapshot
        .alerts
        .iter()
        .filter(|a| a.status == AlertStatus::Confirmed)
        .count();
    let fake = snapshot
        .alerts
        .iter()
        .filter(|a| a.status == AlertStatus::Fake)
        .count();
    let pending = snapshot
        .alerts
        .iter()
        .filter(|a| a.status == AlertStatus::PendingEval)
        .count();

    let when = chrono::DateTime::from_timestamp(snapshot.saved_at as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("t={}", snapshot.saved_at));
    println!("Snapshot taken at: {}", when);
    println!(
        "Alerts: {} total ({} confirmed, {} fake, {} pending)",
        snapshot.alerts.len(),
        confirmed,
        fake,
        pending
    );
    println!("Open windows: {}", snapshot.open_windows.len());
    println!("Cooldown entries: {}", snapshot.cooldowns.len());
    println!("Pending outcome checks: {}", snapshot.pending_checks.len());
    println!("Wallets scored: {}", snapshot.wallet_scores.len());
    Ok(())
}

fn wallets_command(cmd: StatusCmd) -> Result<()> {
    let Some(snapshot) = load_snapshot(&cmd)? else {
        println!("No persisted state found");
        return Ok(());
    };

    let mut scores = snapshot.wallet_scores;
    scores.sort_by(|a, b| {
        b.trash_ratio()
            .partial_cmp(&a.trash_ratio())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!("{:<46} {:>6} {:>6} {:>7}  status", "wallet", "trash", "total", "ratio");
    for score in scores {
        let status = match score.trust_status {
            TrustStatus::Active => "active",
            TrustStatus::SoftBlackout => "soft_blackout",
            TrustStatus::Removed => "removed",
        };
        println!(
            "{:<46} {:>6} {:>6} {:>6.0}%  {}",
            score.wallet,
            score.trash_count,
            score.total_count,
            score.trash_ratio() * 100.0,
            status
        );
    }
    Ok(())
}
