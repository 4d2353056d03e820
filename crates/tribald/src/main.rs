//! tribald — the Tribal daemon.
//!
//! Single binary that assembles the draft core:
//! - State store (redb)
//! - Draft service + auto-finalizer
//! - Deadline scheduler + job monitor
//!
//! # Usage
//!
//! ```text
//! tribald run --config tribal.toml
//! tribald trigger finalize_drafts --config tribal.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use tribal_core::TribalConfig;
use tribal_draft::{LogNotifier, Notifier};
use tribal_jobs::{DeadlineScheduler, DeadlineView, JobMonitor, job_table, log_alert_hook, parse_timezone};
use tribal_state::StateStore;

#[derive(Parser)]
#[command(name = "tribald", about = "Tribal draft orchestration daemon")]
struct Cli {
    /// Path to tribal.toml.
    #[arg(long, default_value = "tribal.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted.
    Run,
    /// Manually trigger a job by name and print its execution record.
    Trigger {
        /// Job name (e.g. finalize_drafts).
        job: String,
    },
    /// List registered jobs with their triggers and armed deadlines.
    Jobs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tribald=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        TribalConfig::from_file(&cli.config)?
    } else {
        info!(path = ?cli.config, "no config file found; using defaults");
        TribalConfig::default()
    };

    match cli.command {
        Command::Run => run_daemon(config).await,
        Command::Trigger { job } => trigger_job(config, &job).await,
        Command::Jobs => list_jobs(config).await,
    }
}

/// Assemble the store, monitor, and scheduler from config.
async fn build_scheduler(config: &TribalConfig) -> anyhow::Result<DeadlineScheduler> {
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_path = config.storage.data_dir.join("tribal.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let timezone = parse_timezone(&config.schedule.timezone)?;
    let monitor = JobMonitor::new().with_alert_hook(log_alert_hook());
    let scheduler = DeadlineScheduler::new(monitor, DeadlineView::new(store.clone()), timezone);

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    for registration in job_table(&store, notifier, &config.schedule.draft_reminder) {
        scheduler.register(registration).await;
    }

    Ok(scheduler)
}

async fn run_daemon(config: TribalConfig) -> anyhow::Result<()> {
    info!("tribald starting");
    let scheduler = build_scheduler(&config).await?;
    scheduler.start().await?;
    info!("tribald running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.shutdown().await;
    Ok(())
}

/// One-shot manual trigger through the same monitored path the timers
/// use. Prints the execution record and the job's stats as JSON.
async fn trigger_job(config: TribalConfig, job: &str) -> anyhow::Result<()> {
    let scheduler = build_scheduler(&config).await?;
    let execution = scheduler.run_job(job).await?;
    println!("{}", serde_json::to_string_pretty(&execution)?);

    let stats = scheduler.monitor().job_stats(Some(job)).await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Print the job table. Deliberately does not arm any timers — listing
/// must never fire a past-deadline job.
async fn list_jobs(config: TribalConfig) -> anyhow::Result<()> {
    let scheduler = build_scheduler(&config).await?;
    let jobs = scheduler.list_jobs().await;
    println!("{}", serde_json::to_string_pretty(&jobs)?);
    Ok(())
}
