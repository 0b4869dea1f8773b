//! `arca` command line: run the backup engine or validate a config.

use anyhow::Context;
use arca_core::MessageLevel;
use arca_engine::{Config, Engine};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "arca", version, about = "Continuous directory backup")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the backup engine until interrupted
    Run {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "arca.toml")]
        config: PathBuf,
    },
    /// Parse the configuration and report what would run
    Check {
        #[arg(short, long, default_value = "arca.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::Check { config } => check(&config),
    }
}

async fn run(path: &Path) -> anyhow::Result<()> {
    let config = Config::load(path)
        .with_context(|| format!("loading configuration from [{}]", path.display()))?;
    let engine = Engine::new(config);
    let running = engine.start().await.context("starting the engine")?;

    let mut progress = running.subscribe_progress();
    tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(p) => info!(
                    storage = %p.storage_name,
                    file = %p.file_name,
                    percent = format_args!("{:.0}", p.percent),
                    "transfer progress"
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut status = running.subscribe_status();
    tokio::spawn(async move {
        loop {
            match status.recv().await {
                Ok(s) => debug!(
                    total = s.total_files,
                    in_progress = s.files_in_progress,
                    done = s.files_done,
                    status = ?s.status,
                    "backup status"
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut messages = running.subscribe_messages();
    tokio::spawn(async move {
        loop {
            match messages.recv().await {
                Ok(m) => match m.level {
                    MessageLevel::Error => error!(source = %m.source, "{}", m.text),
                    MessageLevel::Info => info!(source = %m.source, "{}", m.text),
                },
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;
    info!("interrupt received, shutting down");
    running.shutdown();
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = Config::load(path)
        .with_context(|| format!("loading configuration from [{}]", path.display()))?;

    println!("configuration: {}", path.display());
    println!("snapshot directory name: {}", config.snapshot_dir);
    for watch in &config.watches {
        let state = if watch.active { "active" } else { "inactive" };
        println!("watch {} ({state})", watch.path.display());
    }
    match &config.storage.local {
        Some(local) if local.active => println!("storage local -> {}", local.path.display()),
        _ => println!("storage local: off"),
    }
    match &config.storage.remote {
        Some(remote) if remote.active => println!("storage remote -> folder [{}]", remote.folder),
        _ => println!("storage remote: off"),
    }
    println!(
        "scheduler: {} concurrent, flush every {}s",
        config.scheduler.max_in_progress, config.scheduler.flush_interval_secs
    );
    Ok(())
}
