mod address;
mod cli;
mod config;
mod error;
mod feed;
mod formula;
mod merge;
mod models;
mod name;
mod phone;
mod pipeline;
mod reader;
mod scraper;
mod utils;
mod workers;
mod workspace;

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Args, Mode};
use crate::config::{Config, ProxyConfig};
use crate::feed::TerminalFeed;
use crate::workspace::{new_user_id, run_retention_sweep, Workspace};

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Background maintenance routine (spec.md line 196): delete files older
/// than the retention window across every per-user directory, once a week.
fn spawn_retention_sweep(workspace_root: std::path::PathBuf) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match run_retention_sweep(&workspace_root, Utc::now()).await {
                Ok(deleted) => info!(deleted, "retention sweep complete"),
                Err(e) => warn!(error = %e, "retention sweep failed"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::hourly("logs", "lead-enrich.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let terminal_feed = TerminalFeed::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
        .with(terminal_feed)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(proxies) = &args.proxies {
        config.proxies = proxies
            .split(',')
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(ProxyConfig::parse)
            .collect::<Result<Vec<_>>>()?;
    }

    let user_id = args.user_id.clone().unwrap_or_else(new_user_id);
    let workspace = Workspace::new(&args.workspace_root, &user_id);
    workspace.ensure_dirs().await?;
    spawn_retention_sweep(std::path::PathBuf::from(&args.workspace_root));

    match args.mode {
        Mode::Ingest => {
            let input = args.input.as_deref().ok_or_else(|| anyhow!("--input is required in ingest mode"))?;
            let staging_path = pipeline::run_ingest(&config, &workspace, input).await?;
            info!(path = %staging_path.display(), user_id = %user_id, "ingest complete");
            println!("{}", staging_path.display());
        }
        Mode::Analyze => {
            let staging_file = args
                .staging_file
                .as_deref()
                .ok_or_else(|| anyhow!("--staging-file is required in analyze mode"))?;
            let input = args.input.as_deref().ok_or_else(|| anyhow!("--input is required in analyze mode"))?;
            let output_path = pipeline::run_analyze(&config, &workspace, staging_file, args.max_records, input).await?;
            info!(path = %output_path.display(), user_id = %user_id, "analyze complete");
            println!("{}", output_path.display());
        }
        Mode::Download => {
            let filename = args.filename.as_deref().ok_or_else(|| anyhow!("--filename is required in download mode"))?;
            let path = pipeline::run_download(&workspace, filename).await?;
            info!(path = %path.display(), user_id = %user_id, "download ready, temp batches cleaned");
            println!("{}", path.display());
        }
    }

    Ok(())
}
