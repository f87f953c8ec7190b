//! CLI for the DDM download manager.

mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ddm_core::config;
use ddm_core::manager::DownloadManager;
use ddm_core::store::Store;

use commands::{run_add, run_cancel, run_list, run_pause, run_resume, run_run};

/// Top-level CLI for the DDM download manager.
#[derive(Debug, Parser)]
#[command(name = "ddm")]
#[command(about = "DDM: persistent, resumable, multi-connection download manager", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Add a new download.
    Add {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        /// Target file path.
        path: String,
        /// Number of chunks to split the download into.
        #[arg(long, value_name = "N")]
        chunks: Option<i64>,
        /// Number of concurrent workers.
        #[arg(long, value_name = "N")]
        workers: Option<i64>,
    },

    /// List all downloads and their progress.
    List,

    /// Pause a download by id.
    Pause {
        /// Download identifier.
        id: i64,
    },

    /// Resume a paused download by id.
    Resume {
        /// Download identifier.
        id: i64,
    },

    /// Cancel a download by id.
    Cancel {
        /// Download identifier.
        id: i64,
    },

    /// Load every persisted download and run until all are terminal,
    /// printing progress events as they arrive.
    Run {
        /// Print each event as a JSON line instead of
        /// the human-readable default.
        #[arg(long)]
        json: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let dir = std::env::current_dir()?;
        let cfg = config::load_or_init(&dir)?;
        tracing::debug!(?cfg, "loaded config");

        let store = Store::open_in(&dir).await?;
        let manager = DownloadManager::new(store, &cfg);

        match cli.command {
            CliCommand::Add { url, path, chunks, workers } => {
                run_add(&manager, &url, &path, chunks.unwrap_or(cfg.chunk_count as i64), workers.unwrap_or(cfg.worker_count as i64)).await?
            }
            CliCommand::List => run_list(&manager).await?,
            CliCommand::Pause { id } => run_pause(&manager, id).await?,
            CliCommand::Resume { id } => run_resume(&manager, id).await?,
            CliCommand::Cancel { id } => run_cancel(&manager, id).await?,
            CliCommand::Run { json } => run_run(&manager, json).await?,
        }

        Ok(())
    }
}
