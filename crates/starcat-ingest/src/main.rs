//! Starcat Ingest - catalog download, schema generation and loading

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use starcat_common::logging::{init_logging, LogConfig, LogLevel};
use starcat_ingest::catalog::discover_catalog_files;
use starcat_ingest::download::{DownloadManager, HttpResourceClient};
use starcat_ingest::load::{CatalogLoader, MySqlStore};
use starcat_ingest::progress::{file_progress, format_bytes};
use starcat_ingest::{CatalogIndex, IngestConfig, SchemaInference};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "starcat-ingest")]
#[command(author, version, about = "Bulk FITS catalog download and MySQL ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every catalog file linked from a listing page
    Download {
        /// Listing page URL
        #[arg(long, env = "STARCAT_LISTING_URL")]
        listing_url: Option<String>,

        /// Output directory
        #[arg(short, long, env = "STARCAT_DATA_DIR")]
        output: Option<PathBuf>,

        /// Concurrent downloads
        #[arg(long)]
        workers: Option<usize>,

        /// Attempts per file
        #[arg(long)]
        max_retries: Option<u32>,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the CREATE TABLE statement inferred from a sample file
    Schema {
        /// Sample file, or a directory whose first catalog file is used
        #[arg(short, long, env = "STARCAT_DATA_DIR")]
        sample: Option<PathBuf>,

        /// Target table name
        #[arg(short, long, env = "STARCAT_TABLE")]
        table: Option<String>,

        /// Write the DDL here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Insert the rows of every catalog file in a directory
    Load {
        /// Directory of catalog files
        #[arg(short, long, env = "STARCAT_DATA_DIR")]
        dir: Option<PathBuf>,

        /// Target table name
        #[arg(short, long, env = "STARCAT_TABLE")]
        table: Option<String>,

        /// Concurrent files
        #[arg(long)]
        workers: Option<usize>,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("starcat-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env().context("Invalid configuration")?;

    match cli.command {
        Command::Download {
            listing_url,
            output,
            workers,
            max_retries,
            report,
        } => {
            if let Some(url) = listing_url {
                config.download.listing_url = url;
            }
            if let Some(dir) = output {
                config.download.data_dir = dir;
            }
            if let Some(n) = workers {
                config.download.workers = n;
            }
            if let Some(n) = max_retries {
                config.download.max_retries = n;
            }
            config.validate()?;
            download(&config, report.as_deref()).await?;
        },
        Command::Schema {
            sample,
            table,
            output,
        } => {
            if let Some(table) = table {
                config.load.table_name = table;
            }
            config.validate()?;
            let sample = sample.unwrap_or_else(|| config.download.data_dir.clone());
            schema(&config, &sample, output.as_deref())?;
        },
        Command::Load {
            dir,
            table,
            workers,
            report,
        } => {
            if let Some(dir) = dir {
                config.download.data_dir = dir;
            }
            if let Some(table) = table {
                config.load.table_name = table;
            }
            if let Some(n) = workers {
                config.load.workers = n;
            }
            config.validate()?;
            load(&config, report.as_deref()).await?;
        },
    }

    Ok(())
}

async fn download(config: &IngestConfig, report_path: Option<&Path>) -> Result<()> {
    let listing = config.download.listing_url()?;
    let client = HttpResourceClient::new(config.download.http_timeout())
        .context("Failed to build HTTP client")?;

    let resources = CatalogIndex::new(client.client().clone(), &config.download.extension)
        .resolve(&listing)
        .await
        .context("Failed to resolve catalog listing")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling downloads");
            signal_token.cancel();
        }
    });

    let progress = file_progress(resources.len() as u64, "Downloading catalog files");
    let manager = DownloadManager::new(Arc::new(client), config.download.download_config())
        .with_progress(progress.clone());

    let report = manager.run(resources, cancel).await?;
    progress.finish();
    info!(
        downloaded = report.downloaded(),
        skipped = report.skipped(),
        failed = report.failed(),
        cancelled = report.cancelled(),
        size = %format_bytes(report.bytes_downloaded()),
        "Download complete"
    );

    if let Some(path) = report_path {
        write_report(path, &report)?;
    }
    Ok(())
}

fn schema(config: &IngestConfig, sample: &Path, output: Option<&Path>) -> Result<()> {
    let definition = SchemaInference::new(config.load.table_hdu)
        .infer_from_path(sample, &config.download.extension, &config.load.table_name)
        .context("Schema inference failed")?;

    let ddl = definition.create_table_sql();
    match output {
        Some(path) => {
            std::fs::write(path, format!("{ddl}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote table definition");
        },
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{ddl}")?;
        },
    }
    Ok(())
}

async fn load(config: &IngestConfig, report_path: Option<&Path>) -> Result<()> {
    let dir = &config.download.data_dir;
    let files = discover_catalog_files(dir, &config.download.extension)
        .with_context(|| format!("Failed to list {}", dir.display()))?;

    let definition = SchemaInference::new(config.load.table_hdu)
        .infer_from_dir(dir, &config.download.extension, &config.load.table_name)
        .context("Schema inference failed")?;

    let store = Arc::new(MySqlStore::new(&config.database));
    let progress = file_progress(files.len() as u64, "Loading catalog files");
    let loader = CatalogLoader::new(store, definition, config.load.load_config())
        .with_progress(progress.clone());

    let report = loader.run(files).await;
    progress.finish();
    info!(
        loaded = report.loaded(),
        skipped = report.skipped(),
        failed = report.failed(),
        rows = report.rows_inserted(),
        "Load complete"
    );

    if let Some(path) = report_path {
        write_report(path, &report)?;
    }
    Ok(())
}

fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote run report");
    Ok(())
}
