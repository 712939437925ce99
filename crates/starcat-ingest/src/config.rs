//! Ingestion configuration
//!
//! Loaded from environment variables (a `.env` file is honoured), with every
//! value defaulted. CLI flags override individual fields afterwards.
//!
//! | Variable | Default |
//! |---|---|
//! | `STARCAT_LISTING_URL` | Gaia DR1 `gaia_source/fits/` listing |
//! | `STARCAT_DATA_DIR` | `./data/gaia_source` |
//! | `STARCAT_EXTENSION` | `.fits` |
//! | `STARCAT_DOWNLOAD_WORKERS` | 100 |
//! | `STARCAT_MAX_RETRIES` | 3 |
//! | `STARCAT_RETRY_DELAY_SECS` | 1 |
//! | `STARCAT_POLL_INTERVAL_MS` | 1000 |
//! | `STARCAT_CHUNK_SIZE` | 8192 |
//! | `STARCAT_HTTP_TIMEOUT_SECS` | 30 (connect timeout) |
//! | `STARCAT_TABLE` | `gdr1_gaia_source_fits` |
//! | `STARCAT_TABLE_HDU` | 1 |
//! | `STARCAT_LOAD_WORKERS` | 4 |
//! | `DATABASE_HOST` / `_PORT` / `_USER` / `_PASSWORD` / `_NAME` | `localhost` / 3306 / `root` / empty / `gaia` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use starcat_common::{Result, StarcatError};
use url::Url;

use crate::download::{
    DownloadConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_WORKERS,
};
use crate::load::{DatabaseConfig, LoadConfig, DEFAULT_LOAD_WORKERS, DEFAULT_TABLE_HDU};

pub const DEFAULT_LISTING_URL: &str = "http://cdn.gea.esac.esa.int/Gaia/gdr1/gaia_source/fits/";
pub const DEFAULT_DATA_DIR: &str = "./data/gaia_source";
pub const DEFAULT_EXTENSION: &str = ".fits";
pub const DEFAULT_TABLE_NAME: &str = "gdr1_gaia_source_fits";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_DELAY_SECS: u64 = 1;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Download-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    pub listing_url: String,
    pub data_dir: PathBuf,
    pub extension: String,
    pub workers: usize,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub poll_interval_ms: u64,
    pub chunk_size: usize,
    /// Connect timeout for HTTP requests
    pub http_timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            workers: DEFAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl DownloadSettings {
    pub fn listing_url(&self) -> Result<Url> {
        StarcatError::parse_url(&self.listing_url)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Settings for the download manager
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::new(&self.data_dir)
            .with_workers(self.workers)
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_chunk_size(self.chunk_size)
    }
}

/// Load-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSettings {
    pub table_name: String,
    pub table_hdu: usize,
    pub workers: usize,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            table_hdu: DEFAULT_TABLE_HDU,
            workers: DEFAULT_LOAD_WORKERS,
        }
    }
}

impl LoadSettings {
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            table_hdu: self.table_hdu,
            workers: self.workers,
        }
    }
}

/// Complete ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub download: DownloadSettings,
    pub load: LoadSettings,
    pub database: DatabaseConfig,
}

impl IngestConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let download = DownloadSettings::default();
        let load = LoadSettings::default();
        let database = DatabaseConfig::default();

        let config = Self {
            download: DownloadSettings {
                listing_url: lookup("STARCAT_LISTING_URL").unwrap_or(download.listing_url),
                data_dir: lookup("STARCAT_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(download.data_dir),
                extension: lookup("STARCAT_EXTENSION").unwrap_or(download.extension),
                workers: parse_var(&lookup, "STARCAT_DOWNLOAD_WORKERS", download.workers)?,
                max_retries: parse_var(&lookup, "STARCAT_MAX_RETRIES", download.max_retries)?,
                retry_delay_secs: parse_var(
                    &lookup,
                    "STARCAT_RETRY_DELAY_SECS",
                    download.retry_delay_secs,
                )?,
                poll_interval_ms: parse_var(
                    &lookup,
                    "STARCAT_POLL_INTERVAL_MS",
                    download.poll_interval_ms,
                )?,
                chunk_size: parse_var(&lookup, "STARCAT_CHUNK_SIZE", download.chunk_size)?,
                http_timeout_secs: parse_var(
                    &lookup,
                    "STARCAT_HTTP_TIMEOUT_SECS",
                    download.http_timeout_secs,
                )?,
            },
            load: LoadSettings {
                table_name: lookup("STARCAT_TABLE").unwrap_or(load.table_name),
                table_hdu: parse_var(&lookup, "STARCAT_TABLE_HDU", load.table_hdu)?,
                workers: parse_var(&lookup, "STARCAT_LOAD_WORKERS", load.workers)?,
            },
            database: DatabaseConfig {
                host: lookup("DATABASE_HOST").unwrap_or(database.host),
                port: parse_var(&lookup, "DATABASE_PORT", database.port)?,
                user: lookup("DATABASE_USER").unwrap_or(database.user),
                password: lookup("DATABASE_PASSWORD").unwrap_or(database.password),
                database: lookup("DATABASE_NAME").unwrap_or(database.database),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.download.workers == 0 {
            return Err(StarcatError::config("download workers must be greater than 0"));
        }
        if self.download.max_retries == 0 {
            return Err(StarcatError::config("max retries must be greater than 0"));
        }
        if self.download.chunk_size == 0 {
            return Err(StarcatError::config("chunk size must be greater than 0"));
        }
        if self.download.extension.is_empty() {
            return Err(StarcatError::config("catalog extension cannot be empty"));
        }
        if self.load.workers == 0 {
            return Err(StarcatError::config("load workers must be greater than 0"));
        }
        if self.load.table_name.trim().is_empty() {
            return Err(StarcatError::config("table name cannot be empty"));
        }
        self.download.listing_url()?;
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| StarcatError::config(format!("{key} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}
