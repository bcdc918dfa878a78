//!
//! datadock configuration
//! ----------------------
//! Environment-sourced settings for the service. Everything is read once at
//! startup; `validate` must pass before the server begins listening.
//!
//! | Env var                | Meaning                       | Default     |
//! |------------------------|-------------------------------|-------------|
//! | `DATADOCK_DATA_DIR`    | data directory path           | `data-docs` |
//! | `DATADOCK_WATCH`       | enable the change watcher     | `false`     |
//! | `DATADOCK_DEBOUNCE_MS` | watcher debounce interval     | `500`       |
//! | `DATADOCK_CORS`        | enable permissive CORS        | `false`     |
//! | `DATADOCK_HOST`        | bind host                     | `0.0.0.0`   |
//! | `DATADOCK_PORT`        | bind port                     | `8000`      |
//! | `DATADOCK_WORKERS`     | tokio worker threads          | `2`         |

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::dataset::{discover, SUPPORTED_EXTENSIONS};

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory scanned for dataset source files.
    pub data_dir: PathBuf,
    /// When true, a directory watcher reloads the registry on file changes.
    pub watch: bool,
    /// Quiet period the watcher waits for after the last change event.
    pub debounce: Duration,
    pub cors: bool,
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let data_dir =
            PathBuf::from(std::env::var("DATADOCK_DATA_DIR").unwrap_or_else(|_| "data-docs".to_string()));
        let host = std::env::var("DATADOCK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("DATADOCK_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u16>()
            .context("DATADOCK_PORT must be a valid port number")?;
        let workers = std::env::var("DATADOCK_WORKERS")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<usize>()
            .context("DATADOCK_WORKERS must be a positive integer")?;
        let debounce_ms = std::env::var("DATADOCK_DEBOUNCE_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u64>()
            .context("DATADOCK_DEBOUNCE_MS must be a non-negative integer")?;

        Ok(Config {
            data_dir,
            watch: env_flag("DATADOCK_WATCH"),
            debounce: Duration::from_millis(debounce_ms),
            cors: env_flag("DATADOCK_CORS"),
            host,
            port,
            workers: workers.max(1),
        })
    }

    /// Startup validation: the data directory must exist, be a directory and
    /// contain at least one recognized file, otherwise the process must not
    /// start serving.
    pub fn validate(&self) -> Result<()> {
        let files = discover::discover(&self.data_dir)
            .with_context(|| format!("data directory check failed: {}", self.data_dir.display()))?;
        if files.is_empty() {
            bail!(
                "no supported files found in {}. Supported extensions: {:?}",
                self.data_dir.display(),
                SUPPORTED_EXTENSIONS
            );
        }
        Ok(())
    }
}
