//! Run options shared by `run` and `config save`

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use bsr_runner::{AddressingMode, RunConfig};
use clap::Args;

#[derive(Args, Debug, Default, Clone)]
pub struct RunOptions {
    /// Config file to start from; command line options override it
    #[arg(long, value_name = "PATH", env = "BSR_CONFIG")]
    pub config: Option<PathBuf>,
    /// Connection target, e.g. `sqlite:/data/app.db`
    #[arg(long, value_name = "TARGET", env = "BSR_CONNECTION")]
    pub connection: Option<String>,
    /// Script to execute
    #[arg(long, value_name = "PATH")]
    pub script: Option<PathBuf>,
    /// Units combined into one execution
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,
    /// Line that ends a unit (case-insensitive)
    #[arg(long, value_name = "LINE")]
    pub delimiter: Option<String>,
    /// Move previous checkpoints aside and start from the first unit
    #[arg(long)]
    pub restart: bool,
    /// Track units by content hash instead of position
    #[arg(long)]
    pub hash: bool,
    #[arg(long, value_name = "N")]
    pub retry_count: Option<u32>,
    /// Seconds between retries
    #[arg(long, value_name = "SECS")]
    pub retry_interval: Option<u64>,
    /// Double the retry interval after each failure, up to 60 seconds
    #[arg(long)]
    pub backoff: bool,
    /// Mirror the run log to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl RunOptions {
    /// Build the effective configuration.
    ///
    /// Starts from `--config`, or from the default config file when
    /// `--connection` and `--script` are not both given.
    pub fn resolve(&self) -> Result<RunConfig> {
        let base = match &self.config {
            Some(path) => Some(
                RunConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))?,
            ),
            None if self.connection.is_none() || self.script.is_none() => {
                let path = RunConfig::default_path()?;
                if path.is_file() {
                    Some(
                        RunConfig::from_file(&path)
                            .with_context(|| format!("failed to load {}", path.display()))?,
                    )
                } else {
                    None
                }
            }
            None => None,
        };

        let mut builder = match base {
            Some(config) => config.to_builder(),
            None => {
                let (Some(connection), Some(script)) = (&self.connection, &self.script) else {
                    bail!("--connection and --script are required when no config file is available");
                };
                RunConfig::builder(connection.clone(), script.clone())
            }
        };

        if let Some(connection) = &self.connection {
            builder = builder.connection_target(connection.clone());
        }
        if let Some(script) = &self.script {
            builder = builder.script_path(script.clone());
        }
        if let Some(size) = self.batch_size {
            builder = builder.batch_size(size);
        }
        if let Some(delimiter) = &self.delimiter {
            builder = builder.unit_delimiter(delimiter.clone());
        }
        if self.restart {
            builder = builder.continue_from_last_session(false);
        }
        if self.hash {
            builder = builder.addressing_mode(AddressingMode::ByHash);
        }
        if let Some(count) = self.retry_count {
            builder = builder.retry_count(count);
        }
        if let Some(secs) = self.retry_interval {
            builder = builder.retry_interval_secs(secs);
        }
        if self.backoff {
            builder = builder.retry_backoff(true);
        }
        if let Some(path) = &self.log_file {
            builder = builder.log_file(path.clone());
        }

        Ok(builder.build()?)
    }
}
