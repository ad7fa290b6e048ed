//! Run configuration
//!
//! A flat record persisted as pretty-printed JSON. Every way of obtaining a
//! [`RunConfig`] goes through the same validation, so an engine never starts
//! with a blank target, a zero batch size or logging without a destination.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::checkpoint::AddressingMode;
use crate::log::DEFAULT_MAX_LOG_ENTRIES;
use crate::retry::{BackoffStrategy, RetryDelay, RetryPolicy};
use crate::unit::DEFAULT_DELIMITER;
use crate::{RunnerError, RunnerResult};

/// Per-script cache directory name
pub const CACHE_DIR_NAME: &str = ".bsr";
/// Suffix of the per-script checkpoint directory
pub const JOB_DIR_SUFFIX: &str = ".bsrjob";
/// Upper bound for exponential retry delays
pub const MAX_BACKOFF_SECS: u64 = 60;

const DEFAULT_BATCH_SIZE: usize = 1;
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 3;
const DEFAULT_RETRY_COUNT: u32 = 9;

fn default_true() -> bool {
    true
}

fn default_max_log_entries() -> usize {
    DEFAULT_MAX_LOG_ENTRIES
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_retry_interval_secs() -> u64 {
    DEFAULT_RETRY_INTERVAL_SECS
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    connection_target: String,
    script_path: PathBuf,
    #[serde(default)]
    enable_logging: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_file_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    compact_log: bool,
    #[serde(default = "default_max_log_entries")]
    max_log_entries: usize,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_delimiter")]
    unit_delimiter: String,
    #[serde(default = "default_true")]
    continue_from_last_session: bool,
    #[serde(default)]
    addressing_mode: AddressingMode,
    #[serde(default = "default_retry_interval_secs")]
    retry_interval_secs: u64,
    #[serde(default = "default_retry_count")]
    retry_count: u32,
    #[serde(default)]
    retry_backoff: bool,
}

impl RunConfig {
    pub fn builder(connection_target: impl Into<String>, script_path: impl Into<PathBuf>) -> RunConfigBuilder {
        RunConfigBuilder {
            config: RunConfig {
                connection_target: connection_target.into(),
                script_path: script_path.into(),
                enable_logging: false,
                log_file_path: None,
                compact_log: true,
                max_log_entries: DEFAULT_MAX_LOG_ENTRIES,
                batch_size: DEFAULT_BATCH_SIZE,
                unit_delimiter: default_delimiter(),
                continue_from_last_session: true,
                addressing_mode: AddressingMode::default(),
                retry_interval_secs: DEFAULT_RETRY_INTERVAL_SECS,
                retry_count: DEFAULT_RETRY_COUNT,
                retry_backoff: false,
            },
        }
    }

    /// Builder seeded with this config, for applying overrides
    pub fn to_builder(&self) -> RunConfigBuilder {
        RunConfigBuilder {
            config: self.clone(),
        }
    }

    pub fn validate(&self) -> RunnerResult<()> {
        if self.connection_target.trim().is_empty() {
            return Err(RunnerError::Configuration("connection target cannot be blank".into()));
        }
        if self.script_path.as_os_str().is_empty() || self.script_path.to_string_lossy().trim().is_empty() {
            return Err(RunnerError::Configuration("script path cannot be blank".into()));
        }
        if self.unit_delimiter.trim().is_empty() {
            return Err(RunnerError::Configuration("unit delimiter cannot be blank".into()));
        }
        if self.batch_size == 0 {
            return Err(RunnerError::Configuration("batch size must be at least 1".into()));
        }
        if self.max_log_entries == 0 {
            return Err(RunnerError::Configuration("max log entries must be at least 1".into()));
        }
        if self.enable_logging
            && self
                .log_file_path
                .as_ref()
                .is_none_or(|p| p.to_string_lossy().trim().is_empty())
        {
            return Err(RunnerError::Configuration("logging is enabled but no log file path is set".into()));
        }
        Ok(())
    }

    pub fn connection_target(&self) -> &str {
        &self.connection_target
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn enable_logging(&self) -> bool {
        self.enable_logging
    }

    pub fn log_file_path(&self) -> Option<&Path> {
        self.log_file_path.as_deref()
    }

    pub fn compact_log(&self) -> bool {
        self.compact_log
    }

    pub fn max_log_entries(&self) -> usize {
        self.max_log_entries
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn unit_delimiter(&self) -> &str {
        &self.unit_delimiter
    }

    pub fn continue_from_last_session(&self) -> bool {
        self.continue_from_last_session
    }

    pub fn addressing_mode(&self) -> AddressingMode {
        self.addressing_mode
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn retry_backoff(&self) -> bool {
        self.retry_backoff
    }

    /// One initial attempt plus `retry_count` retries
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = if self.retry_backoff {
            let initial_ms = self.retry_interval_secs.saturating_mul(1_000);
            RetryDelay::Backoff(BackoffStrategy::new(initial_ms, MAX_BACKOFF_SECS * 1_000))
        } else {
            RetryDelay::Fixed(self.retry_interval())
        };
        RetryPolicy::from_retry_count(self.retry_count, delay)
    }

    /// `<script dir>/.bsr/.<script stem>.bsrjob`
    pub fn checkpoint_dir(&self) -> PathBuf {
        let parent = match self.script_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = self
            .script_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        parent
            .join(CACHE_DIR_NAME)
            .join(format!(".{}{}", stem, JOB_DIR_SUFFIX))
    }

    pub fn to_json(&self) -> RunnerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> RunnerResult<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> RunnerResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), "saved run config");
        Ok(())
    }

    pub fn from_file(path: &Path) -> RunnerResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// `<platform config dir>/bsr/default.config`
    pub fn default_path() -> RunnerResult<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("bsr").join("default.config"))
            .ok_or_else(|| RunnerError::Configuration("could not determine config directory".into()))
    }
}

/// Where a restarted run moves the previous checkpoint directory.
///
/// Names carry a one-second timestamp; a second restart within the same
/// second gets a `-<n>` counter instead of colliding with the first backup.
pub fn backup_dir_for(checkpoint_dir: &Path, at: DateTime<Local>) -> PathBuf {
    let base = checkpoint_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    let stamp = at.format("%Y%m%d%H%M%S").to_string();

    let candidate = |counter: u32| {
        let mut name = base.clone();
        if counter == 0 {
            name.push(format!(".{}.backup", stamp));
        } else {
            name.push(format!(".{}-{}.backup", stamp, counter));
        }
        checkpoint_dir.with_file_name(name)
    };

    let mut counter = 0;
    let mut path = candidate(counter);
    while path.exists() {
        counter += 1;
        path = candidate(counter);
    }
    path
}

pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn connection_target(mut self, target: impl Into<String>) -> Self {
        self.config.connection_target = target.into();
        self
    }

    pub fn script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.script_path = path.into();
        self
    }

    /// Enable logging to `path`
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.enable_logging = true;
        self.config.log_file_path = Some(path.into());
        self
    }

    pub fn enable_logging(mut self, enable: bool) -> Self {
        self.config.enable_logging = enable;
        self
    }

    pub fn compact_log(mut self, compact: bool) -> Self {
        self.config.compact_log = compact;
        self
    }

    pub fn max_log_entries(mut self, max: usize) -> Self {
        self.config.max_log_entries = max;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn unit_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.config.unit_delimiter = delimiter.into();
        self
    }

    pub fn continue_from_last_session(mut self, resume: bool) -> Self {
        self.config.continue_from_last_session = resume;
        self
    }

    pub fn addressing_mode(mut self, mode: AddressingMode) -> Self {
        self.config.addressing_mode = mode;
        self
    }

    pub fn retry_interval_secs(mut self, secs: u64) -> Self {
        self.config.retry_interval_secs = secs;
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.config.retry_count = count;
        self
    }

    pub fn retry_backoff(mut self, backoff: bool) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    pub fn build(self) -> RunnerResult<RunConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
