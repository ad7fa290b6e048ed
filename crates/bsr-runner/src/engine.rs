//! The batch loop
//!
//! [`RunEngine::run`] reads the script unit by unit, groups units that are
//! not yet checkpointed into batches, executes each batch with retry and
//! checkpoints its units only once execution succeeded. A stop request is
//! honored between batches; a batch in flight always finishes or fails first.

mod connector;
mod state;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use bsr_core::BsrError;
use bsr_drivers::DriverRegistry;
use chrono::Local;
use parking_lot::{Mutex, RwLock};

pub use connector::{Connector, RegistryConnector};
pub use state::{RunProgress, RunState, RunSummary};

use crate::batch::BatchAssembler;
use crate::checkpoint::{CHECKPOINT_DB_FILE, CheckpointStore, CheckpointSummary};
use crate::config::{RunConfig, backup_dir_for};
use crate::log::{LogAggregator, LogEntry, SinkId};
use crate::retry::{RetryExecutor, RetryOutcome};
use crate::unit::UnitReader;
use crate::{RunnerError, RunnerResult};

type StopHook = Box<dyn FnOnce() + Send>;

/// Drives one script against one connection target.
///
/// The engine is `Sync`: share it in an `Arc` to request a stop or read the
/// log from another task while [`run`](Self::run) is in progress.
pub struct RunEngine {
    config: RwLock<RunConfig>,
    connector: Arc<dyn Connector>,
    log: Arc<LogAggregator>,
    state: Mutex<RunState>,
    stop_requested: AtomicBool,
    on_stopped: Mutex<Option<StopHook>>,
    file_sink: Mutex<Option<(SinkId, PathBuf)>>,
}

impl RunEngine {
    /// Engine connecting through `registry`; an unknown driver or malformed
    /// connection target fails here.
    pub fn new(config: RunConfig, registry: Arc<DriverRegistry>) -> RunnerResult<Self> {
        Self::with_connector(config, RegistryConnector::new(registry))
    }

    pub fn with_connector(config: RunConfig, connector: impl Connector) -> RunnerResult<Self> {
        config.validate()?;
        check_target(&connector, config.connection_target())?;

        let log = LogAggregator::new(config.max_log_entries(), config.compact_log());
        Ok(Self {
            config: RwLock::new(config),
            connector: Arc::new(connector),
            log: Arc::new(log),
            state: Mutex::new(RunState::Idle),
            stop_requested: AtomicBool::new(false),
            on_stopped: Mutex::new(None),
            file_sink: Mutex::new(None),
        })
    }

    pub fn config(&self) -> RunConfig {
        self.config.read().clone()
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub fn log(&self) -> Arc<LogAggregator> {
        self.log.clone()
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.config.read().checkpoint_dir()
    }

    /// Ask the running loop to stop at the next batch boundary
    pub fn request_stop(&self) {
        tracing::info!("stop requested");
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Like [`request_stop`](Self::request_stop), invoking `on_stopped` once
    /// the loop has actually stopped
    pub fn request_stop_with(&self, on_stopped: impl FnOnce() + Send + 'static) {
        *self.on_stopped.lock() = Some(Box::new(on_stopped));
        self.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Write the current configuration; `None` uses [`RunConfig::default_path`]
    pub fn save_config(&self, path: Option<&Path>) -> RunnerResult<PathBuf> {
        let path = resolve_config_path(path)?;
        self.config.read().save_to_file(&path)?;
        Ok(path)
    }

    /// Replace the configuration from a file.
    ///
    /// Returns `Ok(false)` when the file does not exist. Log capacity and
    /// compaction keep the values the engine was created with.
    pub fn load_config(&self, path: Option<&Path>) -> RunnerResult<bool> {
        let path = resolve_config_path(path)?;
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no config file to load");
            return Ok(false);
        }

        let config = RunConfig::from_file(&path)?;
        check_target(self.connector.as_ref(), config.connection_target())?;
        *self.config.write() = config;
        tracing::info!(path = %path.display(), "loaded run config");
        Ok(true)
    }

    /// Marker counts of the checkpoint directory, without running.
    ///
    /// Never creates a store: a job directory without a database reports
    /// zero markers.
    pub fn checkpoint_summary(&self) -> RunnerResult<CheckpointSummary> {
        let config = self.config();
        let dir = config.checkpoint_dir();
        if !dir.join(CHECKPOINT_DB_FILE).is_file() {
            return Ok(CheckpointSummary::default());
        }
        let mut store = CheckpointStore::open(&dir, config.addressing_mode())?;
        let summary = store.summary()?;
        store.close()?;
        Ok(summary)
    }

    /// Run the script to completion, cancellation or failure.
    ///
    /// `on_progress` receives cumulative counters after every batch and
    /// `on_error` the message of every failure that is about to be retried.
    /// A failure that outlives its retries is returned as
    /// [`RunnerError::Execution`] with all earlier batches checkpointed.
    pub async fn run<P, E>(&self, mut on_progress: P, mut on_error: E) -> RunnerResult<RunSummary>
    where
        P: FnMut(RunProgress) + Send,
        E: FnMut(&str) + Send,
    {
        let config = self.config();
        if !config.script_path().is_file() {
            return Err(RunnerError::Configuration(format!(
                "script file not found: {}",
                config.script_path().display()
            )));
        }

        let guard = self.begin()?;
        tracing::info!(
            script = %config.script_path().display(),
            batch_size = config.batch_size(),
            mode = %config.addressing_mode(),
            "starting run"
        );

        let result = self.run_session(&config, &mut on_progress, &mut on_error).await;

        let state = match &result {
            Ok(summary) => summary.state,
            Err(e) => {
                tracing::error!(error = %e, "run failed");
                self.log.append(LogEntry::notification(format!("Run failed: {}", e)), true);
                RunState::Failed
            }
        };
        guard.finish(state);
        result
    }

    fn begin(&self) -> RunnerResult<RunGuard<'_>> {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            return Err(RunnerError::Configuration("a run is already in progress".into()));
        }
        *state = RunState::Running;
        self.stop_requested.store(false, Ordering::SeqCst);
        self.on_stopped.lock().take();
        Ok(RunGuard { engine: self })
    }

    async fn run_session<P, E>(&self, config: &RunConfig, on_progress: &mut P, on_error: &mut E) -> RunnerResult<RunSummary>
    where
        P: FnMut(RunProgress) + Send,
        E: FnMut(&str) + Send,
    {
        let checkpoint_dir = config.checkpoint_dir();
        if !config.continue_from_last_session() && checkpoint_dir.exists() {
            let backup = backup_dir_for(&checkpoint_dir, Local::now());
            std::fs::rename(&checkpoint_dir, &backup)?;
            tracing::info!(backup = %backup.display(), "moved previous checkpoints aside");
        }

        let mut store = CheckpointStore::open(&checkpoint_dir, config.addressing_mode())?;
        self.attach_log_file(config);
        self.log.append(
            LogEntry::notification(format!("Run started: {}", config.script_path().display())),
            true,
        );

        let script = File::open(config.script_path())?;
        let mut reader = UnitReader::new(BufReader::new(script), config.unit_delimiter());

        let outcome = self
            .drive(config, &mut store, &mut reader, on_progress, on_error)
            .await;
        let closed = store.close();

        let summary = outcome?;
        closed?;
        Ok(summary)
    }

    async fn drive<R, P, E>(
        &self,
        config: &RunConfig,
        store: &mut CheckpointStore,
        reader: &mut UnitReader<R>,
        on_progress: &mut P,
        on_error: &mut E,
    ) -> RunnerResult<RunSummary>
    where
        R: BufRead + Send,
        P: FnMut(RunProgress) + Send,
        E: FnMut(&str) + Send,
    {
        let assembler = BatchAssembler::new(config.batch_size())?;
        let retry = RetryExecutor::new(config.retry_policy());
        let mut summary = RunSummary {
            state: RunState::Running,
            ..RunSummary::default()
        };

        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                tracing::info!(units_read = summary.units_read, "run canceled");
                self.log.append(
                    LogEntry::notification(format!("Run canceled after {} units.", summary.units_read)),
                    true,
                );
                let on_stopped = self.on_stopped.lock().take();
                if let Some(on_stopped) = on_stopped {
                    on_stopped();
                }
                summary.state = RunState::Canceled;
                return Ok(summary);
            }

            let batch = assembler.next_batch(reader, store, summary.units_read)?;
            summary.units_read = batch.next_index();
            summary.units_skipped += batch.skipped_count();

            if batch.is_empty() {
                tracing::info!(
                    units_read = summary.units_read,
                    affected_rows = summary.affected_rows,
                    "run completed"
                );
                self.log.append(
                    LogEntry::notification(format!(
                        "Run completed: {} units executed, {} rows affected.",
                        summary.units_executed, summary.affected_rows
                    )),
                    true,
                );
                summary.state = RunState::Completed;
                return Ok(summary);
            }

            let sql = batch.combined_sql();
            if !sql.trim().is_empty() {
                let affected = self
                    .execute_batch(config.connection_target(), &sql, &retry, on_error)
                    .await?;
                summary.affected_rows += affected;
                summary.batches_executed += 1;
            }

            // Only after the batch is known to have succeeded
            store.mark_executed(batch.units())?;
            summary.units_executed += batch.len() as u64;
            tracing::debug!(
                first = batch.units()[0].index(),
                units = batch.len(),
                "batch checkpointed"
            );

            let progress = summary.progress();
            self.log
                .append(LogEntry::progress(progress.executed_units, progress.affected_rows), true);
            on_progress(progress);
        }
    }

    async fn execute_batch<E>(&self, target: &str, sql: &str, retry: &RetryExecutor, on_error: &mut E) -> RunnerResult<u64>
    where
        E: FnMut(&str) + Send,
    {
        let connector = &self.connector;
        let log = &self.log;

        let outcome = retry
            .run(
                |attempt| async move {
                    tracing::trace!(attempt, "executing batch");
                    let conn = connector.connect(target).await?;
                    let result = conn.execute_batch(sql).await;
                    if let Err(e) = conn.close().await {
                        tracing::debug!(error = %e, "failed to close connection");
                    }
                    result
                },
                |err: &BsrError, attempt| {
                    let message = format!("{}; retry in {} seconds...", err, attempt.delay.as_secs());
                    tracing::warn!(
                        attempt = attempt.index,
                        remaining = attempt.remaining,
                        connection_failure = err.is_connection_failure(),
                        error = %err,
                        "batch failed"
                    );
                    log.append(LogEntry::notification(message.clone()), true);
                    on_error(&message);
                },
            )
            .await
            .map_err(|source| RunnerError::Execution {
                attempts: retry.policy().attempts(),
                source,
            })?;

        match outcome {
            RetryOutcome::Succeeded(result) => Ok(result.affected_rows),
            RetryOutcome::GaveUp { attempts } => Err(RunnerError::Execution {
                attempts,
                source: BsrError::Other("batch execution gave up".into()),
            }),
        }
    }

    /// Keep exactly one file sink for the configured log path, seeding the
    /// log from that file when resuming
    fn attach_log_file(&self, config: &RunConfig) {
        let mut file_sink = self.file_sink.lock();

        let wanted = config.log_file_path().filter(|_| config.enable_logging());
        if file_sink.as_ref().map(|(_, path)| path.as_path()) == wanted {
            return;
        }
        if let Some((id, _)) = file_sink.take() {
            self.log.unsubscribe(id);
        }
        let Some(path) = wanted else {
            return;
        };

        if config.continue_from_last_session()
            && self.log.is_empty()
            && path.is_file()
            && let Err(e) = self.log.load_file(path)
        {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable log file");
        }

        let sink_path = path.to_path_buf();
        let id = self.log.subscribe(move |rendered: &str| -> anyhow::Result<()> {
            if let Some(parent) = sink_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&sink_path, rendered)
                .with_context(|| format!("failed to write log file {}", sink_path.display()))
        });
        *file_sink = Some((id, path.to_path_buf()));
    }
}

/// Owns the `Running` state for the duration of one `run` call.
///
/// A run future dropped mid-batch (timeout, `select!`, aborted task) never
/// reaches `finish`, so the guard moves the engine to `Failed` on drop and
/// the next `run` can start.
struct RunGuard<'a> {
    engine: &'a RunEngine,
}

impl RunGuard<'_> {
    fn finish(self, state: RunState) {
        *self.engine.state.lock() = state;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.state.lock();
        if state.is_terminal() {
            return;
        }
        *state = RunState::Failed;
        drop(state);

        tracing::warn!("run dropped before it finished");
        self.engine
            .log
            .append(LogEntry::notification("Run aborted before it finished."), true);
    }
}

fn check_target(connector: &dyn Connector, target: &str) -> RunnerResult<()> {
    connector
        .validate_target(target)
        .map_err(|e| RunnerError::Configuration(format!("invalid connection target '{}': {}", target, e)))
}

fn resolve_config_path(path: Option<&Path>) -> RunnerResult<PathBuf> {
    match path {
        Some(p) if p.as_os_str().is_empty() => {
            Err(RunnerError::Configuration("config path cannot be blank".into()))
        }
        Some(p) => Ok(p.to_path_buf()),
        None => RunConfig::default_path(),
    }
}
