//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use bsr_core::{BsrError, Connection, Result, StatementResult};
use bsr_runner::{Connector, RunConfig, RunConfigBuilder};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared state behind every connection a [`MockConnector`] hands out.
#[derive(Default)]
pub struct MockState {
    /// Every SQL blob passed to `execute_batch`, failed attempts included
    pub batch_log: Mutex<Vec<String>>,
    pub connect_count: AtomicUsize,
    /// Number of upcoming `execute_batch` calls that fail
    pub fail_next: AtomicUsize,
    /// Blobs containing this text always fail
    pub fail_when_contains: Mutex<Option<String>>,
    pub refuse_connections: AtomicBool,
}

/// Connector whose connections count `INSERT` lines as affected rows.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_next(self, times: usize) -> Self {
        self.state.fail_next.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_on(self, pattern: impl Into<String>) -> Self {
        *self.state.fail_when_contains.lock() = Some(pattern.into());
        self
    }

    pub fn stop_failing(&self) {
        *self.state.fail_when_contains.lock() = None;
        self.state.fail_next.store(0, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<String> {
        self.state.batch_log.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.connect_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _target: &str) -> Result<Arc<dyn Connection>> {
        self.state.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.state.refuse_connections.load(Ordering::SeqCst) {
            return Err(BsrError::Connection("connection refused".into()));
        }
        Ok(Arc::new(MockConnection {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn validate_target(&self, target: &str) -> Result<()> {
        if target.starts_with("mock:") {
            Ok(())
        } else {
            Err(BsrError::Configuration(format!("not a mock target: {}", target)))
        }
    }
}

pub struct MockConnection {
    state: Arc<MockState>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        self.state.batch_log.lock().push(sql.to_string());

        let scheduled_failure = self
            .state
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled_failure {
            return Err(BsrError::Connection("transport error".into()));
        }
        if let Some(pattern) = self.state.fail_when_contains.lock().as_deref()
            && sql.contains(pattern)
        {
            return Err(BsrError::Query(format!("cannot run '{}'", pattern)));
        }

        let inserts = sql
            .lines()
            .filter(|line| line.trim_start().to_uppercase().starts_with("INSERT"))
            .count();
        Ok(StatementResult::with_affected_rows(inserts as u64))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn write_script(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Builder with zero retries and no retry delay
pub fn config_for(script: &Path) -> RunConfigBuilder {
    RunConfig::builder("mock:test", script)
        .retry_count(0)
        .retry_interval_secs(0)
}
