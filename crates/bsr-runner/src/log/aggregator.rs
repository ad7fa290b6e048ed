//! Bounded, compacting log buffer with push-style sinks

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use super::entry::{LogEntry, LogKind};
use crate::{RunnerError, RunnerResult};

/// Default number of retained entries
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 10_000;

/// Handle returned by [`LogAggregator::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

/// Receives the full rendered log after every notifying append
pub trait LogSink: Send + Sync {
    fn write_log(&self, rendered: &str) -> anyhow::Result<()>;
}

impl<F> LogSink for F
where
    F: Fn(&str) -> anyhow::Result<()> + Send + Sync,
{
    fn write_log(&self, rendered: &str) -> anyhow::Result<()> {
        self(rendered)
    }
}

struct LogBuffer {
    /// Arrival order, oldest first
    entries: VecDeque<LogEntry>,
    /// Bumped on every mutation, including compaction and eviction
    revision: u64,
    rendered: Option<(u64, String)>,
}

/// Thread-safe run log shared between the engine and any number of readers
pub struct LogAggregator {
    capacity: usize,
    compact: bool,
    buffer: Mutex<LogBuffer>,
    sinks: RwLock<Vec<(SinkId, Arc<dyn LogSink>)>>,
    next_sink_id: AtomicU64,
}

impl LogAggregator {
    /// `capacity` is clamped to at least one entry
    pub fn new(capacity: usize, compact: bool) -> Self {
        Self {
            capacity: capacity.max(1),
            compact,
            buffer: Mutex::new(LogBuffer {
                entries: VecDeque::new(),
                revision: 0,
                rendered: None,
            }),
            sinks: RwLock::new(Vec::new()),
            next_sink_id: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_compacting(&self) -> bool {
        self.compact
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().entries.is_empty()
    }

    /// Snapshot of retained entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer.lock().entries.iter().cloned().collect()
    }

    /// Add an entry, then push the rendered log to sinks when `notify` is set.
    ///
    /// With compaction on, a Progress entry directly following another
    /// Progress entry replaces it.
    pub fn append(&self, entry: LogEntry, notify: bool) {
        {
            let mut buffer = self.buffer.lock();
            if self.compact
                && entry.kind() == LogKind::Progress
                && buffer.entries.back().is_some_and(|last| last.kind() == LogKind::Progress)
            {
                buffer.entries.pop_back();
            }
            buffer.entries.push_back(entry);
            while buffer.entries.len() > self.capacity {
                buffer.entries.pop_front();
            }
            buffer.revision += 1;
        }

        if notify {
            self.notify_sinks();
        }
    }

    /// Retained entries rendered newest first, one per line
    pub fn render(&self) -> String {
        let mut buffer = self.buffer.lock();
        if let Some((revision, text)) = &buffer.rendered
            && *revision == buffer.revision
        {
            return text.clone();
        }

        let text = buffer
            .entries
            .iter()
            .rev()
            .map(LogEntry::render_line)
            .collect::<Vec<_>>()
            .join("\n");
        buffer.rendered = Some((buffer.revision, text.clone()));
        text
    }

    pub fn subscribe(&self, sink: impl LogSink + 'static) -> SinkId {
        let id = SinkId(self.next_sink_id.fetch_add(1, Ordering::Relaxed));
        self.sinks.write().push((id, Arc::new(sink)));
        id
    }

    /// Returns false when the id was not registered
    pub fn unsubscribe(&self, id: SinkId) -> bool {
        let mut sinks = self.sinks.write();
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id);
        sinks.len() != before
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Replace the buffer with entries parsed from rendered lines.
    ///
    /// Lines are expected newest first, as [`render`](Self::render) writes
    /// them; at most `capacity` of them are read. Any malformed line fails
    /// the whole load and leaves the buffer untouched.
    pub fn load_lines<I, S>(&self, lines: I) -> RunnerResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = Vec::new();
        for (i, line) in lines.into_iter().take(self.capacity).enumerate() {
            let line = line.as_ref();
            let entry = LogEntry::parse_line(line).map_err(|reason| RunnerError::LogParse {
                line_number: i + 1,
                line: line.to_string(),
                reason,
            })?;
            loaded.push(entry);
        }
        loaded.reverse();

        let count = loaded.len();
        let mut buffer = self.buffer.lock();
        buffer.entries = loaded.into();
        buffer.revision += 1;
        Ok(count)
    }

    pub fn load_file(&self, path: &Path) -> RunnerResult<usize> {
        let content = std::fs::read_to_string(path)?;
        let count = self.load_lines(content.lines())?;
        tracing::debug!(path = %path.display(), count, "loaded log entries");
        Ok(count)
    }

    /// Write the rendered log to `path`, creating parent directories
    pub fn export(&self, path: &Path) -> RunnerResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render())?;
        Ok(())
    }

    fn notify_sinks(&self) {
        let sinks: Vec<(SinkId, Arc<dyn LogSink>)> = self.sinks.read().clone();
        if sinks.is_empty() {
            return;
        }

        let rendered = self.render();
        for (id, sink) in sinks {
            if let Err(e) = sink.write_log(&rendered) {
                tracing::warn!(sink = id.0, error = %e, "log sink failed");
            }
        }
    }
}

impl Default for LogAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_ENTRIES, true)
    }
}
