//! User-visible run log
//!
//! The engine appends a `Progress` entry after every batch and a
//! `Notification` for starts, retries and terminal states. The aggregator
//! keeps a bounded, optionally compacted buffer and pushes the rendered text
//! to registered sinks, for instance a log file rewritten after each append.

mod aggregator;
mod entry;


pub use aggregator::{DEFAULT_MAX_LOG_ENTRIES, LogAggregator, LogSink, SinkId};
pub use entry::{LogEntry, LogKind, LogPayload, TIMESTAMP_FORMAT};
