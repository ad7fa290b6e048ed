//! Resumable batch execution of very large SQL scripts
//!
//! A script is split into units by a delimiter line (`GO` by default), units
//! are grouped into batches, and every batch that executes successfully is
//! checkpointed so an interrupted run picks up where it stopped.
//!
//! - `UnitReader` - splits a script stream into delimiter-separated units
//! - `CheckpointStore` - persistent "already executed" markers per unit
//! - `BatchAssembler` - groups not-yet-executed units into batches
//! - `RetryExecutor` - bounded retry with fixed or exponential delay
//! - `LogAggregator` - bounded, compacting, user-visible run log
//! - `RunEngine` - drives the whole loop with cooperative cancellation

pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod engine;
mod error;
pub mod log;
pub mod retry;
pub mod unit;

pub use batch::{Batch, BatchAssembler};
pub use checkpoint::{
    AddressingMode, CheckpointKey, CheckpointStore, CheckpointSummary, KvStore, MemoryKvStore,
    SqliteKvStore,
};
pub use config::{RunConfig, RunConfigBuilder};
pub use engine::{Connector, RegistryConnector, RunEngine, RunProgress, RunState, RunSummary};
pub use error::{RunnerError, RunnerResult};
pub use log::{LogAggregator, LogEntry, LogKind, LogPayload, LogSink, SinkId};
pub use retry::{BackoffStrategy, RetryAttempt, RetryDelay, RetryExecutor, RetryOutcome, RetryPolicy};
pub use unit::{Unit, UnitReader, combine_units};
