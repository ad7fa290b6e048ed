//! Bounded retry for the batch execution primitive
//!
//! A failing action is re-attempted up to a fixed number of times with a
//! caller-observable hook before each retry. The delay between attempts is
//! either fixed or grows exponentially.
//!
//! # Example
//!
//! ```ignore
//! use bsr_runner::retry::{RetryDelay, RetryExecutor, RetryPolicy};
//!
//! let policy = RetryPolicy::from_retry_count(9, RetryDelay::fixed_secs(3));
//! let outcome = RetryExecutor::new(policy)
//!     .run(|_attempt| conn.execute_batch(sql), |err, retry| warn(err, retry))
//!     .await?;
//! ```

mod backoff;
mod executor;

#[cfg(test)]
mod tests;

pub use backoff::BackoffStrategy;
pub use executor::{RetryAttempt, RetryDelay, RetryExecutor, RetryOutcome, RetryPolicy};
