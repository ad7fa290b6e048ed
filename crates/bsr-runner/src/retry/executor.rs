//! Retry loop driving an async action

use std::future::Future;
use std::time::Duration;

use super::BackoffStrategy;

/// How long to wait between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDelay {
    Fixed(Duration),
    Backoff(BackoffStrategy),
}

impl RetryDelay {
    pub fn fixed_secs(secs: u64) -> Self {
        RetryDelay::Fixed(Duration::from_secs(secs))
    }

    /// Delay after the failure of zero-based `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::Backoff(backoff) => backoff.calculate_delay(attempt),
        }
    }
}

/// Retry parameters.
///
/// `attempts` is the total number of tries including the first one and is
/// never below 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: RetryDelay,
    propagate_errors: bool,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: RetryDelay) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
            propagate_errors: true,
        }
    }

    /// A policy that makes one initial attempt plus `retry_count` retries
    pub fn from_retry_count(retry_count: u32, delay: RetryDelay) -> Self {
        Self::new(retry_count.saturating_add(1), delay)
    }

    /// Single attempt, no delay
    pub fn no_retry() -> Self {
        Self::new(1, RetryDelay::Fixed(Duration::ZERO))
    }

    /// When disabled, exhausting every attempt yields
    /// [`RetryOutcome::GaveUp`] instead of the last error.
    pub fn with_propagate_errors(mut self, propagate: bool) -> Self {
        self.propagate_errors = propagate;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> &RetryDelay {
        &self.delay
    }

    pub fn propagates_errors(&self) -> bool {
        self.propagate_errors
    }
}

impl Default for RetryPolicy {
    /// 1 attempt + 9 retries, 3 seconds apart
    fn default() -> Self {
        Self::from_retry_count(9, RetryDelay::fixed_secs(3))
    }
}

/// Details handed to the retry hook before the executor sleeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// Zero-based index of the attempt that just failed
    pub index: u32,
    /// Attempts still available after this one
    pub remaining: u32,
    /// Sleep before the next attempt
    pub delay: Duration,
}

/// Result of a retried action that did not propagate its last error
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T> {
    Succeeded(T),
    GaveUp { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded(value) => Some(value),
            RetryOutcome::GaveUp { .. } => None,
        }
    }
}

/// Runs an action under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `action` until it succeeds or the attempts are used up.
    ///
    /// `action` receives the zero-based attempt index. `on_retry` is called
    /// once for every failure that will be retried, never for the final one.
    pub async fn run<T, E, F, Fut, R>(&self, mut action: F, mut on_retry: R) -> Result<RetryOutcome<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(&E, RetryAttempt),
        E: std::fmt::Display,
    {
        let attempts = self.policy.attempts;
        let mut attempt = 0u32;

        loop {
            match action(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempts_taken = attempt + 1, "action succeeded after retry");
                    }
                    return Ok(RetryOutcome::Succeeded(value));
                }
                Err(err) => {
                    if attempt + 1 >= attempts {
                        tracing::warn!(attempts, error = %err, "retry attempts exhausted");
                        if self.policy.propagate_errors {
                            return Err(err);
                        }
                        return Ok(RetryOutcome::GaveUp { attempts });
                    }

                    let delay = self.policy.delay.delay_for(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    on_retry(
                        &err,
                        RetryAttempt {
                            index: attempt,
                            remaining: attempts - attempt - 1,
                            delay,
                        },
                    );

                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
