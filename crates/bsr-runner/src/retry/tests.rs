//! Tests for the retry module

use super::*;
use std::cell::Cell;
use std::time::Duration;

mod backoff_tests {
    use super::*;

    #[test]
    fn test_backoff_exponential_growth() {
        let backoff = BackoffStrategy::new(100, 30_000);

        assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(backoff.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(backoff.calculate_delay(4), Duration::from_millis(1600));
    }

    #[test]
    fn test_backoff_max_limit() {
        let backoff = BackoffStrategy::new(3_000, 60_000);

        assert_eq!(backoff.calculate_delay(5), Duration::from_secs(60));
        assert_eq!(backoff.calculate_delay(500), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_custom_multiplier() {
        let backoff = BackoffStrategy::new(100, 30_000).with_multiplier(3.0);
        assert_eq!(backoff.calculate_delay(2), Duration::from_millis(900));

        let clamped = BackoffStrategy::new(100, 30_000).with_multiplier(0.5);
        assert_eq!(clamped.multiplier(), 1.0);
        assert_eq!(clamped.calculate_delay(3), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_max_never_below_initial() {
        let backoff = BackoffStrategy::new(5_000, 1_000);
        assert_eq!(backoff.max_delay(), Duration::from_millis(5_000));
        assert_eq!(backoff.calculate_delay(3), Duration::from_millis(5_000));
    }
}

mod policy_tests {
    use super::*;

    #[test]
    fn test_attempts_include_first_try() {
        let policy = RetryPolicy::from_retry_count(9, RetryDelay::fixed_secs(3));
        assert_eq!(policy.attempts(), 10);
        assert_eq!(RetryPolicy::default(), policy);
    }

    #[test]
    fn test_attempts_never_zero() {
        assert_eq!(RetryPolicy::new(0, RetryDelay::fixed_secs(1)).attempts(), 1);
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
    }

    #[test]
    fn test_delay_for() {
        assert_eq!(RetryDelay::fixed_secs(3).delay_for(7), Duration::from_secs(3));
        let backoff = RetryDelay::Backoff(BackoffStrategy::new(1_000, 4_000));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
    }
}

mod executor_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_never_calls_hook() {
        let executor = RetryExecutor::new(RetryPolicy::from_retry_count(3, RetryDelay::fixed_secs(3)));
        let retries = Cell::new(0);

        let outcome = executor
            .run(
                |_| async { Ok::<_, String>(42) },
                |_, _| retries.set(retries.get() + 1),
            )
            .await
            .expect("should succeed");

        assert_eq!(outcome, RetryOutcome::Succeeded(42));
        assert_eq!(retries.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_then_success_reports_each_retry() {
        let executor = RetryExecutor::new(RetryPolicy::from_retry_count(5, RetryDelay::fixed_secs(3)));
        let mut seen = Vec::new();
        let start = tokio::time::Instant::now();

        let outcome = executor
            .run(
                |attempt| async move {
                    if attempt < 2 {
                        Err(format!("boom {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                },
                |err: &String, retry| seen.push((err.clone(), retry)),
            )
            .await
            .expect("third attempt succeeds");

        assert_eq!(outcome.into_option(), Some(2));
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "boom 0");
        assert_eq!(seen[0].1.remaining, 5);
        assert_eq!(seen[1].1.index, 1);
        assert_eq!(seen[1].1.delay, Duration::from_secs(3));
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_propagates_last_error() {
        let executor = RetryExecutor::new(RetryPolicy::from_retry_count(2, RetryDelay::fixed_secs(1)));
        let calls = Cell::new(0u32);
        let retries = Cell::new(0u32);

        let result = executor
            .run(
                |attempt| {
                    calls.set(calls.get() + 1);
                    async move { Err::<(), _>(format!("failure {attempt}")) }
                },
                |_, _| retries.set(retries.get() + 1),
            )
            .await;

        assert_eq!(result, Err("failure 2".to_string()));
        assert_eq!(calls.get(), 3);
        // The hook fires for every failure except the final one
        assert_eq!(retries.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_without_propagation() {
        let policy = RetryPolicy::from_retry_count(1, RetryDelay::fixed_secs(1)).with_propagate_errors(false);
        let executor = RetryExecutor::new(policy);

        let outcome = executor
            .run(|_| async { Err::<(), _>("nope") }, |_, _| {})
            .await
            .expect("errors are swallowed");

        assert_eq!(outcome, RetryOutcome::GaveUp { attempts: 2 });
        assert!(!outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_grow() {
        let policy = RetryPolicy::from_retry_count(
            3,
            RetryDelay::Backoff(BackoffStrategy::new(1_000, 60_000)),
        );
        let mut delays = Vec::new();

        let _ = RetryExecutor::new(policy)
            .run(|_| async { Err::<(), _>("down") }, |_, retry| delays.push(retry.delay))
            .await;

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }
}
