//! Retrying executor with flat random backoff
//!
//! A [`RetryPolicy`] wraps any operation that yields an [`AttemptResult`].
//! `Ok(Some(value))` ends the loop; `Ok(None)` ("ran, found nothing yet") and
//! `Err(Fault)` both count as a failed attempt.
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | `Ok(Some(v))` | Return `Success` immediately |
//! | `Ok(None)` | Sleep a random delay in `[min, max]`, retry |
//! | `Err(fault)` | Sleep a random delay in `[min, max]`, retry |
//! | `max_attempts` failures | Return `Exhausted` |

use crate::config::RetryConfig;
use crate::{AttemptResult, Fault};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Result of running an operation under a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// The operation produced a value on attempt `attempts`
    Success { value: T, attempts: u32 },

    /// Every attempt failed
    Exhausted { attempts: u32 },
}

/// Bounded attempts with a uniformly random pause between them
///
/// The policy holds no state between calls, so a single value can wrap any
/// number of operations concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    min_delay: Duration,
    max_delay: Duration,
    refresh_every: Option<u32>,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1 and the delay
    /// bounds are swapped if given in the wrong order
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };

        Self {
            max_attempts: max_attempts.max(1),
            min_delay,
            max_delay,
            refresh_every: None,
        }
    }

    /// Same pause after every failed attempt
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, delay)
    }

    /// Only refresh the session after every `n`-th failed attempt
    pub fn with_refresh_every(mut self, n: u32) -> Self {
        self.refresh_every = Some(n.max(1));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draws one backoff delay from `[min_delay, max_delay]`
    pub fn backoff(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }

        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Runs `op` until it yields a value or the attempts run out
    ///
    /// `op` receives the 1-based attempt number. The caller keeps ownership of
    /// whatever resource `op` works on and must clean it up after exhaustion.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        self.execute(label, op, None::<fn() -> std::future::Ready<Result<(), Fault>>>)
            .await
    }

    /// Like [`run`](Self::run), but calls `refresh` between failed attempts
    ///
    /// Used for operations tied to a stateful session that goes stale, such as
    /// a page that has to be reloaded before it is read again. A failing
    /// refresh is logged and does not count as an attempt.
    pub async fn run_with_refresh<T, F, Fut, R, RFut>(
        &self,
        label: &str,
        op: F,
        refresh: R,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
        R: FnMut() -> RFut,
        RFut: Future<Output = Result<(), Fault>>,
    {
        self.execute(label, op, Some(refresh)).await
    }

    async fn execute<T, F, Fut, R, RFut>(
        &self,
        label: &str,
        mut op: F,
        mut refresh: Option<R>,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
        R: FnMut() -> RFut,
        RFut: Future<Output = Result<(), Fault>>,
    {
        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(Some(value)) => {
                    if attempt > 1 {
                        tracing::info!("{}: succeeded on attempt {}", label, attempt);
                    }
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Ok(None) => {
                    tracing::debug!(
                        "{}: attempt {}/{} returned no result",
                        label,
                        attempt,
                        self.max_attempts
                    );
                }
                Err(fault) => {
                    tracing::debug!(
                        "{}: attempt {}/{} failed: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        fault
                    );
                }
            }

            if attempt == self.max_attempts {
                break;
            }

            tokio::time::sleep(self.backoff()).await;

            if let Some(refresh) = refresh.as_mut() {
                if attempt % self.refresh_every.unwrap_or(1) == 0 {
                    if let Err(fault) = refresh().await {
                        tracing::warn!(
                            "{}: refresh after attempt {} failed: {}",
                            label,
                            attempt,
                            fault
                        );
                    }
                }
            }
        }

        tracing::warn!(
            "{}: giving up after {} attempts",
            label,
            self.max_attempts
        );
        RetryOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let policy = Self::new(
            config.max_attempts,
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        );

        match config.refresh_every {
            Some(n) => policy.with_refresh_every(n),
            None => policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::fixed(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_always_none_makes_exactly_max_attempts() {
        let calls = AtomicU32::new(0);

        let outcome: RetryOutcome<()> = instant(4)
            .run("always-none", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 4 });
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_success_on_third_attempt() {
        let calls = AtomicU32::new(0);

        let outcome = instant(3)
            .run("flaky", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Ok(None)
                    } else {
                        Ok(Some("ok"))
                    }
                }
            })
            .await;

        assert_eq!(
            outcome,
            RetryOutcome::Success {
                value: "ok",
                attempts: 3
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_faults_count_as_failed_attempts() {
        let outcome = instant(5)
            .run("faulty", |attempt| async move {
                match attempt {
                    1 => Err(Fault::transient("connection reset")),
                    2 => Err(Fault::empty("empty body")),
                    _ => Ok(Some(attempt)),
                }
            })
            .await;

        assert_eq!(
            outcome,
            RetryOutcome::Success {
                value: 3,
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_runs_between_attempts_only() {
        let refreshes = AtomicU32::new(0);

        let outcome: RetryOutcome<()> = instant(3)
            .run_with_refresh(
                "reload",
                |_| async { Ok(None) },
                || {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
            )
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
        // Two gaps between three attempts
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_every_nth_failure() {
        let refreshes = AtomicU32::new(0);

        let _: RetryOutcome<()> = instant(7)
            .with_refresh_every(3)
            .run_with_refresh(
                "reload",
                |_| async { Err(Fault::transient("timeout")) },
                || {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    async { Err(Fault::transient("reload failed too")) }
                },
            )
            .await;

        // After failed attempts 3 and 6
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempts_are_sequential() {
        let counter = AtomicU32::new(0);
        let in_flight = &counter;

        let outcome: RetryOutcome<()> = instant(5)
            .run("sequential", move |_| {
                let overlapping = in_flight.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert_eq!(overlapping, 0);
                    tokio::task::yield_now().await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(None)
                }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 5 });
    }

    #[test]
    fn test_backoff_stays_in_range() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20), Duration::from_millis(30));
        for _ in 0..200 {
            let delay = policy.backoff();
            assert!(delay >= Duration::from_millis(20));
            assert!(delay <= Duration::from_millis(30));
        }
    }

    #[test]
    fn test_policy_normalizes_arguments() {
        let policy = RetryPolicy::new(0, Duration::from_millis(50), Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.backoff() >= Duration::from_millis(10));
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 60,
            min_delay_ms: 2000,
            max_delay_ms: 3000,
            refresh_every: Some(3),
        });

        assert_eq!(policy.max_attempts(), 60);
        assert_eq!(policy.refresh_every, Some(3));
    }
}
