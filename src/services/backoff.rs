use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Immutable retry policy for one executor invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Total number of attempts permitted. Zero permits none.
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_retries: 3,
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackoffError<E> {
    #[error("Retry policy permits no attempts")]
    NoAttempts,

    #[error("Operation failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: E },

    /// An attempt failed with an error the caller marked as not retryable.
    #[error("Operation aborted on attempt {attempts}: {error}")]
    Aborted { attempts: u32, error: E },
}

/// Marker error for an attempt cut off by its timeout scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Attempt timed out after {0:?}")]
pub struct AttemptTimedOut(pub Duration);

/// Per-invocation retry bookkeeping.
#[derive(Debug)]
struct RetryState<'a> {
    attempt: u32,
    delay: Duration,
    policy: &'a BackoffPolicy,
}

impl<'a> RetryState<'a> {
    fn new(policy: &'a BackoffPolicy) -> Self {
        Self {
            attempt: 0,
            delay: policy.initial_delay,
            policy,
        }
    }

    fn has_attempts_left(&self) -> bool {
        self.attempt < self.policy.max_retries
    }

    /// Wait to apply before the next attempt, then grow the internal delay.
    ///
    /// The cap applies to the effective wait only; the counter keeps growing.
    fn next_wait(&mut self) -> Duration {
        let capped = self.delay.min(self.policy.max_delay);
        let wait = if self.policy.jitter {
            capped.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            capped
        };
        self.delay = Duration::try_from_secs_f64(
            self.delay.as_secs_f64() * self.policy.backoff_factor.max(0.0),
        )
        .unwrap_or(Duration::MAX);
        wait
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// With `max_retries == 0` the operation is never invoked.
pub async fn execute_with_backoff<F, Fut, T, E>(
    operation: F,
    policy: &BackoffPolicy,
) -> Result<T, BackoffError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    execute_with_backoff_when(operation, policy, |_| true).await
}

/// [`execute_with_backoff`] that stops at the first error `is_retryable`
/// rejects, returning [`BackoffError::Aborted`].
pub async fn execute_with_backoff_when<F, Fut, T, E, R>(
    mut operation: F,
    policy: &BackoffPolicy,
    is_retryable: R,
) -> Result<T, BackoffError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let mut state = RetryState::new(policy);

    while state.has_attempts_left() {
        let err = match operation().await {
            Ok(value) => {
                if state.attempt > 0 {
                    tracing::debug!(attempt = state.attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        state.attempt += 1;
        if !is_retryable(&err) {
            tracing::error!(attempt = state.attempt, error = %err, "Operation failed, not retryable");
            return Err(BackoffError::Aborted {
                attempts: state.attempt,
                error: err,
            });
        }
        if state.attempt == policy.max_retries {
            tracing::error!(
                attempts = state.attempt,
                error = %err,
                "Operation failed, retries exhausted"
            );
            return Err(BackoffError::RetriesExhausted {
                attempts: state.attempt,
                last: err,
            });
        }

        let wait = state.next_wait();
        tracing::warn!(
            attempt = state.attempt,
            max_retries = policy.max_retries,
            delay_ms = wait.as_millis() as u64,
            error = %err,
            "Operation failed, backing off before retry"
        );
        tokio::time::sleep(wait).await;
    }

    Err(BackoffError::NoAttempts)
}

/// Like [`execute_with_backoff`], but each attempt runs in its own timeout
/// scope. An attempt exceeding `timeout` is dropped and counted as a failure
/// (`E::from(AttemptTimedOut)`); the retry schedule continues as normal.
pub async fn execute_with_timeout<F, Fut, T, E>(
    operation: F,
    timeout: Duration,
    policy: &BackoffPolicy,
) -> Result<T, BackoffError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + From<AttemptTimedOut>,
{
    execute_with_timeout_when(operation, timeout, policy, |_| true).await
}

/// [`execute_with_timeout`] with a retry classifier, as in
/// [`execute_with_backoff_when`].
pub async fn execute_with_timeout_when<F, Fut, T, E, R>(
    mut operation: F,
    timeout: Duration,
    policy: &BackoffPolicy,
    is_retryable: R,
) -> Result<T, BackoffError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + From<AttemptTimedOut>,
    R: Fn(&E) -> bool,
{
    execute_with_backoff_when(
        || {
            let attempt = operation();
            async move {
                match tokio::time::timeout(timeout, attempt).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(E::from(AttemptTimedOut(timeout))),
                }
            }
        },
        policy,
        is_retryable,
    )
    .await
}
