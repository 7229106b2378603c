//! Retry policies for calls that leave the process.
//!
//! A [`RetryPolicy`] is applied at the call site with [`RetryPolicy::run`].
//! The wait before attempt `n + 1` is `base_wait * 2^(n - 1)`, capped at
//! `max_wait`. Failures the policy does not match, and the last failure once
//! attempts are exhausted, are returned unmodified.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ComicError;

/// Which failures a policy repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    /// Every failure. Used for model calls, whose failure modes are open-ended.
    AnyFailure,
    /// Only connection, timeout and upstream overload failures.
    Transient,
}

impl RetryOn {
    pub fn matches(self, err: &ComicError) -> bool {
        match self {
            RetryOn::AnyFailure => true,
            RetryOn::Transient => err.is_transient(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_wait: Duration,
    pub max_wait: Duration,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_wait: Duration, max_wait: Duration, retry_on: RetryOn) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_wait,
            max_wait,
            retry_on,
        }
    }

    /// Multi-turn model calls. A single attempt: replaying a half-finished
    /// conversation costs a full duel worth of tokens.
    pub fn llm() -> Self {
        Self::new(1, Duration::from_secs(1), Duration::from_secs(3), RetryOn::AnyFailure)
    }

    /// Speech synthesis. Idempotent and cheap to repeat.
    pub fn tts() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(5), RetryOn::Transient)
    }

    /// Generic external API call.
    pub fn api() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10), RetryOn::Transient)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_waits(mut self, base_wait: Duration, max_wait: Duration) -> Self {
        self.base_wait = base_wait;
        self.max_wait = max_wait;
        self
    }

    /// Wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_wait.saturating_mul(factor).min(self.max_wait)
    }

    /// Run `op` until it succeeds, fails with a non-matching error, or runs
    /// out of attempts.
    pub async fn run<T, F, Fut>(&self, call: &str, mut op: F) -> Result<T, ComicError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ComicError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && self.retry_on.matches(&err) => {
                    let wait = self.backoff(attempt);
                    warn!(
                        call,
                        attempt,
                        max_attempts = self.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Call failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::api()
    }
}
