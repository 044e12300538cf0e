//! Bounded retries with exponential backoff around transcript fetches.
//!
//! Every fetch walks a small state machine:
//!
//! ```text
//! Attempting ──ok──────────────> Success
//!     │
//!     ├─ rate limited / network ─> RetryScheduled ──sleep──> Attempting
//!     ├─ retryable, no budget ───> Exhausted
//!     ├─ auth failure ───────────> FatalAbort
//!     └─ anything else ──────────> Failed
//! ```
//!
//! [`RetryPolicy::decide`] is the pure transition function; [`RetryPolicy::execute`]
//! drives it and sleeps through a [`Sleeper`].

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::{TranscriptFetcher, TranscriptResult};
use crate::error::{BatchError, BatchResult};
use crate::extractors::VideoReference;

/// Upper bound of the random jitter, as a fraction of the delay
const JITTER_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    RetryScheduled { attempt: u32, delay: Duration },
    Success { attempts: u32 },
    Exhausted { attempts: u32 },
    FatalAbort { attempts: u32 },
    Failed { attempts: u32 },
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RetryState::Attempting { .. } | RetryState::RetryScheduled { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first call included
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Cap for any single delay
    pub max_delay: Duration,

    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

/// Result of a retried operation along with how it ended
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: BatchResult<T>,
    pub final_state: RetryState,
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self.final_state {
            RetryState::Attempting { attempt } | RetryState::RetryScheduled { attempt, .. } => {
                attempt
            }
            RetryState::Success { attempts }
            | RetryState::Exhausted { attempts }
            | RetryState::FatalAbort { attempts }
            | RetryState::Failed { attempts } => attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.final_state, RetryState::Exhausted { .. })
    }
}

impl RetryPolicy {
    /// Next state after `attempt` failed with `error`
    pub fn decide(&self, attempt: u32, error: &BatchError) -> RetryState {
        if error.is_fatal() {
            return RetryState::FatalAbort { attempts: attempt };
        }

        if !error.is_retryable() {
            return RetryState::Failed { attempts: attempt };
        }

        if attempt >= self.max_attempts {
            return RetryState::Exhausted { attempts: attempt };
        }

        let hint = match error {
            BatchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        };

        RetryState::RetryScheduled {
            attempt,
            delay: self.delay_for(attempt, hint),
        }
    }

    /// Backoff before the retry that follows `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let backoff = self.base_delay.saturating_mul(1u32 << exponent);
        let delay = hint.unwrap_or(backoff).min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let extra = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
            delay.mul_f64(1.0 + extra).min(self.max_delay)
        } else {
            delay
        }
    }

    /// Run `op` until it succeeds or the policy gives up
    pub async fn execute<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = BatchResult<T>>,
    {
        let mut attempt = 1;

        loop {
            tracing::debug!("{:?}", RetryState::Attempting { attempt });

            let error = match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        final_state: RetryState::Success { attempts: attempt },
                    }
                }
                Err(error) => error,
            };

            let state = self.decide(attempt, &error);
            if state.is_terminal() {
                if let RetryState::Exhausted { attempts } = state {
                    tracing::warn!("Giving up after {} attempts: {}", attempts, error);
                }
                return RetryOutcome {
                    result: Err(error),
                    final_state: state,
                };
            }

            if let RetryState::RetryScheduled { delay, .. } = state {
                tracing::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt,
                    self.max_attempts,
                    error,
                    delay
                );
                sleeper.sleep(delay).await;
            }
            attempt += 1;
        }
    }

    /// Fetch one transcript under this policy
    pub async fn fetch(
        &self,
        fetcher: &dyn TranscriptFetcher,
        sleeper: &dyn Sleeper,
        video: &VideoReference,
    ) -> RetryOutcome<TranscriptResult> {
        self.execute(sleeper, |_| fetcher.fetch(video)).await
    }
}

/// Blocking wait between attempts, injectable for tests
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested delays instead of sleeping
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct RecordingSleeper {
    delays: std::sync::Arc<std::sync::Mutex<Vec<Duration>>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{MockTranscriptFetcher, TranscriptBody};
    use tokio_test::{assert_err, assert_ok};

    fn video() -> VideoReference {
        VideoReference::parse("dQw4w9WgXcQ").unwrap()
    }

    fn transcript() -> TranscriptResult {
        TranscriptResult {
            title: "Title".to_string(),
            video_id: "dQw4w9WgXcQ".to_string(),
            language: "en".to_string(),
            body: TranscriptBody::Text("hello".to_string()),
            source_url: "dQw4w9WgXcQ".to_string(),
            channel: None,
            channel_url: None,
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_rate_limited_twice_then_success() {
        let mut fetcher = MockTranscriptFetcher::new();
        let mut calls = 0;
        fetcher.expect_fetch().times(3).returning(move |_| {
            calls += 1;
            if calls <= 2 {
                Err(BatchError::RateLimited { retry_after: None })
            } else {
                Ok(transcript())
            }
        });

        let sleeper = RecordingSleeper::default();
        let outcome = policy().fetch(&fetcher, &sleeper, &video()).await;

        assert_ok!(&outcome.result);
        assert_eq!(outcome.final_state, RetryState::Success { attempts: 3 });
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_auth_error_is_never_retried() {
        let mut fetcher = MockTranscriptFetcher::new();
        fetcher.expect_fetch().times(1).returning(|_| {
            Err(BatchError::Auth {
                message: "bad key".to_string(),
            })
        });

        let sleeper = RecordingSleeper::default();
        let outcome = policy().fetch(&fetcher, &sleeper, &video()).await;

        assert_err!(&outcome.result);
        assert_eq!(outcome.final_state, RetryState::FatalAbort { attempts: 1 });
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let mut fetcher = MockTranscriptFetcher::new();
        fetcher.expect_fetch().times(3).returning(|_| {
            Err(BatchError::TransientNetwork {
                message: "connection reset".to_string(),
            })
        });

        let sleeper = RecordingSleeper::default();
        let outcome = policy().fetch(&fetcher, &sleeper, &video()).await;

        assert!(outcome.is_exhausted());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(sleeper.delays().len(), 2);
        assert!(matches!(outcome.result, Err(BatchError::TransientNetwork { .. })));
    }

    #[tokio::test]
    async fn test_not_found_fails_without_retry() {
        let mut fetcher = MockTranscriptFetcher::new();
        fetcher.expect_fetch().times(1).returning(|v| {
            Err(BatchError::NotFound {
                video_id: v.video_id.clone(),
            })
        });

        let sleeper = RecordingSleeper::default();
        let outcome = policy().fetch(&fetcher, &sleeper, &video()).await;

        assert_eq!(outcome.final_state, RetryState::Failed { attempts: 1 });
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_single_attempt_policy_never_sleeps() {
        let mut fetcher = MockTranscriptFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Err(BatchError::RateLimited { retry_after: None }));

        let sleeper = RecordingSleeper::default();
        let single = RetryPolicy {
            max_attempts: 1,
            ..policy()
        };
        let outcome = single.fetch(&fetcher, &sleeper, &video()).await;

        assert_eq!(outcome.final_state, RetryState::Exhausted { attempts: 1 });
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: false,
        };

        assert_eq!(policy.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let state = policy().decide(
            1,
            &BatchError::RateLimited {
                retry_after: Some(Duration::from_secs(3)),
            },
        );
        assert_eq!(
            state,
            RetryState::RetryScheduled {
                attempt: 1,
                delay: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..policy()
        };

        for _ in 0..50 {
            let delay = policy.delay_for(2, None);
            assert!(delay >= Duration::from_millis(199));
            assert!(delay <= Duration::from_millis(251));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RetryState::Attempting { attempt: 1 }.is_terminal());
        assert!(RetryState::FatalAbort { attempts: 1 }.is_terminal());
        assert!(RetryState::Exhausted { attempts: 3 }.is_terminal());
    }
}
