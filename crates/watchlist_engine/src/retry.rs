//! Exponential-backoff retry around a single fallible operation.
//!
//! The retrier never decides whether an error is worth retrying: each
//! attempt reports [`Attempt::Retryable`] or [`Attempt::Permanent`] itself.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;
use watchlist_logging::{harvest_debug, harvest_warn};

/// Outcome of one failed attempt, as classified by the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<E> {
    Retryable(E),
    Permanent(E),
}

impl<E> Attempt<E> {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Attempt::Permanent(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    /// Cap on a single delay.
    pub max_interval: Duration,
    /// Each delay is drawn from `[d * (1 - f), d * (1 + f)]`.
    pub randomization_factor: f64,
    /// `None` retries retryable errors forever.
    pub max_elapsed_time: Option<Duration>,
    /// Total attempts including the first; `None` is unbounded.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            randomization_factor: 0.5,
            max_elapsed_time: None,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            policy: self.clone(),
            current: self.initial_interval,
            attempts: 0,
        }
    }
}

/// Delay sequence for one retry loop.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: BackoffPolicy,
    current: Duration,
    attempts: u32,
}

impl BackoffSchedule {
    /// Delay before the next attempt, or `None` once the budget is spent.
    ///
    /// `elapsed` is measured from the first attempt.
    pub fn next_delay(&mut self, elapsed: Duration) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let delay = randomize(self.current, self.policy.randomization_factor);
        if let Some(max_elapsed) = self.policy.max_elapsed_time {
            if elapsed + delay > max_elapsed {
                return None;
            }
        }

        let grown = self.current.as_secs_f64() * self.policy.multiplier.max(1.0);
        self.current = if grown >= self.policy.max_interval.as_secs_f64() {
            self.policy.max_interval
        } else {
            Duration::from_secs_f64(grown)
        };
        Some(delay)
    }
}

fn randomize(base: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || base.is_zero() {
        return base;
    }
    let factor = factor.min(1.0);
    let secs = base.as_secs_f64();
    let low = secs * (1.0 - factor);
    let high = secs * (1.0 + factor);
    Duration::from_secs_f64(rand::thread_rng().gen_range(low..=high))
}

/// Async sleeping abstraction so tests can skip real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone)]
pub struct BackoffRetrier {
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl BackoffRetrier {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: BackoffPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Runs `op` until it succeeds, reports a permanent failure, or the policy
    /// gives up. Exhaustion returns the last error seen.
    ///
    /// `operation` and `subject` only feed the per-attempt log lines.
    pub async fn retry<T, E, F, Fut>(
        &self,
        operation: &str,
        subject: &str,
        mut op: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Attempt<E>>>,
    {
        let started = Instant::now();
        let mut schedule = self.policy.schedule();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(Attempt::Permanent(err)) => {
                    harvest_warn!(
                        "{} failed permanently subject={} attempt={} error={}",
                        operation,
                        subject,
                        attempt,
                        err
                    );
                    return Err(err);
                }
                Err(Attempt::Retryable(err)) => err,
            };

            match schedule.next_delay(started.elapsed()) {
                Some(delay) => {
                    harvest_warn!(
                        "{} failed subject={} attempt={} error={}; retrying in {:?}",
                        operation,
                        subject,
                        attempt,
                        err,
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                }
                None => {
                    harvest_warn!(
                        "{} gave up subject={} attempts={} error={}",
                        operation,
                        subject,
                        attempt,
                        err
                    );
                    return Err(err);
                }
            }
            harvest_debug!("{} retry subject={} attempt={}", operation, subject, attempt + 1);
        }
    }
}
