//! Remote Enrichment Dispatcher: the single gate in front of the completion
//! service.
//!
//! ## Admission
//!
//! All calls share one lane (a FIFO `tokio::sync::Mutex`), so at most one
//! remote call is in flight process-wide no matter how many documents are
//! being processed. Inside the lane a sliding 60-second window counts
//! admissions; once `rate_limit_rpm` admissions fall inside the window the
//! next attempt sleeps until the oldest one ages out. Every attempt,
//! including retries, takes an admission.
//!
//! ## Retry
//!
//! Attempts are numbered from 1. When attempt `n` fails and `n` is below
//! `max_attempts`:
//!
//! | Failure | Wait before attempt `n + 1` |
//! |---------|-----------------------------|
//! | rate limited | `base_delay * 2^n` |
//! | anything else | `base_delay` |
//!
//! The lane is held across the backoff sleep, so a throttled call is not
//! overtaken by queued ones. When the last attempt fails its error is
//! returned unchanged. Callers see either a complete result or that error,
//! never anything partial.

use crate::config::ProcessingConfig;
use crate::error::RemoteError;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

/// Length of the admission window.
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// How long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first. Always ≥ 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after attempt `attempt` (1-based) failed with `err`.
    pub fn backoff_for(&self, attempt: u32, err: &RemoteError) -> Duration {
        if err.is_rate_limit() {
            let factor = 2u32.saturating_pow(attempt);
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        }
    }
}

/// Sliding-window admission counter.
#[derive(Debug)]
struct RateWindow {
    admissions: VecDeque<Instant>,
    limit: usize,
}

impl RateWindow {
    fn new(limit: u32) -> Self {
        let limit = limit.max(1) as usize;
        Self {
            admissions: VecDeque::with_capacity(limit),
            limit,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.admissions.front() {
            if now.duration_since(oldest) >= RATE_WINDOW {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    /// Wait until the window has room, then record an admission.
    async fn admit(&mut self) {
        loop {
            let now = Instant::now();
            self.prune(now);
            if self.admissions.len() < self.limit {
                self.admissions.push_back(now);
                return;
            }
            if let Some(&oldest) = self.admissions.front() {
                let wake = oldest + RATE_WINDOW;
                debug!(
                    "Rate window full ({}/{}), waiting {:?}",
                    self.admissions.len(),
                    self.limit,
                    wake.saturating_duration_since(now)
                );
                sleep_until(wake).await;
            }
        }
    }
}

/// Serialises and rate-limits every remote call. Share it behind an `Arc`.
#[derive(Debug)]
pub struct Dispatcher {
    lane: Mutex<RateWindow>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(rate_limit_rpm: u32, policy: RetryPolicy) -> Self {
        Self {
            lane: Mutex::new(RateWindow::new(rate_limit_rpm)),
            policy,
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(
            config.rate_limit_rpm,
            RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_delay_ms),
            ),
        )
    }

    /// Run `call` through the lane, retrying per the [`RetryPolicy`].
    ///
    /// `call` is invoked once per attempt and must build a fresh future each
    /// time. `label` only appears in logs.
    pub async fn submit<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut window = self.lane.lock().await;
        let max = self.policy.max_attempts;
        let mut attempt: u32 = 1;

        loop {
            window.admit().await;
            debug!("Dispatching {} (attempt {}/{})", label, attempt, max);

            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}/{}", label, attempt, max);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = max,
                        error_kind = %e.kind(),
                        "{} attempt {}/{} failed: {}",
                        label,
                        attempt,
                        max,
                        e
                    );
                    if attempt >= max {
                        return Err(e);
                    }
                    let delay = self.policy.backoff_for(attempt, &e);
                    debug!("Retrying {} in {:?}", label, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
