//! Request lifecycle: deadline, abort and failure counting for one conversation.
//!
//! Every exchange is a race between the backend future, a deadline timer and
//! an abort signal. The loser is dropped, which cancels the HTTP request and
//! the timer alike, so a late reply can never reach the log.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::transport::{ExchangeBackend, ExchangeRequest, FailureKind, Reply};

/// Failure counters of one conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureStats {
    pub total_failures: u64,
    /// Reset to zero by any successful exchange.
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Result of racing a future against the deadline and the abort signal.
#[derive(Debug)]
pub enum Race<T> {
    Settled(T),
    TimedOut,
    Aborted,
}

/// Settled result of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    Replied(Reply),
    Failed {
        failure: FailureKind,
        /// Counter value after this failure.
        consecutive_failures: u32,
    },
    /// The conversation was reset while the exchange was in flight.
    Aborted,
}

/// Runs exchanges for one conversation and owns its failure counter.
#[derive(Debug)]
pub struct RequestController {
    timeout: Duration,
    stats: Mutex<FailureStats>,
    abort: Notify,
}

impl RequestController {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            stats: Mutex::new(FailureStats::default()),
            abort: Notify::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one request and settle it. Counts the outcome; aborted exchanges
    /// are not counted.
    pub async fn exchange(
        &self,
        backend: &dyn ExchangeBackend,
        request: ExchangeRequest,
    ) -> ExchangeOutcome {
        let started = Instant::now();
        let result = match self.race(backend.exchange(request)).await {
            Race::Settled(result) => result,
            Race::TimedOut => Err(FailureKind::Timeout),
            Race::Aborted => {
                tracing::debug!("Exchange aborted by conversation reset");
                return ExchangeOutcome::Aborted;
            }
        };

        match result {
            Ok(reply) => {
                self.record_success();
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Exchange succeeded"
                );
                ExchangeOutcome::Replied(reply)
            }
            Err(failure) => {
                let consecutive_failures = self.record_failure();
                tracing::warn!(
                    error = %failure,
                    consecutive_failures,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Exchange failed"
                );
                ExchangeOutcome::Failed {
                    failure,
                    consecutive_failures,
                }
            }
        }
    }

    /// Race `fut` against the deadline and the abort signal without touching
    /// the failure counter.
    pub async fn race<F: Future>(&self, fut: F) -> Race<F::Output> {
        let aborted = self.abort.notified();
        tokio::select! {
            output = fut => Race::Settled(output),
            _ = tokio::time::sleep(self.timeout) => Race::TimedOut,
            _ = aborted => Race::Aborted,
        }
    }

    /// Wake every in-flight race with `Race::Aborted`.
    pub fn abort_in_flight(&self) {
        self.abort.notify_waiters();
    }

    pub fn failure_stats(&self) -> FailureStats {
        *self.lock_stats()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock_stats().consecutive_failures
    }

    /// Zero all counters; used when a conversation starts over.
    pub fn reset(&self) {
        *self.lock_stats() = FailureStats::default();
    }

    fn record_success(&self) {
        self.lock_stats().consecutive_failures = 0;
    }

    fn record_failure(&self) -> u32 {
        let mut stats = self.lock_stats();
        stats.total_failures += 1;
        stats.consecutive_failures = stats.consecutive_failures.saturating_add(1);
        stats.last_failure_at = Some(Utc::now());
        stats.consecutive_failures
    }

    // Plain counters stay consistent even if a holder panicked.
    fn lock_stats(&self) -> std::sync::MutexGuard<'_, FailureStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
