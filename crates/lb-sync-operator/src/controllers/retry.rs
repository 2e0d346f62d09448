//! Retry policy with exponential backoff for failed passes
//!
//! The engine never retries on its own: a failed pass is reported here,
//! classified, and the Service is requeued or left until it changes.

use std::collections::HashMap;
use std::time::Duration;

use kube::runtime::controller::Action;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Maximum number of retries before giving up
pub const MAX_RETRIES: u32 = 10;

/// Base delay for exponential backoff (seconds)
const BASE_DELAY_SECS: u64 = 5;

/// Maximum delay between retries (1 hour)
const MAX_DELAY_SECS: u64 = 3600;

/// Tracks retry attempts per Service UID
#[derive(Debug, Default)]
pub struct RetryTracker {
    attempts: Mutex<HashMap<String, u32>>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the retry count for a Service and return the new count
    pub fn increment(&self, uid: &str) -> u32 {
        let mut attempts = self.attempts.lock();
        let count = attempts.entry(uid.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Forget a Service's failures (after a successful pass or on removal)
    pub fn reset(&self, uid: &str) {
        self.attempts.lock().remove(uid);
    }

    pub fn get(&self, uid: &str) -> u32 {
        self.attempts.lock().get(uid).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Provider conflicts, API failures, vanished resources
    Transient,
    /// Invalid intents that will not pass until the Service is edited
    Permanent,
}

/// Action for the given attempt number and error kind
pub fn compute_backoff(attempt: u32, kind: ErrorKind) -> Action {
    match kind {
        ErrorKind::Transient => match backoff_delay(attempt) {
            Some(delay) => {
                debug!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    "Scheduling retry with exponential backoff"
                );
                Action::requeue(delay)
            }
            None => {
                warn!(
                    attempt,
                    max_retries = MAX_RETRIES,
                    "Max retries exceeded, waiting for resource change"
                );
                Action::await_change()
            }
        },
        ErrorKind::Permanent => {
            warn!("Permanent error, waiting for resource change");
            Action::await_change()
        }
    }
}

/// 5s, 10s, 20s, ... capped at one hour; `None` once retries are exhausted
fn backoff_delay(attempt: u32) -> Option<Duration> {
    if attempt >= MAX_RETRIES {
        return None;
    }
    let delay_secs = BASE_DELAY_SECS.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    Some(Duration::from_secs(delay_secs.min(MAX_DELAY_SECS)))
}
