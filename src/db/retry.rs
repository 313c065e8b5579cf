//! Retry wrapper for store operations.
//!
//! Every read/write the runners and endpoints perform goes through
//! [`with_retry`]. Only failures classified as transient are retried;
//! constraint violations, bad enum values, and missing rows propagate on
//! the first occurrence. Generation calls are never routed through here.

use rusqlite::ErrorCode;
use tokio::time::{sleep, Duration};

use super::DatabaseError;

/// Message fragments that mark a failure as a dropped or refused
/// connection regardless of its error code.
const TRANSIENT_MESSAGE_PARTS: &[&str] = &[
    "database is locked",
    "database table is locked",
    "connection reset",
    "connection refused",
    "connection terminated",
];

/// Retry policy for transient store failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt n+1 is `delays_ms[n]`; the last entry repeats
    /// when there are more attempts than entries.
    pub delays_ms: Vec<u64>,
    /// Spread delays ±25% so concurrent language tasks don't retry in
    /// lockstep against the same contended store.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays_ms: vec![5_000, 10_000, 10_000],
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub(crate) fn delay_ms_for(&self, failed_attempt: u32) -> u64 {
        let idx = (failed_attempt as usize)
            .saturating_sub(1)
            .min(self.delays_ms.len().saturating_sub(1));
        let nominal = self.delays_ms.get(idx).copied().unwrap_or(0);
        if !self.jitter || nominal == 0 {
            return nominal;
        }
        use rand::Rng;
        let factor: f64 = rand::thread_rng().gen_range(0.75..=1.25);
        (nominal as f64 * factor).round() as u64
    }
}

/// Whether a store failure is worth retrying.
///
/// Busy/locked and I/O failure codes cover another connection holding the
/// write lock; the message fragments cover administratively dropped
/// connections that surface without a useful code.
pub fn is_transient(err: &DatabaseError) -> bool {
    if let DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(inner, _)) = err {
        if matches!(
            inner.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::SystemIoFailure
        ) {
            return true;
        }
    }
    let message = err.to_string().to_lowercase();
    TRANSIENT_MESSAGE_PARTS
        .iter()
        .any(|part| message.contains(part))
}

/// Run a store operation, retrying transient failures per `policy`.
///
/// Returns the first success, the first non-transient error, or the last
/// transient error once attempts are exhausted.
pub async fn with_retry<T, F>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, DatabaseError>
where
    F: FnMut() -> Result<T, DatabaseError>,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < policy.max_attempts => {
                let delay_ms = policy.delay_ms_for(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms,
                    error = %err,
                    "Transient store error, retrying"
                );
                sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(err) => {
                if is_transient(&err) {
                    tracing::error!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Store operation failed after exhausting retries"
                    );
                }
                return Err(err);
            }
        }
    }
}
