//! Bounded retry around optimistic-concurrency conflicts.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::store::StoreError;

/// How many times a conflicting read-modify-write is retried before the
/// conflict is surfaced to the caller.
pub const CAS_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("optimistic concurrency conflict persisted through {0} attempts")]
    Exhausted(u32),
    #[error(transparent)]
    Store(StoreError),
}

/// Runs `attempt` until it settles, retrying only on a version conflict.
///
/// This is the one place that re-reads and re-writes the same row; every
/// attempt must start from a fresh read so the retry observes other
/// writers' work. Any outcome other than
/// [`StoreError::PreconditionFailed`] ends the loop immediately.
pub async fn with_optimistic_retry<'a, T, F>(attempts: u32, mut attempt: F) -> Result<T, RetryError>
where
    F: FnMut() -> BoxFuture<'a, Result<T, StoreError>>,
{
    for round in 0..attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_precondition_failed() => {
                log::debug!("optimistic write lost round {}: {error}", round + 1);
            }
            Err(error) => return Err(RetryError::Store(error)),
        }
    }

    Err(RetryError::Exhausted(attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conflict() -> StoreError {
        StoreError::PreconditionFailed {
            table: "t".into(),
            partition: "p".into(),
            row: "r".into(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_conflicts() {
        let calls = AtomicU32::new(0);

        let value = with_optimistic_retry(CAS_ATTEMPTS, || {
            let round = calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if round < 2 {
                    Err(conflict())
                } else {
                    Ok(round)
                }
            })
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_once_attempts_run_out() {
        let calls = AtomicU32::new(0);

        let outcome: Result<(), _> = with_optimistic_retry(CAS_ATTEMPTS, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(conflict()) })
        })
        .await;

        assert!(matches!(outcome, Err(RetryError::Exhausted(n)) if n == CAS_ATTEMPTS));
        assert_eq!(calls.load(Ordering::SeqCst), CAS_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_conflict_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let outcome: Result<(), _> = with_optimistic_retry(CAS_ATTEMPTS, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(StoreError::Backend("boom".into())) })
        })
        .await;

        assert!(matches!(outcome, Err(RetryError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
