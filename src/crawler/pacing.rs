//! Cancellation-aware waiting
//!
//! Every navigator call and every politeness pause a worker makes is raced
//! against the worker's cancellation token, so an interrupt is observed at the
//! next suspension point instead of after the current timeout.

use crate::browser::{NavError, NavResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs a navigator operation unless the token is cancelled first
pub async fn guarded<T, F>(cancel: &CancellationToken, operation: F) -> NavResult<T>
where
    F: Future<Output = NavResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NavError::Interrupted),
        result = operation => result,
    }
}

/// Sleeps for `delay`, returning `NavError::Interrupted` if cancelled meanwhile
pub async fn pause(cancel: &CancellationToken, delay: Duration) -> NavResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NavError::Interrupted),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
