//! Cooperative cancellation.
//!
//! Each action attempt gets a child of the run token, so cancelling one task
//! leaves the rest of the run alone.

use std::time::Duration;

use thiserror::Error;
pub use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("the task was cancelled")]
pub struct Cancelled;

impl Cancelled {
    pub fn check(token: &CancellationToken) -> Result<(), Cancelled> {
        if token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sleep for `duration`, returning early with `Err(Cancelled)` if the token fires.
pub async fn sleep_attentively(duration: Duration, token: &CancellationToken) -> Result<(), Cancelled> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
