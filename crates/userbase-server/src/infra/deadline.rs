//! Runs one data-access call per request against the request deadline.
//!
//! The call is spawned onto its own task and raced against
//! `sleep_until(ctx.deadline())`. Exactly one [`Outcome`] is produced. When
//! the deadline wins, the task is aborted, so a store call that holds a
//! transaction is dropped mid-flight and its guard rolls back.

use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;
use userbase_core::RequestContext;

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    /// The deadline passed before the call finished.
    Busy,
    /// The call panicked or was cancelled outside of the deadline path.
    Failed(String),
}

/// Aborts the spawned call when dropped, including when the handler's own
/// future is dropped because the client went away.
struct PendingOperation<T> {
    handle: JoinHandle<T>,
}

impl<T> Drop for PendingOperation<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn run_with_deadline<T, F>(ctx: &RequestContext, operation: F) -> Outcome<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut pending = PendingOperation {
        handle: tokio::spawn(operation.instrument(tracing::Span::current())),
    };
    let outcome = tokio::select! {
        biased;
        joined = &mut pending.handle => match joined {
            Ok(value) => Outcome::Completed(value),
            Err(err) => Outcome::Failed(join_failure(err)),
        },
        () = tokio::time::sleep_until(ctx.deadline()) => Outcome::Busy,
    };
    // A store that honours the same deadline can finish in the same instant
    // the timer fires; past the deadline its result is discarded.
    if matches!(outcome, Outcome::Busy) || ctx.is_expired() {
        tracing::warn!(
            event = "deadline_exceeded",
            request_id = %ctx.request_id(),
            "Data access call did not finish before the deadline"
        );
        return Outcome::Busy;
    }
    outcome
}

fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "data access task panicked".to_string()
        }
    } else {
        "data access task cancelled".to_string()
    }
}
