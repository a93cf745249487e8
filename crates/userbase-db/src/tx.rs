//! Begin/commit/rollback discipline around a single mutating store call.
//!
//! [`with_transaction`] begins a transaction, runs one mutation against it and
//! then finishes it exactly once: commit when the mutation returns `Ok`,
//! rollback when it returns `Err` or panics. A [`TxGuard`] that is dropped
//! before either happens (the calling task was aborted at a deadline) leaves
//! the rollback to the handle's own drop and logs it.
//!
//! Every transition is logged with the request id of the owning request.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use userbase_core::{RequestContext, StoreError};

/// A store transaction the guard can finish.
///
/// Dropping a handle without calling either method must discard its writes.
#[async_trait]
pub trait TxHandle: Send + Sized {
    async fn commit(self) -> Result<(), StoreError>;
    async fn rollback(self) -> Result<(), StoreError>;
}

pub struct TxGuard<'c, T: TxHandle> {
    ctx: &'c RequestContext,
    tx: Option<T>,
}

impl<'c, T: TxHandle> TxGuard<'c, T> {
    pub fn begin(ctx: &'c RequestContext, tx: T) -> Self {
        tracing::info!(
            event = "tx_begin",
            request_id = %ctx.request_id(),
            "Transaction started"
        );
        Self { ctx, tx: Some(tx) }
    }

    pub fn tx_mut(&mut self) -> Result<&mut T, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Aborted("transaction already finished".to_string()))
    }

    pub async fn commit(mut self) -> Result<(), StoreError> {
        let Some(tx) = self.tx.take() else {
            return Err(StoreError::Aborted("transaction already finished".to_string()));
        };
        match tx.commit().await {
            Ok(()) => {
                tracing::info!(
                    event = "tx_commit",
                    request_id = %self.ctx.request_id(),
                    "Transaction committed"
                );
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    event = "tx_commit_failed",
                    request_id = %self.ctx.request_id(),
                    error = %err,
                    "DB commit failed"
                );
                Err(err)
            }
        }
    }

    pub async fn rollback(mut self, reason: &str) -> Result<(), StoreError> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        let result = tx.rollback().await;
        match &result {
            Ok(()) => tracing::warn!(
                event = "tx_rollback",
                request_id = %self.ctx.request_id(),
                reason,
                "Transaction rolled back"
            ),
            Err(err) => tracing::error!(
                event = "tx_rollback_failed",
                request_id = %self.ctx.request_id(),
                reason,
                error = %err,
                "DB rollback failed"
            ),
        }
        result
    }
}

impl<T: TxHandle> Drop for TxGuard<'_, T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(
                event = "tx_rollback",
                request_id = %self.ctx.request_id(),
                reason = "dropped",
                "Transaction dropped before commit"
            );
        }
    }
}

/// Runs `mutation` inside the transaction produced by `begin`.
///
/// The mutation's own error is returned unchanged after rollback. A panic is
/// converted into [`StoreError::Aborted`] carrying the panic message.
pub async fn with_transaction<T, R, B, F>(
    ctx: &RequestContext,
    begin: B,
    mutation: F,
) -> Result<R, StoreError>
where
    T: TxHandle,
    R: Send,
    B: Future<Output = Result<T, StoreError>> + Send,
    F: for<'t> FnOnce(&'t mut T) -> BoxFuture<'t, Result<R, StoreError>> + Send,
{
    let tx = match begin.await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!(
                event = "tx_begin_failed",
                request_id = %ctx.request_id(),
                error = %err,
                "DB begin failed"
            );
            return Err(err);
        }
    };
    let mut guard = TxGuard::begin(ctx, tx);
    let outcome = {
        let tx = guard.tx_mut()?;
        AssertUnwindSafe(mutation(tx)).catch_unwind().await
    };
    match outcome {
        Ok(Ok(value)) => {
            guard.commit().await?;
            Ok(value)
        }
        Ok(Err(err)) => {
            let _ = guard.rollback(&err.to_string()).await;
            Err(err)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(
                event = "tx_mutation_panicked",
                request_id = %ctx.request_id(),
                panic = %message,
            );
            let _ = guard.rollback("panic").await;
            Err(StoreError::Aborted(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "mutation panicked".to_string()
    }
}
