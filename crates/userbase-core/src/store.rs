use async_trait::async_trait;
use thiserror::Error;

use crate::{NewUser, RequestContext, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Database(String),
    #[error("aborted: {0}")]
    Aborted(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Data access capability consumed by the HTTP layer.
///
/// Every call receives the request's context. Implementations should give up
/// once `ctx.is_expired()`; callers additionally drop the call's future when
/// the deadline passes, so any state held across an await must be safe to drop.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Inserts `user` inside a transaction and returns the stored record.
    async fn insert_user(&self, ctx: &RequestContext, user: NewUser) -> Result<User, StoreError>;

    async fn get_user_by_id(&self, ctx: &RequestContext, id: i64) -> Result<User, StoreError>;

    /// Returns at most `limit` users ordered by id, skipping the first `offset`.
    async fn fetch_users(
        &self,
        ctx: &RequestContext,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<User>, StoreError>;

    async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError>;
}

/// Clamps a requested page size to `[0, MAX_PAGE_LIMIT]`.
#[must_use]
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(0, crate::MAX_PAGE_LIMIT)
}
