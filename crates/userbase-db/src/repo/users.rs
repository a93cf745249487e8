use std::future::Future;

use async_trait::async_trait;
use sqlx_core::transaction::Transaction;
use sqlx_postgres::Postgres;
use userbase_core::{clamp_limit, RequestContext, StoreError, UserStore};

use super::prelude::*;
use crate::tx::{with_transaction, TxHandle};

pub type PgTx = Transaction<'static, Postgres>;

pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Inserts inside `tx`; id and `created_on` come from column defaults.
    pub async fn create_in(tx: &mut PgTx, user: &NewUser) -> Result<User, sqlx_core::Error> {
        query_as!(
            User,
            r#"
            INSERT INTO users (name)
            VALUES ($1)
            RETURNING id, created_on, name
            "#,
            user.name.as_str()
        )
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx_core::Error> {
        query_as!(
            User,
            r#"
            SELECT id, created_on, name
            FROM users
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(self.pool)
        .await
    }

    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>, sqlx_core::Error> {
        query_as!(
            User,
            r#"
            SELECT id, created_on, name
            FROM users
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
            limit,
            offset
        )
        .fetch_all(self.pool)
        .await
    }

    pub async fn ping(&self) -> Result<(), sqlx_core::Error> {
        sqlx_core::query::query::<Postgres>("SELECT 1")
            .execute(self.pool)
            .await
            .map(|_| ())
    }
}

pub fn store_error(err: sqlx_core::Error) -> StoreError {
    match err {
        sqlx_core::Error::RowNotFound => StoreError::NotFound,
        sqlx_core::Error::PoolTimedOut
        | sqlx_core::Error::PoolClosed
        | sqlx_core::Error::Io(_)
        | sqlx_core::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

#[async_trait]
impl TxHandle for PgTx {
    async fn commit(self) -> Result<(), StoreError> {
        Transaction::commit(self).await.map_err(store_error)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Transaction::rollback(self).await.map_err(store_error)
    }
}

/// [`UserStore`] backed by a Postgres pool.
///
/// Each call is bounded by the request deadline on its own, independently of
/// the caller's timer.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn within_deadline<T, F>(ctx: &RequestContext, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout_at(ctx.deadline(), call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Unavailable(
            "context deadline exceeded".to_string(),
        )),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_user(&self, ctx: &RequestContext, user: NewUser) -> Result<User, StoreError> {
        let begin = async { self.pool.begin().await.map_err(store_error) };
        within_deadline(
            ctx,
            with_transaction(ctx, begin, move |tx: &mut PgTx| {
                Box::pin(async move { UserRepo::create_in(tx, &user).await.map_err(store_error) })
            }),
        )
        .await
    }

    async fn get_user_by_id(&self, ctx: &RequestContext, id: i64) -> Result<User, StoreError> {
        let repo = UserRepo::new(&self.pool);
        match within_deadline(ctx, async { repo.get_by_id(id).await.map_err(store_error) }).await
        {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(StoreError::NotFound),
            Err(err) => {
                tracing::error!(
                    event = "user_get_failed",
                    request_id = %ctx.request_id(),
                    user_id = id,
                    error = %err,
                    "DB error"
                );
                Err(err)
            }
        }
    }

    async fn fetch_users(
        &self,
        ctx: &RequestContext,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<User>, StoreError> {
        let repo = UserRepo::new(&self.pool);
        let offset = offset.max(0);
        let limit = clamp_limit(limit);
        within_deadline(ctx, async {
            repo.list(offset, limit).await.map_err(store_error)
        })
        .await
        .inspect_err(|err| {
            tracing::error!(
                event = "user_list_failed",
                request_id = %ctx.request_id(),
                offset,
                limit,
                error = %err,
                "DB error"
            );
        })
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        let repo = UserRepo::new(&self.pool);
        within_deadline(ctx, async {
            repo.ping()
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))
        })
        .await
    }
}
