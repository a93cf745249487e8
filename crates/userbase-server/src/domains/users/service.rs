use userbase_core::{NewUser, RequestContext, StoreError, User, MAX_PAGE_LIMIT};

use crate::app::AppState;
use crate::domains::errors::{settle, ApiError};
use crate::infra::deadline::run_with_deadline;

pub struct ListUsersCommand {
    pub offset: i64,
    pub limit: i64,
}

impl ListUsersCommand {
    /// Validates raw query values. A missing offset starts at 0, a missing
    /// limit asks for a full page. Offset is checked first.
    pub fn parse(offset: Option<&str>, limit: Option<&str>) -> Result<Self, ApiError> {
        let offset = match offset {
            Some(value) => parse_non_negative(value)
                .ok_or_else(|| ApiError::BadRequest("bad offset".to_string()))?,
            None => 0,
        };
        let limit = match limit {
            Some(value) => parse_non_negative(value)
                .ok_or_else(|| ApiError::BadRequest("bad limit".to_string()))?,
            None => MAX_PAGE_LIMIT,
        };
        Ok(Self { offset, limit })
    }
}

pub fn parse_user_id(value: &str) -> Result<i64, ApiError> {
    parse_non_negative(value).ok_or_else(|| ApiError::BadRequest("bad id".to_string()))
}

/// Digits only, no sign, and it must fit an `i64`.
fn parse_non_negative(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse::<i64>().ok()
}

fn log_store_error(ctx: &RequestContext, operation: &'static str, err: &ApiError) {
    match err {
        ApiError::Store(_) | ApiError::Internal(_) => tracing::error!(
            event = "store_call_failed",
            request_id = %ctx.request_id(),
            operation,
            error = %err,
            "DB error"
        ),
        ApiError::BadRequest(_) | ApiError::Busy => {}
    }
}

pub async fn list_users(
    state: &AppState,
    ctx: &RequestContext,
    cmd: ListUsersCommand,
) -> Result<Vec<User>, ApiError> {
    let store = state.store.clone();
    let call_ctx = ctx.clone();
    let outcome = run_with_deadline(ctx, async move {
        store.fetch_users(&call_ctx, cmd.offset, cmd.limit).await
    })
    .await;
    let users = settle(outcome).inspect_err(|err| log_store_error(ctx, "fetch_users", err))?;
    tracing::debug!(
        event = "users_listed",
        request_id = %ctx.request_id(),
        count = users.len(),
    );
    Ok(users)
}

pub async fn get_user(state: &AppState, ctx: &RequestContext, id: i64) -> Result<User, ApiError> {
    let store = state.store.clone();
    let call_ctx = ctx.clone();
    let outcome =
        run_with_deadline(ctx, async move { store.get_user_by_id(&call_ctx, id).await }).await;
    settle(outcome).inspect_err(|err| log_store_error(ctx, "get_user_by_id", err))
}

pub async fn create_user(
    state: &AppState,
    ctx: &RequestContext,
    user: NewUser,
) -> Result<User, ApiError> {
    let store = state.store.clone();
    let call_ctx = ctx.clone();
    let outcome =
        run_with_deadline(ctx, async move { store.insert_user(&call_ctx, user).await }).await;
    let created = settle(outcome).inspect_err(|err| log_store_error(ctx, "insert_user", err))?;
    tracing::info!(
        event = "user_created",
        request_id = %ctx.request_id(),
        user_id = created.id,
        "User created"
    );
    Ok(created)
}

pub async fn ping(state: &AppState, ctx: &RequestContext) -> Result<(), ApiError> {
    let store = state.store.clone();
    let call_ctx = ctx.clone();
    let outcome = run_with_deadline(ctx, async move { store.ping(&call_ctx).await }).await;
    settle::<()>(outcome).inspect_err(|err| {
        if matches!(err, ApiError::Store(StoreError::Unavailable(_))) {
            tracing::warn!(
                event = "store_unavailable",
                request_id = %ctx.request_id(),
                error = %err,
            );
        } else {
            log_store_error(ctx, "ping", err);
        }
    })
}
