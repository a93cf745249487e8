use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use userbase_core::{NewUser, RequestContext};

use crate::app::AppState;
use crate::domains::errors::ApiError;
use crate::domains::users::service::{self, ListUsersCommand};

use super::types::{ListUsersQuery, UserResponse};

fn rejected(ctx: &RequestContext, err: ApiError) -> ApiError {
    tracing::debug!(
        event = "request_rejected",
        request_id = %ctx.request_id(),
        error = %err,
    );
    err
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let cmd = ListUsersCommand::parse(query.offset.as_deref(), query.limit.as_deref())
        .map_err(|err| rejected(&ctx, err))?;
    let users = service::list_users(&state, &ctx, cmd).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub(super) async fn get_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = service::parse_user_id(&id).map_err(|err| rejected(&ctx, err))?;
    let user = service::get_user(&state, &ctx, id).await?;
    Ok(Json(UserResponse::from(user)))
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let user: NewUser = serde_json::from_slice(&body)
        .map_err(|err| rejected(&ctx, ApiError::BadRequest(err.to_string())))?;
    service::create_user(&state, &ctx, user).await?;
    Ok(StatusCode::OK)
}
