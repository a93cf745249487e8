use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

mod handlers;
pub(crate) mod types;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::list_users))
        .route("/users/", post(handlers::create_user))
        .route("/users/:id", get(handlers::get_user))
}
