use crate::app::AppState;
use axum::Router;

pub(crate) mod health;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::domains::users::http::router())
}
