use std::sync::Arc;
use std::time::Instant;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use userbase_core::UserStore;

use crate::config::ServerConfig;
use crate::infra::request_context;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub started_at: Instant,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>, config: ServerConfig) -> Self {
        Self {
            store,
            started_at: Instant::now(),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.server.max_body_bytes;
    crate::http::router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            request_context::correlate,
        ))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
