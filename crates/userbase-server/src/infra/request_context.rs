use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use userbase_core::{RequestContext, REQUEST_ID_HEADER};
use uuid::Uuid;

use crate::app::AppState;

/// Reuses an inbound `x-request-id` only when it is a well-formed UUID.
pub fn request_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}

pub fn remote_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0)
}

/// Builds the [`RequestContext`] for every request and logs its completion.
pub async fn correlate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request_id(request.headers()).unwrap_or_else(Uuid::new_v4);
    let remote_addr = remote_addr(&request);
    let ctx = RequestContext::new(
        request_id,
        remote_addr,
        state.config.server.request_timeout(),
    );
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(ctx);

    tracing::Span::current().record("request_id", tracing::field::display(request_id));
    let span = tracing::info_span!("http_request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    tracing::info!(
        event = "request_completed",
        request_id = %request_id,
        remote_addr = ?remote_addr,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
    );
    response
}
