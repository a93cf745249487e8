use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use userbase_core::{UserStore, REQUEST_ID_HEADER};
use userbase_db::{connect_postgres_with_max, MemoryUserStore, PgPool, PgUserStore};

use crate::app::{self, AppState};
use crate::runtime;
use crate::settings;

pub fn log_startup(settings: &settings::Settings, memory: bool) {
    tracing::info!(
        event = "server_startup",
        addr = %settings.addr,
        store = if memory { "memory" } else { "postgres" },
        db_pool_max = settings.db_pool_max,
        request_timeout_ms = settings.config.server.request_timeout_ms,
        max_body_bytes = settings.config.server.max_body_bytes,
        server_name = ?settings.config.server.name,
        "Server configuration loaded"
    );
}

pub async fn connect_db(settings: &settings::Settings) -> Result<PgPool, sqlx_core::Error> {
    connect_postgres_with_max(&settings.db_url, settings.db_pool_max).await
}

/// Picks the store backing the server: Postgres, or the seeded in-process
/// store when `memory` is set.
pub async fn build_store(
    settings: &settings::Settings,
    memory: bool,
) -> Result<Arc<dyn UserStore>, sqlx_core::Error> {
    if memory {
        return Ok(Arc::new(MemoryUserStore::seeded()));
    }
    let pool = connect_db(settings).await?;
    Ok(Arc::new(PgUserStore::new(pool)))
}

pub fn build_state(settings: &settings::Settings, store: Arc<dyn UserStore>) -> AppState {
    AppState::new(store, settings.config.clone())
}

pub fn build_app(state: AppState) -> Router {
    let request_id_header = axum::http::HeaderName::from_static(REQUEST_ID_HEADER);
    app::build_router(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                // `correlate` records the validated id once it has one.
                let matched = request
                    .extensions()
                    .get::<axum::extract::MatchedPath>()
                    .map(axum::extract::MatchedPath::as_str)
                    .unwrap_or("unmatched");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %matched,
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(CatchPanicLayer::custom(|err| {
            tracing::error!(event = "panic_recovered", error = ?err, "handler panicked");
            match axum::response::Response::builder()
                .status(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
                .body(axum::body::Body::empty())
            {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!(event = "panic_response_failed", error = %err);
                    axum::response::Response::new(axum::body::Body::empty())
                }
            }
        }))
}

pub async fn serve(settings: &settings::Settings, app: Router) {
    let addr: SocketAddr = settings.addr;
    tracing::info!(%addr, "listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(event = "server_bind_failed", error = %err);
            return;
        }
    };
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        runtime::shutdown_signal().await;
        let _ = stop_tx.send(());
    })
    .into_future();

    // In-flight requests get the grace period to drain after the signal.
    let grace = Duration::from_secs(settings.config.server.shutdown_grace_seconds);
    let grace_elapsed = async move {
        if stop_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            if let Err(err) = result {
                tracing::error!(event = "server_failed", error = %err);
            }
        }
        () = grace_elapsed => {
            tracing::warn!(
                event = "shutdown_grace_elapsed",
                grace_seconds = grace.as_secs(),
                "Dropping connections still open after the grace period"
            );
        }
    }
}
