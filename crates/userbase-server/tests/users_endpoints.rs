use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use userbase_core::{NewUser, RequestContext, StoreError, User, UserStore, REQUEST_ID_HEADER};
use userbase_db::memory::InsertFault;
use userbase_db::MemoryUserStore;
use userbase_server::app::{build_router, AppState};
use userbase_server::config::ServerConfig;
use uuid::Uuid;

mod support;

use support::TestApp;

fn json(body: &str) -> Value {
    serde_json::from_str(body).expect("json body")
}

#[tokio::test]
async fn ping_is_empty_ok_and_skips_store() {
    let app = TestApp::seeded();
    let (status, body) = app.get("/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(app.store.completed_calls(), 0);
}

#[tokio::test]
async fn wrong_method_and_unknown_route() {
    let app = TestApp::seeded();
    let (status, _) = app.post("/ping", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn every_response_carries_request_id() {
    let app = TestApp::seeded();
    let request = Request::builder()
        .uri("/ping")
        .body(Body::empty())
        .expect("request");
    let response = app.send(request).await;
    let header = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .expect("request id header");
    assert!(Uuid::parse_str(header).is_ok());

    let response = app
        .send(
            Request::builder()
                .uri("/users/bogus")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn inbound_uuid_request_id_is_reused() {
    let app = TestApp::seeded();
    let id = Uuid::new_v4();
    let request = Request::builder()
        .uri("/users/1")
        .header(REQUEST_ID_HEADER, id.to_string())
        .body(Body::empty())
        .expect("request");
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some(id.to_string().as_str())
    );
}

#[tokio::test]
async fn list_returns_first_page_in_id_order() {
    let app = TestApp::seeded();
    let (status, body) = app.get("/users?limit=2&offset=0").await;
    assert_eq!(status, StatusCode::OK);
    let users = json(&body);
    let users = users.as_array().expect("array");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["id"], 1);
    assert_eq!(users[0]["name"], "Vasy");
    assert_eq!(users[1]["id"], 2);
    assert_eq!(users[1]["name"], "VasyVasy");
    assert!(users[0]["created_on"].is_string());
}

#[tokio::test]
async fn list_defaults_when_query_is_missing() {
    let app = TestApp::seeded();
    let (status, body) = app.get("/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().expect("array").len(), 5);

    let (status, body) = app.get("/users?offset=3").await;
    assert_eq!(status, StatusCode::OK);
    let users = json(&body);
    assert_eq!(users[0]["name"], "PetyPety");
}

#[tokio::test]
async fn list_caps_limit_at_page_max() {
    let app = TestApp::new(MemoryUserStore::new());
    let ctx = RequestContext::detached(Duration::from_secs(2));
    for index in 0..30 {
        app.store
            .insert_user(&ctx, NewUser::new(format!("user-{index}")))
            .await
            .expect("insert");
    }
    let (status, body) = app.get("/users?limit=100&offset=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().expect("array").len(), 25);
}

#[tokio::test]
async fn list_rejects_bad_paging_values() {
    let app = TestApp::seeded();
    let (status, body) = app.get("/users?limit=99999999999999999999&offset=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "bad limit");

    let (status, body) = app.get("/users?limit=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "bad limit");

    let (status, body) = app.get("/users?limit=abc&offset=-2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "bad offset");
    assert_eq!(app.store.completed_calls(), 0);
}

#[tokio::test]
async fn get_returns_single_user() {
    let app = TestApp::seeded();
    let (status, body) = app.get("/users/3").await;
    assert_eq!(status, StatusCode::OK);
    let user = json(&body);
    assert_eq!(user["id"], 3);
    assert_eq!(user["name"], "Pety");
}

#[tokio::test]
async fn get_rejects_non_numeric_id() {
    let app = TestApp::seeded();
    for uri in ["/users/abc", "/users/-1", "/users/99999999999999999999"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, "bad id");
    }
}

#[tokio::test]
async fn get_missing_user_is_server_error() {
    let app = TestApp::seeded();
    let (status, body) = app.get("/users/42").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "record not found");
}

#[tokio::test]
async fn create_then_fetch_round_trip() {
    let app = TestApp::seeded();
    let (status, body) = app.post("/users/", r#"{"name":"Vasy"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(app.store.commits(), 1);

    let (status, body) = app.get("/users/6").await;
    assert_eq!(status, StatusCode::OK);
    let user = json(&body);
    assert_eq!(user["id"], 6);
    assert_eq!(user["name"], "Vasy");
    assert!(user["created_on"].is_string());
}

#[tokio::test]
async fn create_rejects_store_assigned_fields() {
    let app = TestApp::seeded();
    let (status, body) = app.post("/users/", r#"{"id":0}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        "unknown field `id`, expected `name` at line 1 column 5"
    );
    assert_eq!(app.store.commits(), 0);
    assert_eq!(app.store.len().await, 5);
}

#[tokio::test]
async fn create_rejects_malformed_json() {
    let app = TestApp::seeded();
    let (status, _) = app.post("/users/", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app.post("/users/", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("missing field `name`"), "{body}");
}

#[tokio::test]
async fn failed_insert_rolls_back() {
    let app = TestApp::new(MemoryUserStore::seeded().with_insert_fault(InsertFault::Fail));
    let (status, body) = app.post("/users/", r#"{"name":"Kolya"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("duplicate key"), "{body}");
    assert_eq!(app.store.commits(), 0);
    assert_eq!(app.store.rollbacks(), 1);
    assert_eq!(app.store.len().await, 5);
}

#[tokio::test]
async fn panicking_insert_is_aborted_not_crashed() {
    let app = TestApp::new(MemoryUserStore::seeded().with_insert_fault(InsertFault::Panic));
    let (status, body) = app.post("/users/", r#"{"name":"Kolya"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "aborted: insert of user 6 panicked");
    assert_eq!(app.store.rollbacks(), 1);

    let (status, _) = app.get("/ping").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = ServerConfig::default();
    config.server.max_body_bytes = 16;
    let app = TestApp::with_config(MemoryUserStore::seeded(), config);
    let name = "x".repeat(64);
    let (status, _) = app.post("/users/", &format!(r#"{{"name":"{name}"}}"#)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.store.len().await, 5);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::seeded();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    let health = json(&body);
    assert_eq!(health["status"], "ok");
    assert!(health["uptime_seconds"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn slow_list_is_busy_before_store_finishes() {
    let app = TestApp::new(MemoryUserStore::seeded().with_latency(Duration::from_secs(3)));
    let (status, body) = app.get("/users?limit=2&offset=0").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "server is busy");
    assert_eq!(app.store.completed_calls(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(app.store.completed_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn call_within_deadline_returns_real_result() {
    let app = TestApp::new(MemoryUserStore::seeded().with_latency(Duration::from_secs(1)));
    let (status, body) = app.get("/users/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["name"], "VasyVasy");
    assert_eq!(app.store.completed_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_insert_is_busy_and_never_commits() {
    let app = TestApp::new(MemoryUserStore::seeded().with_latency(Duration::from_secs(3)));
    let (status, body) = app.post("/users/", r#"{"name":"Kolya"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "server is busy");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(app.store.commits(), 0);
    assert_eq!(app.store.rollbacks(), 1);
    assert_eq!(app.store.len().await, 5);
}

#[tokio::test(start_paused = true)]
async fn slow_health_is_busy() {
    let app = TestApp::new(MemoryUserStore::seeded().with_latency(Duration::from_secs(3)));
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "server is busy");
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_is_honoured() {
    let mut config = ServerConfig::default();
    config.server.request_timeout_ms = 500;
    let app = TestApp::with_config(
        MemoryUserStore::seeded().with_latency(Duration::from_secs(1)),
        config,
    );
    let (status, body) = app.get("/users/1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "server is busy");
}

#[tokio::test]
async fn method_is_checked_for_user_routes() {
    let app = TestApp::seeded();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/users/1")
        .body(Body::empty())
        .expect("request");
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

/// Gives up exactly at the request deadline, the way `PgUserStore` does.
struct DeadlineBoundStore;

impl DeadlineBoundStore {
    async fn never_ready<T>(ctx: &RequestContext) -> Result<T, StoreError> {
        tokio::time::timeout_at(ctx.deadline(), std::future::pending::<()>())
            .await
            .map_err(|_| StoreError::Unavailable("context deadline exceeded".to_string()))?;
        Err(StoreError::Database("unreachable".to_string()))
    }
}

#[async_trait]
impl UserStore for DeadlineBoundStore {
    async fn insert_user(&self, ctx: &RequestContext, _user: NewUser) -> Result<User, StoreError> {
        Self::never_ready(ctx).await
    }

    async fn get_user_by_id(&self, ctx: &RequestContext, _id: i64) -> Result<User, StoreError> {
        Self::never_ready(ctx).await
    }

    async fn fetch_users(
        &self,
        ctx: &RequestContext,
        _offset: i64,
        _limit: i64,
    ) -> Result<Vec<User>, StoreError> {
        Self::never_ready(ctx).await
    }

    async fn ping(&self, ctx: &RequestContext) -> Result<(), StoreError> {
        Self::never_ready(ctx).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn store_timing_out_with_the_request_is_still_busy() {
    support::init_tracing();
    let mut config = ServerConfig::default();
    config.server.request_timeout_ms = 50;
    let store: Arc<dyn UserStore> = Arc::new(DeadlineBoundStore);
    let app = build_router(AppState::new(store, config));

    for _ in 0..20 {
        let request = Request::builder()
            .uri("/users/1")
            .body(Body::empty())
            .expect("request");
        let response = tower::ServiceExt::oneshot(app.clone(), request)
            .await
            .expect("router is infallible");
        let (status, body) = support::read(response).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "server is busy");
    }
}
