#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex, Once};

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;
use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;
use userbase_core::UserStore;
use userbase_db::MemoryUserStore;
use userbase_server::app::{build_router, AppState};
use userbase_server::bootstrap::build_app;
use userbase_server::config::ServerConfig;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("userbase_server=debug,userbase_db=debug"))
            .with_test_writer()
            .try_init();
    });
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryUserStore>,
}

impl TestApp {
    pub fn new(store: MemoryUserStore) -> Self {
        Self::with_config(store, ServerConfig::default())
    }

    pub fn seeded() -> Self {
        Self::new(MemoryUserStore::seeded())
    }

    pub fn with_config(store: MemoryUserStore, config: ServerConfig) -> Self {
        init_tracing();
        let store = Arc::new(store);
        let shared: Arc<dyn UserStore> = store.clone();
        let app = build_router(AppState::new(shared, config));
        Self { app, store }
    }

    /// Same router wrapped in the production layers (trace span, request id,
    /// panic catcher).
    pub fn layered(store: MemoryUserStore) -> Self {
        init_tracing();
        let store = Arc::new(store);
        let shared: Arc<dyn UserStore> = store.clone();
        let app = build_app(AppState::new(shared, ServerConfig::default()));
        Self { app, store }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        read(self.send(request).await).await
    }

    pub async fn post(&self, uri: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        read(self.send(request).await).await
    }
}

pub async fn read(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

/// Collects JSON log lines written while its guard is installed on the
/// current thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

pub struct LogWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("log buffer lock")
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: self.buffer.clone(),
        }
    }
}

impl LogCapture {
    /// Routes this thread's events into the capture until the guard drops.
    /// Tests using it must run on the current-thread runtime.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_env_filter(EnvFilter::new("userbase_server=debug,userbase_db=debug"))
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn raw(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().expect("log buffer lock")).into_owned()
    }

    pub fn lines(&self) -> Vec<Value> {
        self.raw()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("json log line"))
            .collect()
    }

    /// Lines whose `event` field equals `event`.
    pub fn events(&self, event: &str) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["event"] == event)
            .collect()
    }
}
