// Common test utilities and helper structs
// Shared across all test files to avoid duplication

#![allow(dead_code)]

use async_trait::async_trait;
use auth_backend_core::{
    app::AppState,
    app_config::{JwtConfig, OtpRateLimitSettings},
    build_router,
    handlers::{AuthController, AuthRequest},
    middleware::{JwtTokenVerifier, OtpLimiter},
    models::NewSecurityLog,
    services::{SecurityLogSession, SecurityLogStore, SecurityLogger, StoreError},
    RouterOptions,
};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
    response::{IntoResponse, Json},
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";

// =============================================================================
// IN-MEMORY SECURITY LOG STORE
// =============================================================================

#[derive(Default)]
pub struct StoreState {
    pub records: Mutex<Vec<NewSecurityLog>>,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub fail_inserts: AtomicBool,
    pub fail_acquire: AtomicBool,
}

/// Cloneable handle; every clone sees the same records and counters
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub state: Arc<StoreState>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.state.fail_inserts.store(true, Ordering::SeqCst);
        store
    }

    pub fn unreachable() -> Self {
        let store = Self::default();
        store.state.fail_acquire.store(true, Ordering::SeqCst);
        store
    }

    pub fn records(&self) -> Vec<NewSecurityLog> {
        self.state.records.lock().unwrap().clone()
    }

    pub fn acquired(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    /// Wait for spawned log writes to land
    pub async fn wait_for_records(&self, count: usize) -> Vec<NewSecurityLog> {
        for _ in 0..100 {
            let records = self.records();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} security log records, found {}",
            count,
            self.records().len()
        );
    }
}

pub struct RecordingSession {
    state: Arc<StoreState>,
}

#[async_trait]
impl SecurityLogStore for RecordingStore {
    async fn acquire(&self) -> Result<Box<dyn SecurityLogSession>, StoreError> {
        if self.state.fail_acquire.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("pool timed out".to_string()));
        }
        self.state.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            state: self.state.clone(),
        }))
    }
}

#[async_trait]
impl SecurityLogSession for RecordingSession {
    async fn create(&mut self, record: &NewSecurityLog) -> Result<(), StoreError> {
        if self.state.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Query(diesel::result::Error::BrokenTransactionManager));
        }
        self.state.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        self.state.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn logger_with(store: &RecordingStore) -> SecurityLogger {
    SecurityLogger::new(Arc::new(store.clone()))
}

// =============================================================================
// CAPTURED TRACING OUTPUT
// =============================================================================

/// Formatted tracing output for the current thread, kept in memory
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Route this thread's tracing events into the buffer until the guard drops.
    /// Pair with a current-thread runtime so awaited work stays on this thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// =============================================================================
// RECORDING CONTROLLER
// =============================================================================

#[derive(Default)]
pub struct RecordingController {
    pub calls: Mutex<Vec<(&'static str, AuthRequest)>>,
}

impl RecordingController {
    pub fn actions(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(a, _)| *a).collect()
    }

    pub fn last_request(&self) -> Option<AuthRequest> {
        self.calls.lock().unwrap().last().map(|(_, r)| r.clone())
    }

    fn record(&self, action: &'static str, request: AuthRequest) -> axum::response::Response {
        let user = request.context.user.as_ref().map(|u| u.user_id.clone());
        self.calls.lock().unwrap().push((action, request));
        (
            StatusCode::OK,
            Json(json!({ "success": true, "action": action, "user": user })),
        )
            .into_response()
    }
}

#[async_trait]
impl AuthController for RecordingController {
    async fn initiate_signup(&self, request: AuthRequest) -> axum::response::Response {
        self.record("initiate_signup", request)
    }

    async fn verify_signup(&self, request: AuthRequest) -> axum::response::Response {
        self.record("verify_signup", request)
    }

    async fn initiate_login(&self, request: AuthRequest) -> axum::response::Response {
        self.record("initiate_login", request)
    }

    async fn verify_login(&self, request: AuthRequest) -> axum::response::Response {
        self.record("verify_login", request)
    }

    async fn complete_profile(&self, request: AuthRequest) -> axum::response::Response {
        self.record("complete_profile", request)
    }

    async fn verify_token(&self, request: AuthRequest) -> axum::response::Response {
        self.record("verify_token", request)
    }

    async fn request_password_reset(&self, request: AuthRequest) -> axum::response::Response {
        self.record("request_password_reset", request)
    }

    async fn reset_password(&self, request: AuthRequest) -> axum::response::Response {
        self.record("reset_password", request)
    }
}

// =============================================================================
// TEST APPLICATION
// =============================================================================

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub controller: Arc<RecordingController>,
    pub store: RecordingStore,
}

impl TestApp {
    /// Send a POST request
    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "POST", uri)
    }

    /// Send a GET request
    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "GET", uri)
    }
}

/// Setup test application with in-memory collaborators
pub fn setup_test_app() -> TestApp {
    setup_test_app_with_limit(OtpRateLimitSettings::default())
}

pub fn setup_test_app_with_limit(settings: OtpRateLimitSettings) -> TestApp {
    setup_test_app_with_options(settings, RouterOptions::default())
}

pub fn setup_test_app_with_options(
    settings: OtpRateLimitSettings,
    options: RouterOptions,
) -> TestApp {
    let controller = Arc::new(RecordingController::default());
    let store = RecordingStore::new();

    let state = AppState {
        controller: controller.clone(),
        token_verifier: Arc::new(JwtTokenVerifier::new(&JwtConfig {
            access_secret: TEST_JWT_SECRET.to_string(),
            issuer: None,
            audience: None,
        })),
        otp_limiter: Arc::new(OtpLimiter::new(settings)),
        security_logger: logger_with(&store),
    };

    TestApp {
        app: build_router(state, &options),
        controller,
        store,
    }
}

/// Sign an access token for `sub` that expires `ttl_seconds` from now
pub fn access_token(sub: &str, ttl_seconds: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + ttl_seconds;
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": sub, "exp": exp, "email": format!("{}@example.com", sub) }),
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: &'static str,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    peer: String,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &'static str, uri: &str) -> Self {
        Self {
            app,
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: None,
            peer: "127.0.0.1:12345".to_string(),
        }
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self.header("content-type", "application/json")
    }

    pub fn raw_body(mut self, body: &str) -> Self {
        self.body = Some(body.as_bytes().to_vec());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {}", token))
    }

    /// Set the socket peer address for this request
    pub fn with_peer(mut self, addr: &str) -> Self {
        self.peer = addr.to_string();
        self
    }

    /// Send the request
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut request = builder
            .body(self.body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        request
            .extensions_mut()
            .insert(ConnectInfo(self.peer.parse::<SocketAddr>().unwrap()));

        let response = self.app.app.clone().oneshot(request).await.unwrap();

        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    /// Get status code
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Parse JSON response
    pub async fn json(self) -> Value {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}
