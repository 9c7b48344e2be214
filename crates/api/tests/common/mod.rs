#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, Response};
use axum::Router;
use bazaar_core::csrf::CsrfTokenIssuer;
use bazaar_core::error::SessionError;
use bazaar_core::session::Session;
use bazaar_core::types::DbId;
use bazaar_events::EventBus;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

use bazaar_api::config::{GeoConfig, ServerConfig, SessionBackend, SessionConfig};
use bazaar_api::geo::{GeoError, GeoLocation, GeoLookup, GeoResolver};
use bazaar_api::listeners;
use bazaar_api::middleware::auth_gate::AuthGate;
use bazaar_api::router::build_app_router;
use bazaar_api::session::{
    ClientInfo, CookieSettings, DatabaseSessionManager, MemorySessionStore, PgSessionStore,
    SessionManager, TokenSessionManager,
};
use bazaar_api::state::AppState;

pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Address every test request claims to come from.
pub const CLIENT_IP: &str = "1.2.3.4";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        session: SessionConfig {
            backend: SessionBackend::Database,
            secret: TEST_SECRET.to_string(),
            cookie_secure: false,
            cleanup_interval_secs: 3600,
        },
        geo: GeoConfig {
            lookup_url: "http://127.0.0.1:9".to_string(),
            cache_ttl_secs: 600,
            timeout_secs: 1,
        },
    }
}

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

/// Places every public address in Berlin.
pub struct BerlinLookup;

#[async_trait]
impl GeoLookup for BerlinLookup {
    async fn lookup(&self, _ip: &str) -> Result<GeoLocation, GeoError> {
        Ok(GeoLocation {
            city: "Berlin".into(),
            country: "Germany".into(),
            latitude: 52.52,
            longitude: 13.405,
        })
    }
}

pub fn berlin_geo() -> Arc<GeoResolver> {
    Arc::new(GeoResolver::new(
        Arc::new(BerlinLookup),
        chrono::Duration::minutes(10),
    ))
}

/// Wraps a session manager and counts `check` calls.
pub struct CountingSessions {
    inner: Arc<dyn SessionManager>,
    checks: AtomicUsize,
}

impl CountingSessions {
    pub fn new(inner: Arc<dyn SessionManager>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            checks: AtomicUsize::new(0),
        })
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionManager for CountingSessions {
    fn cookie_name(&self) -> &'static str {
        self.inner.cookie_name()
    }

    fn revokes_all_devices(&self) -> bool {
        self.inner.revokes_all_devices()
    }

    async fn check(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.check(headers).await
    }

    async fn create(
        &self,
        response: &mut HeaderMap,
        user_id: DbId,
        client: &ClientInfo,
    ) -> Result<Session, SessionError> {
        self.inner.create(response, user_id, client).await
    }

    async fn destroy_current(
        &self,
        response: &mut HeaderMap,
        headers: &HeaderMap,
    ) -> Result<(), SessionError> {
        self.inner.destroy_current(response, headers).await
    }

    async fn destroy_all(&self, response: &mut HeaderMap, user_id: DbId) -> Result<(), SessionError> {
        self.inner.destroy_all(response, user_id).await
    }
}

/// Reads sessions through `inner` but fails every create and revoke-all,
/// like a store that accepts reads and drops writes.
pub struct FailingWrites {
    inner: Arc<dyn SessionManager>,
}

impl FailingWrites {
    pub fn new(inner: Arc<dyn SessionManager>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl SessionManager for FailingWrites {
    fn cookie_name(&self) -> &'static str {
        self.inner.cookie_name()
    }

    fn revokes_all_devices(&self) -> bool {
        self.inner.revokes_all_devices()
    }

    async fn check(&self, headers: &HeaderMap) -> Result<Session, SessionError> {
        self.inner.check(headers).await
    }

    async fn create(
        &self,
        _response: &mut HeaderMap,
        _user_id: DbId,
        _client: &ClientInfo,
    ) -> Result<Session, SessionError> {
        Err(SessionError::store("insert", "connection reset by peer"))
    }

    async fn destroy_current(
        &self,
        response: &mut HeaderMap,
        headers: &HeaderMap,
    ) -> Result<(), SessionError> {
        self.inner.destroy_current(response, headers).await
    }

    async fn destroy_all(&self, _response: &mut HeaderMap, _user_id: DbId) -> Result<(), SessionError> {
        Err(SessionError::store("delete_all", "connection reset by peer"))
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// A pool that never connects until used. For tests that stay off the
/// database.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://bazaar@127.0.0.1:1/unused")
        .expect("lazy pool URL should parse")
}

pub fn memory_sessions() -> Arc<dyn SessionManager> {
    Arc::new(DatabaseSessionManager::new(
        Arc::new(MemorySessionStore::new()),
        berlin_geo(),
        CookieSettings::default(),
    ))
}

pub fn postgres_sessions(pool: PgPool) -> Arc<dyn SessionManager> {
    Arc::new(DatabaseSessionManager::new(
        Arc::new(PgSessionStore::new(pool)),
        berlin_geo(),
        CookieSettings::default(),
    ))
}

pub fn token_sessions() -> Arc<dyn SessionManager> {
    Arc::new(TokenSessionManager::new(
        TEST_SECRET,
        berlin_geo(),
        CookieSettings::default(),
    ))
}

/// Application under test plus handles the tests inspect.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new(pool: PgPool, sessions: Arc<dyn SessionManager>) -> Self {
        let config = test_config();
        let event_bus = Arc::new(EventBus::new());
        listeners::register(&event_bus, &pool);

        let state = AppState {
            pool,
            config: Arc::new(config.clone()),
            sessions,
            csrf: Arc::new(CsrfTokenIssuer::new(TEST_SECRET)),
            event_bus,
            gate: Arc::new(AuthGate::default_public()),
        };

        Self {
            router: build_app_router(state.clone(), &config),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Wait for every event handler spawned so far.
    pub async fn drain_events(&self) {
        assert!(
            self.state.event_bus.shutdown(Duration::from_secs(5)).await,
            "event handlers did not finish"
        );
    }
}

/// Log `user_id` in directly through the session manager and return the
/// request cookie header a browser would send afterwards.
pub async fn login_as(sessions: &dyn SessionManager, user_id: DbId) -> String {
    let mut response = HeaderMap::new();
    let client = ClientInfo {
        remote_ip: CLIENT_IP.to_string(),
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .to_string(),
    };
    sessions.create(&mut response, user_id, &client).await.unwrap();
    cookie_from(&response)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Build a request with an optional cookie and JSON body.
pub fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, cookie, None)
}

pub fn post(uri: &str, cookie: Option<&str>) -> Request<Body> {
    request(Method::POST, uri, cookie, None)
}

pub fn post_json(uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    request(Method::POST, uri, cookie, Some(body))
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// All `Set-Cookie` values of a response.
pub fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Turn `Set-Cookie` headers into the `Cookie` header a browser would send.
pub fn cookie_from(headers: &HeaderMap) -> String {
    set_cookies(headers)
        .iter()
        .map(|c| c.split(';').next().unwrap().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
