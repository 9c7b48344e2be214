use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bazaar_core::csrf::CsrfTokenIssuer;
use bazaar_events::EventBus;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar_api::config::{ServerConfig, SessionBackend};
use bazaar_api::geo::{GeoResolver, HttpGeoLookup};
use bazaar_api::middleware::auth_gate::AuthGate;
use bazaar_api::router::build_app_router;
use bazaar_api::session::build_session_manager;
use bazaar_api::state::AppState;
use bazaar_api::{background, listeners};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_api=debug,bazaar_events=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        session_backend = ?config.session.backend,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = bazaar_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    bazaar_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    bazaar_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Geo resolver ---
    let lookup = HttpGeoLookup::new(
        config.geo.lookup_url.clone(),
        Duration::from_secs(config.geo.timeout_secs),
    )
    .expect("Failed to build geo lookup HTTP client");
    let geo = Arc::new(GeoResolver::new(
        Arc::new(lookup),
        chrono::Duration::seconds(config.geo.cache_ttl_secs),
    ));

    // --- Sessions ---
    let sessions = build_session_manager(&config.session, pool.clone(), geo);
    if !sessions.revokes_all_devices() {
        tracing::warn!(
            "Token sessions cannot be revoked server-side; logout-all and password \
             changes only sign out the current device"
        );
    }

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::new());
    listeners::register(&event_bus, &pool);
    tracing::info!("Event listeners registered");

    // --- Background jobs ---
    let cancel = CancellationToken::new();
    let cleanup_handle = (config.session.backend == SessionBackend::Database).then(|| {
        tokio::spawn(background::session_cleanup::run(
            pool.clone(),
            Duration::from_secs(config.session.cleanup_interval_secs),
            cancel.clone(),
        ))
    });

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        sessions,
        csrf: Arc::new(CsrfTokenIssuer::new(config.session.secret.as_bytes())),
        event_bus: Arc::clone(&event_bus),
        gate: Arc::new(AuthGate::default_public()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    if let Some(handle) = cleanup_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Session cleanup job stopped");
    }

    let drained = event_bus
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if drained {
        tracing::info!("Event handlers drained");
    } else {
        tracing::warn!(
            in_flight = event_bus.in_flight(),
            "Event handlers still running at shutdown deadline"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
