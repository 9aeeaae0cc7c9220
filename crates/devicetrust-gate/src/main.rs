//! Device Trust Gate Binary
//!
//! Runs the token gate HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use devicetrust_gate::{create_router, AppState, GateConfig, Gatekeeper, MemoryStore, TokenIssuer};
use devicetrust_signal::handlers::FingerprintJsProvider;
use devicetrust_signal::{announce, BotSignalProvider, DisabledProvider};

#[tokio::main]
async fn main() {
    let config = GateConfig::from_env().expect("Invalid gate configuration");

    // Initialize logging
    let log_level = config.log_level.parse().unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!(config = ?config, "Configuration loaded");

    // Bot signal provider
    let provider: Arc<dyn BotSignalProvider> = if config.fingerprint_api.is_configured() {
        Arc::new(
            FingerprintJsProvider::new(config.fingerprint_api.clone())
                .expect("Failed to build bot signal client"),
        )
    } else {
        Arc::new(DisabledProvider::new())
    };
    announce(provider.as_ref());

    let issuer = TokenIssuer::new(config.signing_secret.as_bytes(), config.token_expiration);
    let builder = Gatekeeper::builder(issuer)
        .provider(provider)
        .policy(config.policy.clone())
        .rate_limit(config.rate_limit)
        .failure_limit(config.failure_limit)
        .timestamp_tolerance(config.timestamp_tolerance);

    // Initialize storage
    let builder = match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = Arc::new(
                devicetrust_gate::storage::PostgresStore::new(url)
                    .await
                    .expect("Failed to connect to database"),
            );
            builder.store(store.clone()).sink(store)
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("GATE_DATABASE_URL is set but the postgres feature is disabled; using memory store");
            builder.memory_store(Arc::new(MemoryStore::new()))
        }
        None => builder.memory_store(Arc::new(MemoryStore::new())),
    };

    let state = Arc::new(
        AppState::new(builder.build()).with_cors_origins(config.cors_allowed_origins.clone()),
    );

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!(addr = %addr, "Device trust gate listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server error");
}
