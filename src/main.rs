use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use protocol_api::app::{app, AppState};
use protocol_api::config;
use protocol_api::store::PgStore;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, ENCRYPTION_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Protocol API in {:?} mode", config.environment);

    let store = match PgStore::from_env().await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    let state = AppState::new(store, config);

    // Periodic audit retention sweep; request handlers never run cleanup.
    let audit = state.audit.clone();
    let retention_days = config.audit.retention_days;
    let sweep_interval =
        std::time::Duration::from_secs(config.audit.cleanup_interval_hours * 3600);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        // the first tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            audit.cleanup_old_logs(retention_days).await;
        }
    });

    let mut router = app(state);
    if config.api.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Protocol API listening on http://{}", bind_addr);

    axum::serve(listener, router).await.expect("server");
}
