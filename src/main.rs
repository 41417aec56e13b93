use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use solvetrack_backend::api::{self, AppState};
use solvetrack_backend::catalog;
use solvetrack_backend::config::Config;
use solvetrack_backend::db::Database;
use solvetrack_backend::ingest::Reconciler;
use solvetrack_backend::metrics;
use solvetrack_backend::poller;
use solvetrack_backend::remote::RemotePlatform;
use solvetrack_backend::source::{CatalogSource, LogSink, NotificationSink, SolveSource};
use solvetrack_backend::standings::Standings;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "solvetrack-backend" }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    let reconciler = Arc::new(Reconciler::new(db.clone()));
    let standings = Arc::new(Standings::new(db.clone()));

    let platform = Arc::new(RemotePlatform::new(
        &config.remote_base_url,
        config.remote_api_key.clone(),
    ));
    let catalog_source: Arc<dyn CatalogSource> = platform.clone();
    let solve_source: Arc<dyn SolveSource> = platform;
    let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);

    // Seed gauges from persisted state
    match db.list_users().await {
        Ok(users) => metrics::TRACKED_USERS.set(users.len() as i64),
        Err(e) => tracing::warn!("could not count users at startup: {e}"),
    }

    // Initial catalog sync; commands that need the catalog stay gated until
    // it succeeds (here or in a later polling cycle).
    match catalog::sync_catalog(&db, catalog_source.as_ref()).await {
        Ok(added) => {
            reconciler.mark_catalog_loaded();
            tracing::info!(added = added.len(), "initial catalog sync complete");
        }
        Err(e) => tracing::warn!("initial catalog sync failed, poller will retry: {e}"),
    }

    poller::spawn_catalog_poller(
        db.clone(),
        reconciler.clone(),
        catalog_source.clone(),
        sink.clone(),
        Duration::from_secs(config.catalog_poll_secs),
    );
    poller::spawn_solve_poller(
        db.clone(),
        reconciler.clone(),
        solve_source.clone(),
        catalog_source.clone(),
        sink,
        Duration::from_secs(config.solve_poll_secs),
    );

    let state = AppState {
        db,
        reconciler,
        standings,
        solve_source,
        catalog_source,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api::router(state))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind port");

    tracing::info!("solvetrack backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
