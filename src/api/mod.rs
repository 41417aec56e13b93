// HTTP command surface: registry operations, force-reconcile, standings
// queries. Thin wiring over the core components; all user-facing rendering
// belongs to whatever host consumes these endpoints.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::catalog;
use crate::db::Database;
use crate::error::TrackerError;
use crate::ingest::{Lifecycle, Reconciler};
use crate::metrics;
use crate::source::{CatalogSource, SolveSource};
use crate::standings::Standings;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct TrendParams {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct WhoSolvedParams {
    pub title: String,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub reconciler: Arc<Reconciler>,
    pub standings: Arc<Standings>,
    pub solve_source: Arc<dyn SolveSource>,
    pub catalog_source: Arc<dyn CatalogSource>,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn tracker_error(e: TrackerError) -> axum::response::Response {
    let status = match &e {
        TrackerError::ChallengeNotFound(_) | TrackerError::UserNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        TrackerError::AmbiguousChallengeMatch { .. } | TrackerError::DuplicateUser(_) => {
            StatusCode::CONFLICT
        }
        TrackerError::InvalidDate(_) => StatusCode::BAD_REQUEST,
        TrackerError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        TrackerError::Source(_) => StatusCode::BAD_GATEWAY,
        TrackerError::Corrupt(_) | TrackerError::Db(_) => {
            tracing::error!("internal error: {e}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                .into_response();
        }
    };
    json_error(status, &e.to_string()).into_response()
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        // Registry
        .route("/api/users", get(list_users).post(register_user))
        .route("/api/users/{id}", delete(remove_user))
        .route("/api/users/{id}/reconcile", post(reconcile_user))
        .route("/api/users/{id}/categories", get(category_stats))
        // Catalog
        .route("/api/catalog/sync", post(sync_catalog))
        .route("/api/catalog/resync-titles", post(resync_titles))
        // Standings
        .route("/api/scoreboard", get(global_scoreboard))
        .route("/api/scoreboard/today", get(today_scoreboard))
        .route("/api/trend", get(trend))
        .route("/api/challenges/who-solved", get(who_solved))
        // Metrics
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "lifecycle": state.reconciler.lifecycle() }))
}

async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    match state.standings.global_scoreboard().await {
        Ok(users) => (StatusCode::OK, Json(json!(users))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> impl IntoResponse {
    if req.name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "name is required").into_response();
    }
    match state.reconciler.register_user(req.id, &req.name).await {
        Ok(user) => (StatusCode::CREATED, Json(json!(user))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn remove_user(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.reconciler.remove_user(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => tracker_error(e),
    }
}

/// Force an immediate fetch-and-reconcile for one user. Requires the catalog
/// to have been loaded at least once.
async fn reconcile_user(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    if let Err(e) = state.reconciler.require(Lifecycle::CatalogLoaded) {
        return tracker_error(e);
    }
    let remote = match state.solve_source.fetch_solves(id).await {
        Ok(remote) => remote,
        Err(e) => return tracker_error(e),
    };
    match state.reconciler.reconcile_user(id, &remote).await {
        Ok(outcome) => (StatusCode::OK, Json(json!(outcome))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn sync_catalog(State(state): State<AppState>) -> impl IntoResponse {
    match catalog::sync_catalog(&state.db, state.catalog_source.as_ref()).await {
        Ok(added) => {
            state.reconciler.mark_catalog_loaded();
            (StatusCode::OK, Json(json!({ "added": added.len() }))).into_response()
        }
        Err(e) => tracker_error(e),
    }
}

async fn resync_titles(State(state): State<AppState>) -> impl IntoResponse {
    match catalog::resync_titles(&state.db, state.catalog_source.as_ref()).await {
        Ok(changed) => (StatusCode::OK, Json(json!({ "changed": changed }))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn global_scoreboard(State(state): State<AppState>) -> impl IntoResponse {
    match state.standings.global_scoreboard().await {
        Ok(board) => (StatusCode::OK, Json(json!(board))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn today_scoreboard(State(state): State<AppState>) -> impl IntoResponse {
    match state.standings.today_scoreboard().await {
        Ok(board) => (StatusCode::OK, Json(json!(board))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn trend(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> impl IntoResponse {
    let days = params.days.unwrap_or(7).min(365);
    match state.standings.trend(days).await {
        Ok(report) => (StatusCode::OK, Json(json!(report))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn category_stats(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.standings.category_stats(id).await {
        Ok(stats) => (StatusCode::OK, Json(json!(stats))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn who_solved(
    State(state): State<AppState>,
    Query(params): Query<WhoSolvedParams>,
) -> impl IntoResponse {
    match state.standings.who_solved(&params.title).await {
        Ok(result) => (StatusCode::OK, Json(json!(result))).into_response(),
        Err(e) => tracker_error(e),
    }
}

async fn get_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
