use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::cache::{CacheStats, ScrapeCache};
use crate::history::{RunHistory, RunSummary};
use crate::scrape::types::AggregateResult;
use crate::scrape::ScrapeEngine;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<ScrapeEngine>,
    cache: Arc<ScrapeCache>,
    history: Arc<RunHistory>,
    started: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<ScrapeEngine>,
        cache: Arc<ScrapeCache>,
        history: Arc<RunHistory>,
    ) -> Self {
        Self {
            engine,
            cache,
            history,
            started: Instant::now(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scrape/comprehensive", post(scrape_comprehensive))
        .route("/scrape/{source}", post(scrape_single))
        .route("/debug/cache", get(debug_cache))
        .route("/debug/history", get(debug_history))
        .route("/admin/purge-cache", post(admin_purge_cache))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn reject(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResp {
    status: &'static str,
    timestamp: String,
    uptime_secs: u64,
    version: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    Json(HealthResp {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        uptime_secs: state.started.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(serde::Deserialize)]
struct ComprehensiveReq {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    sources: Option<Vec<String>>,
}

async fn scrape_comprehensive(
    State(state): State<AppState>,
    Json(body): Json<ComprehensiveReq>,
) -> Result<Json<AggregateResult>, (StatusCode, Json<Value>)> {
    let identifier = body.identifier.unwrap_or_default();
    if identifier.trim().is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "identifier is required (email, name, or username)",
        ));
    }
    let sources = body
        .sources
        .unwrap_or_else(|| vec![crate::registry::ALL_SOURCES.to_string()]);

    match state.engine.run_comprehensive(&identifier, &sources).await {
        Ok(result) => {
            state.history.push(&result);
            Ok(Json(result))
        }
        Err(err) => Err(reject(StatusCode::BAD_REQUEST, format!("{err:#}"))),
    }
}

#[derive(serde::Deserialize)]
struct SingleReq {
    #[serde(default)]
    identifier: Option<String>,
}

async fn scrape_single(
    State(state): State<AppState>,
    Path(source): Path<String>,
    Json(body): Json<SingleReq>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let name = source.trim().to_ascii_lowercase();
    if !state.engine.registry().contains(&name) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": format!("Unknown source '{name}'"),
                "availableSources": state.engine.registry().names(),
            })),
        ));
    }

    let identifier = body.identifier.unwrap_or_default();
    if identifier.trim().is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "identifier is required (email, name, or username)",
        ));
    }

    match state.engine.run_single(&name, &identifier).await {
        Ok(result) => Ok(Json(json!({
            "success": true,
            "source": name,
            "data": result,
        }))),
        Err(err) => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "success": false,
                "source": name,
                "error": format!("{err:#}"),
            })),
        )),
    }
}

async fn debug_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

async fn debug_history(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    Json(state.history.snapshot_last_n(10))
}

#[derive(serde::Deserialize)]
struct PurgeParams {
    source: Option<String>,
    identifier: Option<String>,
}

async fn admin_purge_cache(
    State(state): State<AppState>,
    Query(q): Query<PurgeParams>,
) -> Json<Value> {
    let purged = state.cache.purge(q.source.as_deref(), q.identifier.as_deref());
    Json(json!({ "success": true, "purged": purged }))
}
