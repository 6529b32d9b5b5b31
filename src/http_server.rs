/// HTTP Server Module
///
/// Exposes the decision engine to the browser-automation driver. The
/// analyze endpoint never surfaces downstream failures as 5xx: the driver
/// always receives a well-formed decision object. CORS is wide open
/// because the driver runs as a userscript inside the browser.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::engine::{AnalyzeRequest, DecisionEngine, LogReplyRequest};
use crate::llm::Action;
use crate::selector;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
}

#[derive(Debug, Deserialize)]
pub struct TrendUpdateRequest {
    pub region: String,
    pub trends: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectLocationRequest {
    pub target_location: String,
    pub options: Vec<String>,
}

/// Create and configure the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/schedule", get(schedule_endpoint))
        .route("/smart-search", get(smart_search_endpoint))
        .route("/analyze", post(analyze_endpoint))
        .route("/log-reply", post(log_reply_endpoint))
        .route("/update-trends", post(update_trends_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/check-health", get(check_health_endpoint))
        .route("/select-location", post(select_location_endpoint))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Service banner / liveness check
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "service": "xbot_brain",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Current target region, language, keywords and cached trends
async fn schedule_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.engine.schedule_response().await {
        Ok(schedule) => Ok(Json(serde_json::json!(schedule))),
        Err(e) => {
            log::error!("Schedule lookup failed: {:#}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Next discovery search term (triggers pool generation as needed)
async fn smart_search_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let term = state.engine.smart_search().await;
    Json(serde_json::json!(term))
}

/// Analyze a post and draft a reply if appropriate.
///
/// Downstream failures (generator, storage) degrade to a SKIP decision so
/// the driver never has to handle a hard error here.
async fn analyze_endpoint(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<serde_json::Value> {
    match state.engine.analyze(&request).await {
        Ok(response) => Json(serde_json::json!(response)),
        Err(e) => {
            log::error!("Analyze failed for post {}: {:#}", request.post_id, e);
            Json(serde_json::json!({
                "action": Action::Skip,
                "reason": format!("Internal error: {}", e),
                "draft": null,
                "language": "",
                "trend_injected": null
            }))
        }
    }
}

/// Record a successfully posted reply
async fn log_reply_endpoint(
    State(state): State<AppState>,
    Json(request): Json<LogReplyRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.engine.log_reply(&request).await {
        Ok(()) => Ok(Json(serde_json::json!({ "status": "logged" }))),
        Err(e) => {
            log::error!("Failed to log reply for post {}: {:#}", request.post_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Push harvested trends for a region
async fn update_trends_endpoint(
    State(state): State<AppState>,
    Json(request): Json<TrendUpdateRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.engine.update_trends(&request.region, &request.trends).await {
        Ok(count) => Ok(Json(serde_json::json!({
            "status": "updated",
            "region": request.region,
            "trends_count": count
        }))),
        Err(e) => {
            log::error!("Failed to update trends for {}: {:#}", request.region, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Read-only aggregates over the replied table
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.engine.stats().await {
        Ok(stats) => Ok(Json(serde_json::json!(stats))),
        Err(e) => {
            log::error!("Stats query failed: {:#}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Health plus operational warnings (daily volume threshold)
async fn check_health_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.engine.health().await {
        Ok(report) => Ok(Json(serde_json::json!(report))),
        Err(e) => {
            log::error!("Health check failed: {:#}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Pick which on-screen option label best matches the target location
async fn select_location_endpoint(
    Json(request): Json<SelectLocationRequest>,
) -> Json<serde_json::Value> {
    let result = selector::select_option(&request.target_location, &request.options);
    Json(serde_json::json!(result))
}

/// Start the HTTP server
pub async fn start_server(engine: Arc<DecisionEngine>, port: u16) -> Result<()> {
    let app = create_router(AppState { engine });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .context("Failed to bind HTTP server")?;

    log::info!("HTTP server listening on port {}", port);

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
