// SPDX-License-Identifier: MIT

//! HTTP front end for the plan and complaint workflows

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::RunError;
use crate::kinetic::agents::{ComplaintAgent, PlanAgent, PlanProgress};

/// Agents shared by all requests
pub struct AppState {
    pub plan: PlanAgent,
    pub complaint: ComplaintAgent,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/plan", post(run_plan))
        .route("/api/plan/stream", post(stream_plan))
        .route("/api/complaints", post(handle_complaint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await
}

/// Error body `{ "error": ... }` with a status code
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        log::error!("Workflow run failed: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub goal: String,
}

#[derive(Debug, Deserialize)]
pub struct ComplaintRequest {
    pub title: String,
    pub description: String,
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_plan(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlanRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.goal.trim().is_empty() {
        return Err(ApiError::bad_request("goal must not be empty"));
    }
    let result = state.plan.invoke(&payload.goal).await?;
    Ok(Json(json!({
        "status": "completed",
        "goal": payload.goal,
        "tasks": result.get("tasks"),
        "completed_tasks": result.get("completed_tasks"),
        "final_res": result.get("final_res"),
    })))
}

fn progress_event(item: Result<PlanProgress, RunError>) -> Event {
    let payload = match item {
        Ok(progress) => serde_json::to_value(progress).unwrap_or_default(),
        Err(e) => {
            log::error!("Plan stream failed: {}", e);
            json!({ "status": "error", "error": e.to_string() })
        }
    };
    Event::default().data(payload.to_string())
}

async fn stream_plan(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlanRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if payload.goal.trim().is_empty() {
        return Err(ApiError::bad_request("goal must not be empty"));
    }
    log::info!("Streaming plan for: {}", payload.goal);

    // Dropping the response stream on disconnect cancels the running step
    let stream = state
        .plan
        .stream(&payload.goal)
        .map(|item| Ok::<_, Infallible>(progress_event(item)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

async fn handle_complaint(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ComplaintRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.title.trim().is_empty() && payload.description.trim().is_empty() {
        return Err(ApiError::bad_request("complaint must have a title or description"));
    }
    let outcome = state
        .complaint
        .handle(&payload.title, &payload.description)
        .await?;
    Ok(Json(serde_json::to_value(outcome).unwrap_or_default()))
}
