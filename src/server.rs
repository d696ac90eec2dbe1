//! HTTP trigger host: `POST /invoke` runs the pipeline over one event.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::info;

use crate::pipeline::{EmailPipeline, InvocationResponse, TriggerEvent};

/// Build the router for the trigger host.
pub fn invoke_routes(pipeline: Arc<EmailPipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/invoke", post(invoke))
        .with_state(pipeline)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mailbrief"
    }))
}

async fn invoke(
    State(pipeline): State<Arc<EmailPipeline>>,
    Json(event): Json<TriggerEvent>,
) -> Json<InvocationResponse> {
    info!(records = event.records.len(), "Invocation received");
    Json(pipeline.handle_event(&event).await)
}
