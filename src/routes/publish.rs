//! Publish trigger (/cron/publish)

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::services::auth;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/cron/publish", get(trigger_publish).post(trigger_publish))
}

#[derive(Deserialize)]
struct TriggerQuery {
    secret: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// GET|POST /cron/publish - Run one publish pass and report per-item outcomes
async fn trigger_publish(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TriggerQuery>,
) -> Result<Response, StatusCode> {
    let presented = auth::presented_secret(&headers, query.secret.as_deref());
    auth::verify_trigger_secret(state.cron_secret.as_deref(), presented)
        .log_status("Publish trigger rejected", StatusCode::UNAUTHORIZED)?;

    let report = state.orchestrator.run_pass().await.log_500("Publish pass failed")?;

    if report.is_empty() {
        return Ok(Json(MessageResponse {
            message: "No items due for publishing",
        })
        .into_response());
    }
    Ok(Json(report).into_response())
}
