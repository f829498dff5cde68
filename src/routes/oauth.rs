//! Platform OAuth endpoints (/oauth/{platform}/*)

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor};

use crate::AppState;
use crate::domain::Platform;
use crate::error::PublishError;
use crate::platform::percent_encode;
use crate::services::auth;
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/oauth/{platform}/authorize", get(authorize))
        .route("/oauth/{platform}/callback", get(callback));

    // Rate limit: 5 request burst, then 1 per 12 seconds per client IP
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(12)
        .burst_size(5)
        .key_extractor(SmartIpKeyExtractor)
        .finish();

    match rate_limit_config {
        Some(config) => router.layer(GovernorLayer {
            config: config.into(),
        }),
        None => {
            tracing::error!("Invalid OAuth rate limit config; serving without rate limiting");
            router
        }
    }
}

fn parse_platform(raw: &str) -> Result<Platform, StatusCode> {
    Platform::parse(raw).ok_or(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
struct AuthorizeQuery {
    account_id: i64,
    secret: Option<String>,
}

#[derive(Serialize)]
struct AuthUrlResponse {
    url: String,
}

/// GET /oauth/{platform}/authorize - Start OAuth for an account, returns URL to send the owner to
async fn authorize(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthUrlResponse>, StatusCode> {
    let presented = auth::presented_secret(&headers, query.secret.as_deref());
    auth::verify_trigger_secret(state.cron_secret.as_deref(), presented)
        .log_status("OAuth authorize rejected", StatusCode::UNAUTHORIZED)?;
    let platform = parse_platform(&platform)?;

    let url = match state.token_exchange.start(platform, query.account_id).await {
        Ok(url) => url,
        Err(e @ PublishError::PlatformNotConfigured(_)) => {
            return Err(e).log_status("OAuth authorize for unconfigured platform", StatusCode::NOT_FOUND);
        }
        Err(e) => return Err(e).log_500("Failed to start OAuth"),
    };

    Ok(Json(AuthUrlResponse { url }))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn with_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// GET /oauth/{platform}/callback - Finish OAuth and redirect the owner back to the app
async fn callback(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, StatusCode> {
    let platform = parse_platform(&platform)?;
    let failure = |reason: &str| {
        Redirect::to(&with_query(
            &state.oauth_failure_url,
            &[("platform", platform.as_str()), ("reason", reason)],
        ))
    };

    if let Some(error) = query.error {
        let reason = query.error_description.unwrap_or(error);
        tracing::warn!(%platform, reason = %reason, "OAuth denied by provider");
        return Ok(failure(&reason));
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        tracing::warn!(%platform, "OAuth callback missing code or state");
        return Ok(failure("missing code or state"));
    };

    match state.token_exchange.complete(platform, &code, &oauth_state).await {
        Ok(account_id) => Ok(Redirect::to(&with_query(
            &state.oauth_success_url,
            &[("platform", platform.as_str()), ("account_id", &account_id.to_string())],
        ))),
        Err(e) => {
            tracing::warn!(%platform, error = %e, "OAuth callback failed");
            Ok(failure(&e.to_string()))
        }
    }
}
