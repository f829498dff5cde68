//! Scheduled social-media publishing service
//!
//! Turns approved, scheduled content items into published posts on the
//! connected platform account, and runs the OAuth exchange that connects
//! those accounts.

pub mod clock;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod platform;
pub mod publishing;
pub mod routes;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_support;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use publishing::Orchestrator;
use services::token_exchange::TokenExchange;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub token_exchange: TokenExchange,
    /// Shared secret for the trigger and authorize routes; unset rejects every request
    pub cron_secret: Option<String>,
    pub oauth_success_url: String,
    pub oauth_failure_url: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    routes::build_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
