pub mod health;
pub mod oauth;
pub mod publish;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(oauth::routes())
        .merge(publish::routes())
}
