use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use publisher::clock::{Clock, SystemClock};
use publisher::config::Config;
use publisher::constants::HTTP_TIMEOUT_SECS;
use publisher::publishing::Orchestrator;
use publisher::publishing::scheduler::start_background_scheduler;
use publisher::services::notify::{Notifier, NullNotifier, WebhookNotifier};
use publisher::services::token_exchange::TokenExchange;
use publisher::store::{ContentStore, PgStore};
use publisher::{AppState, build_router, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env().context("Invalid configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")?;

    let platforms = config.platforms(&http);
    if platforms.configured().is_empty() {
        tracing::warn!("No platform app credentials configured; every item will fail until one is");
    }
    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set; the publish trigger will reject every request");
    }

    let store: Arc<dyn ContentStore> = Arc::new(PgStore::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(http.clone(), url)),
        None => Arc::new(NullNotifier),
    };

    let orchestrator = Orchestrator::new(
        store.clone(),
        platforms.clone(),
        notifier,
        clock.clone(),
        config.publish,
    );

    if let Some(interval) = config.publish_interval {
        tokio::spawn(start_background_scheduler(orchestrator.clone(), interval));
    }

    let state = Arc::new(AppState {
        orchestrator,
        token_exchange: TokenExchange::new(store, platforms.clone(), clock),
        cron_secret: config.cron_secret.clone(),
        oauth_success_url: config.oauth_success_url.clone(),
        oauth_failure_url: config.oauth_failure_url.clone(),
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!(
        %addr,
        platforms = ?platforms.configured(),
        "Listening"
    );
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server failed")?;

    Ok(())
}
