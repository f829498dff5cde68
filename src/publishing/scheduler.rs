//! In-process periodic trigger

use std::time::Duration;

use super::orchestrator::Orchestrator;

/// Run a publish pass every `interval`. Never returns.
pub async fn start_background_scheduler(orchestrator: Orchestrator, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    tracing::info!(interval_secs = interval.as_secs(), "Publish scheduler started");

    loop {
        ticker.tick().await;

        match orchestrator.run_pass().await {
            Ok(report) if report.is_empty() => {}
            Ok(report) => {
                tracing::info!(items = report.results.len(), "[scheduler] Publish pass complete");
            }
            Err(e) => {
                tracing::error!(error = %e, "[scheduler] Publish pass failed");
            }
        }
    }
}
