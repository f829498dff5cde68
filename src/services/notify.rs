//! Owner notifications for terminal publishing outcomes
//!
//! Delivery is fire-and-forget: `notify` never blocks the caller and a failed
//! delivery is only logged.

use reqwest::Client;
use serde::Serialize;

use crate::domain::Platform;

#[derive(Debug, Clone, Serialize)]
pub struct PublishEvent {
    pub item_id: i64,
    pub account_id: i64,
    pub platform: Platform,
    #[serde(flatten)]
    pub kind: PublishEventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PublishEventKind {
    Published { remote_media_id: String },
    Rejected { reason: String },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: PublishEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, event: PublishEvent) {
        tracing::debug!(item_id = event.item_id, "No notifier configured; dropping event");
    }
}

/// POSTs each event as JSON to a configured URL
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(http: Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: PublishEvent) {
        let http = self.http.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            let result = http
                .post(&url)
                .json(&event)
                .send()
                .await
                .and_then(|resp| resp.error_for_status());

            if let Err(e) = result {
                tracing::warn!(item_id = event.item_id, error = %e, "Failed to deliver publish notification");
            }
        });
    }
}
