//! Batch orchestration of one publish pass
//!
//! Selects the actionable items once, runs each through the state machine in
//! its own task (bounded by a semaphore), and collects one report entry per
//! item. A failing or panicking item task never fails the batch.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use super::machine::{ItemOutcome, ItemPublisher, ItemReport};
use super::recorder::OutcomeRecorder;
use super::selector::select_due_items;
use crate::clock::Clock;
use crate::config::PublishSettings;
use crate::error::PublishError;
use crate::platform::Platforms;
use crate::services::notify::Notifier;
use crate::store::ContentStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<ItemReport>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn count(&self, matches: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| matches(&r.outcome)).count()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn ContentStore>,
    publisher: ItemPublisher,
    clock: Arc<dyn Clock>,
    settings: PublishSettings,
    /// Passes from the cron route and the in-process scheduler never overlap
    pass_lock: Arc<Mutex<()>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        platforms: Platforms,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: PublishSettings,
    ) -> Self {
        let recorder = OutcomeRecorder::new(store.clone(), notifier);
        let publisher = ItemPublisher::new(store.clone(), platforms, recorder, clock.clone());
        Self {
            store,
            publisher,
            clock,
            settings,
            pass_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn run_pass(&self) -> Result<BatchReport, PublishError> {
        let _pass = self.pass_lock.lock().await;

        let now = self.clock.now();
        let items = select_due_items(self.store.as_ref(), now, self.settings.lookahead).await?;
        if items.is_empty() {
            tracing::debug!("No items due for publishing");
            return Ok(BatchReport::default());
        }
        tracing::info!(count = items.len(), "Starting publish pass");

        let cancel = CancellationToken::new();
        let deadline = {
            let cancel = cancel.clone();
            let budget = self.settings.deadline;
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                tracing::warn!(deadline_secs = budget.as_secs(), "Publish pass deadline reached; cancelling");
                cancel.cancel();
            })
        };

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let (item_ids, tasks): (Vec<i64>, Vec<_>) = items
            .into_iter()
            .map(|item| {
                let publisher = self.publisher.clone();
                let semaphore = semaphore.clone();
                let cancel = cancel.clone();
                let item_id = item.id;

                let task = tokio::spawn(async move {
                    let permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return ItemOutcome::Error {
                                message: PublishError::Cancelled.to_string(),
                            };
                        }
                        permit = semaphore.acquire_owned() => permit,
                    };
                    let Ok(_permit) = permit else {
                        return ItemOutcome::Error {
                            message: "worker pool closed".to_string(),
                        };
                    };
                    publisher.process(&item, &cancel).await
                });
                (item_id, task)
            })
            .unzip();

        let joined = join_all(tasks).await;
        deadline.abort();

        let results: Vec<ItemReport> = item_ids
            .into_iter()
            .zip(joined)
            .map(|(item_id, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    tracing::error!(item_id, error = %e, "Publish task failed");
                    ItemOutcome::Error {
                        message: if e.is_panic() {
                            "item task panicked".to_string()
                        } else {
                            "item task was cancelled".to_string()
                        },
                    }
                });
                ItemReport { item_id, outcome }
            })
            .collect();

        let report = BatchReport { results };
        tracing::info!(
            total = report.results.len(),
            published = report.count(|o| matches!(o, ItemOutcome::Published { .. })),
            containers = report.count(|o| matches!(o, ItemOutcome::ContainerCreated { .. })),
            rejected = report.count(|o| matches!(o, ItemOutcome::Rejected { .. })),
            errors = report.count(|o| matches!(o, ItemOutcome::Error { .. })),
            "Publish pass finished"
        );
        Ok(report)
    }
}
