//! Durable outcome writes for content items

use std::sync::Arc;

use crate::domain::ContentItem;
use crate::error::PublishError;
use crate::services::notify::{Notifier, PublishEvent, PublishEventKind};
use crate::store::ContentStore;

#[derive(Clone)]
pub struct OutcomeRecorder {
    store: Arc<dyn ContentStore>,
    notifier: Arc<dyn Notifier>,
}

impl OutcomeRecorder {
    pub fn new(store: Arc<dyn ContentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Returns false if another pass already stored a container for the item
    pub async fn record_container_created(
        &self,
        item: &ContentItem,
        container_id: &str,
    ) -> Result<bool, PublishError> {
        let stored = self.store.set_container_id(item.id, container_id).await?;
        if stored {
            tracing::info!(item_id = item.id, container_id, "Media container created");
        } else {
            tracing::warn!(item_id = item.id, container_id, "Container already recorded for item; leaving it");
        }
        Ok(stored)
    }

    pub async fn record_published(&self, item: &ContentItem, remote_media_id: &str) -> Result<bool, PublishError> {
        let stored = self.store.mark_published(item.id, remote_media_id).await?;
        if stored {
            tracing::info!(item_id = item.id, account_id = item.account_id, remote_media_id, "Item published");
            self.notifier.notify(PublishEvent {
                item_id: item.id,
                account_id: item.account_id,
                platform: item.platform,
                kind: PublishEventKind::Published {
                    remote_media_id: remote_media_id.to_string(),
                },
            });
        }
        Ok(stored)
    }

    pub async fn record_rejected(&self, item: &ContentItem, reason: &str) -> Result<bool, PublishError> {
        let stored = self.store.mark_rejected(item.id, reason).await?;
        if stored {
            tracing::warn!(item_id = item.id, account_id = item.account_id, reason, "Item rejected");
            self.notifier.notify(PublishEvent {
                item_id: item.id,
                account_id: item.account_id,
                platform: item.platform,
                kind: PublishEventKind::Rejected {
                    reason: reason.to_string(),
                },
            });
        }
        Ok(stored)
    }
}
