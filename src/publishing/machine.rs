//! Per-item publish state machine
//!
//! One call to [`ItemPublisher::process`] moves an item as far as it can go in
//! a single pass:
//!
//! ```text
//! pending            -> rejected            missing token, target, caption or media
//! pending            -> container_created   container call succeeded
//! container_created  -> (unchanged)         not yet due
//! container_created  -> published           due, status FINISHED, publish succeeded
//! container_created  -> published           due, status PUBLISHED (earlier pass lost its write)
//! container_created  -> rejected            due, processing error or polling budget spent
//! ```
//!
//! Item failures are settled here and never escape into the batch.

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::polling::{Readiness, await_ready};
use super::recorder::OutcomeRecorder;
use crate::clock::Clock;
use crate::domain::{ContentItem, ItemStatus, PlatformCredential};
use crate::error::PublishError;
use crate::platform::{ContainerRequest, MediaKind, PlatformAdapter, PlatformError, Platforms};
use crate::store::ContentStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    ContainerCreated { container_id: String },
    Published { remote_media_id: String },
    /// Nothing decided this pass; a later pass picks the item up again
    Waiting { detail: String },
    Rejected { reason: String },
    Skipped { detail: String },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub item_id: i64,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Clone)]
pub struct ItemPublisher {
    store: Arc<dyn ContentStore>,
    platforms: Platforms,
    recorder: OutcomeRecorder,
    clock: Arc<dyn Clock>,
}

/// Caption and media URL, or the reason the item cannot be sent
fn content_of(item: &ContentItem) -> Result<(&str, &str), PublishError> {
    let caption = item
        .caption_text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PublishError::CredentialMissing("Missing caption".to_string()))?;
    let media_url = item
        .media_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PublishError::CredentialMissing("Missing media URL".to_string()))?;
    Ok((caption, media_url))
}

fn container_error(e: PlatformError) -> PublishError {
    if e.is_transport() {
        PublishError::Unavailable(e.to_string())
    } else {
        PublishError::ContainerCreation(e.reason())
    }
}

impl ItemPublisher {
    pub fn new(
        store: Arc<dyn ContentStore>,
        platforms: Platforms,
        recorder: OutcomeRecorder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            platforms,
            recorder,
            clock,
        }
    }

    pub async fn process(&self, item: &ContentItem, cancel: &CancellationToken) -> ItemOutcome {
        // The selector's copy may be stale by the time this task runs
        let current = match self.store.get_item(item.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                return ItemOutcome::Skipped {
                    detail: "item no longer exists".to_string(),
                };
            }
            Err(e) => {
                tracing::error!(item_id = item.id, error = %e, "Failed to load item");
                return ItemOutcome::Error { message: e.to_string() };
            }
        };

        if current.is_terminal() {
            return ItemOutcome::Skipped {
                detail: format!("already {}", current.publish_state.as_str()),
            };
        }
        if current.status != ItemStatus::Approved {
            return ItemOutcome::Skipped {
                detail: format!("item is {}", current.status.as_str()),
            };
        }

        match self.advance(&current, cancel).await {
            Ok(outcome) => outcome,
            Err(e) if e.rejects_item() => self.reject(&current, &e.to_string()).await,
            Err(e) => {
                tracing::warn!(item_id = current.id, error = %e, "Item left for a later pass");
                ItemOutcome::Error { message: e.to_string() }
            }
        }
    }

    async fn reject(&self, item: &ContentItem, reason: &str) -> ItemOutcome {
        match self.recorder.record_rejected(item, reason).await {
            Ok(true) => ItemOutcome::Rejected {
                reason: reason.to_string(),
            },
            Ok(false) => ItemOutcome::Skipped {
                detail: "item already reached a final state".to_string(),
            },
            Err(e) => {
                tracing::error!(item_id = item.id, error = %e, "Failed to record rejection");
                ItemOutcome::Error { message: e.to_string() }
            }
        }
    }

    /// Token and target the item will be published with
    async fn usable_credential(&self, item: &ContentItem) -> Result<PlatformCredential, PublishError> {
        let platform = item.platform;
        let credential = self
            .store
            .get_credential(item.account_id, platform)
            .await?
            .ok_or_else(|| {
                PublishError::CredentialMissing(format!("Missing {platform} credentials for account"))
            })?;

        if credential.access_token.is_empty() {
            return Err(PublishError::CredentialMissing(format!(
                "Missing {platform} access token"
            )));
        }
        if credential.platform_user_id.is_empty() {
            return Err(PublishError::CredentialMissing(format!(
                "Missing {platform} account id"
            )));
        }
        if credential.expires_at().is_some_and(|at| at <= self.clock.now()) {
            return Err(PublishError::CredentialMissing(format!(
                "{platform} credentials expired; reconnect the account"
            )));
        }
        Ok(credential)
    }

    async fn advance(&self, item: &ContentItem, cancel: &CancellationToken) -> Result<ItemOutcome, PublishError> {
        let adapter = self
            .platforms
            .get(item.platform)
            .ok_or(PublishError::PlatformNotConfigured(item.platform))?;
        let credential = self.usable_credential(item).await?;

        let container_id = match &item.remote_container_id {
            Some(container_id) => container_id.clone(),
            None => {
                let container_id = self.create_container(adapter.as_ref(), item, &credential, cancel).await?;
                if !self.recorder.record_container_created(item, &container_id).await? {
                    return Ok(ItemOutcome::Waiting {
                        detail: "container recorded by a concurrent pass".to_string(),
                    });
                }
                if !item.is_due(self.clock.now()) {
                    return Ok(ItemOutcome::ContainerCreated { container_id });
                }
                container_id
            }
        };

        if !item.is_due(self.clock.now()) {
            return Ok(ItemOutcome::Waiting {
                detail: format!("scheduled for {}", item.scheduled_publish_time.to_rfc3339()),
            });
        }

        let access_token = credential.access_token.as_str();
        let readiness = await_ready(&adapter.poll_policy(), self.clock.as_ref(), cancel, || {
            adapter.container_status(&container_id, access_token)
        })
        .await?;

        let remote_media_id = match readiness {
            Readiness::AlreadyPublished { attempts } => {
                // The status endpoint does not return the media id; the container id stands in for it
                tracing::warn!(
                    item_id = item.id,
                    attempts,
                    container_id = %container_id,
                    "Container already published; recording it"
                );
                container_id.clone()
            }
            Readiness::Finished { attempts } => {
                tracing::debug!(item_id = item.id, attempts, "Container ready");

                // The publish call itself is never abandoned midway
                if cancel.is_cancelled() {
                    return Err(PublishError::Cancelled);
                }
                adapter
                    .publish(&credential.platform_user_id, &container_id, access_token)
                    .await
                    .map_err(|e| PublishError::Publish(e.reason()))?
            }
        };

        if !self.recorder.record_published(item, &remote_media_id).await? {
            tracing::warn!(item_id = item.id, remote_media_id = %remote_media_id, "Published, but item was already final");
        }
        Ok(ItemOutcome::Published { remote_media_id })
    }

    async fn create_container(
        &self,
        adapter: &dyn PlatformAdapter,
        item: &ContentItem,
        credential: &PlatformCredential,
        cancel: &CancellationToken,
    ) -> Result<String, PublishError> {
        let (caption, media_url) = content_of(item)?;
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }

        let request = ContainerRequest {
            target_id: &credential.platform_user_id,
            access_token: &credential.access_token,
            caption,
            media_url,
            media_kind: MediaKind::from_url(media_url),
        };
        adapter.create_container(&request).await.map_err(container_error)
    }
}
