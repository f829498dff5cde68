//! In-process store with the same conditional-write semantics as Postgres

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ContentStore, StoreResult};
use crate::domain::{ContentItem, ItemStatus, Platform, PlatformCredential, PublishState};

const OAUTH_STATE_TTL_MINUTES: i64 = 10;

#[derive(Default)]
struct Tables {
    items: HashMap<i64, ContentItem>,
    credentials: HashMap<(i64, Platform), PlatformCredential>,
    oauth_states: HashMap<String, (i64, Platform, DateTime<Utc>)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_item(&self, item: ContentItem) {
        self.tables().items.insert(item.id, item);
    }

    pub fn item(&self, item_id: i64) -> Option<ContentItem> {
        self.tables().items.get(&item_id).cloned()
    }

    pub fn credential(&self, account_id: i64, platform: Platform) -> Option<PlatformCredential> {
        self.tables().credentials.get(&(account_id, platform)).cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_actionable_items(
        &self,
        now: DateTime<Utc>,
        creation_horizon: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .tables()
            .items
            .values()
            .filter(|item| item.is_actionable(now, creation_horizon))
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.scheduled_publish_time, item.id));
        Ok(items)
    }

    async fn get_item(&self, item_id: i64) -> StoreResult<Option<ContentItem>> {
        Ok(self.item(item_id))
    }

    async fn get_credential(
        &self,
        account_id: i64,
        platform: Platform,
    ) -> StoreResult<Option<PlatformCredential>> {
        Ok(self.credential(account_id, platform))
    }

    async fn save_credential(
        &self,
        account_id: i64,
        platform: Platform,
        credential: &PlatformCredential,
    ) -> StoreResult<()> {
        self.tables()
            .credentials
            .insert((account_id, platform), credential.clone());
        Ok(())
    }

    async fn set_container_id(&self, item_id: i64, container_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables();
        let taken = tables
            .items
            .values()
            .any(|item| item.remote_container_id.as_deref() == Some(container_id));
        let Some(item) = tables.items.get_mut(&item_id) else {
            return Ok(false);
        };
        if taken || item.remote_container_id.is_some() || item.publish_state != PublishState::Pending {
            return Ok(false);
        }
        item.remote_container_id = Some(container_id.to_string());
        item.publish_state = PublishState::ContainerCreated;
        Ok(true)
    }

    async fn mark_published(&self, item_id: i64, remote_media_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables();
        let Some(item) = tables.items.get_mut(&item_id) else {
            return Ok(false);
        };
        if item.is_terminal() {
            return Ok(false);
        }
        item.publish_state = PublishState::Published;
        item.remote_media_id = Some(remote_media_id.to_string());
        item.published_at = Some(Utc::now());
        Ok(true)
    }

    async fn mark_rejected(&self, item_id: i64, reason: &str) -> StoreResult<bool> {
        let mut tables = self.tables();
        let Some(item) = tables.items.get_mut(&item_id) else {
            return Ok(false);
        };
        if item.is_terminal() {
            return Ok(false);
        }
        item.publish_state = PublishState::Rejected;
        item.status = ItemStatus::Rejected;
        item.rejection_reason = Some(reason.to_string());
        Ok(true)
    }

    async fn save_oauth_state(
        &self,
        state: &str,
        account_id: i64,
        platform: Platform,
    ) -> StoreResult<()> {
        self.tables()
            .oauth_states
            .insert(state.to_string(), (account_id, platform, Utc::now()));
        Ok(())
    }

    async fn take_oauth_state(&self, state: &str) -> StoreResult<Option<(i64, Platform)>> {
        let cutoff = Utc::now() - Duration::minutes(OAUTH_STATE_TTL_MINUTES);
        Ok(self
            .tables()
            .oauth_states
            .remove(state)
            .filter(|(_, _, created_at)| *created_at > cutoff)
            .map(|(account_id, platform, _)| (account_id, platform)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::approved_item;

    #[tokio::test]
    async fn test_container_id_is_set_at_most_once() {
        let store = MemoryStore::new();
        store.insert_item(approved_item(1, Utc::now()));

        assert!(store.set_container_id(1, "c-1").await.unwrap());
        assert!(!store.set_container_id(1, "c-2").await.unwrap());
        assert_eq!(store.item(1).unwrap().remote_container_id.as_deref(), Some("c-1"));
    }

    #[tokio::test]
    async fn test_container_id_never_shared_between_items() {
        let store = MemoryStore::new();
        store.insert_item(approved_item(1, Utc::now()));
        store.insert_item(approved_item(2, Utc::now()));

        assert!(store.set_container_id(1, "c-1").await.unwrap());
        assert!(!store.set_container_id(2, "c-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_transition_happens_once() {
        let store = MemoryStore::new();
        store.insert_item(approved_item(1, Utc::now()));

        assert!(store.mark_published(1, "m-1").await.unwrap());
        assert!(!store.mark_rejected(1, "late failure").await.unwrap());

        let item = store.item(1).unwrap();
        assert_eq!(item.publish_state, PublishState::Published);
        assert_eq!(item.status, ItemStatus::Approved);
        assert!(item.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_rejection_is_visible_on_item() {
        let store = MemoryStore::new();
        store.insert_item(approved_item(1, Utc::now()));

        assert!(store.mark_rejected(1, "Missing caption").await.unwrap());

        let item = store.item(1).unwrap();
        assert_eq!(item.status, ItemStatus::Rejected);
        assert_eq!(item.rejection_reason.as_deref(), Some("Missing caption"));
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let store = MemoryStore::new();
        store.save_oauth_state("abc", 7, Platform::Instagram).await.unwrap();

        assert_eq!(
            store.take_oauth_state("abc").await.unwrap(),
            Some((7, Platform::Instagram))
        );
        assert_eq!(store.take_oauth_state("abc").await.unwrap(), None);
    }
}
