use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ContentStore, StoreResult};
use crate::domain::{ContentItem, Platform, PlatformCredential, content, credentials, oauth_states};

/// [`ContentStore`] backed by the shared Postgres pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn list_actionable_items(
        &self,
        now: DateTime<Utc>,
        creation_horizon: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ContentItem>> {
        Ok(content::list_actionable_items(&self.db, now, creation_horizon).await?)
    }

    async fn get_item(&self, item_id: i64) -> StoreResult<Option<ContentItem>> {
        Ok(content::get_item(&self.db, item_id).await?)
    }

    async fn get_credential(
        &self,
        account_id: i64,
        platform: Platform,
    ) -> StoreResult<Option<PlatformCredential>> {
        Ok(credentials::get_credential(&self.db, account_id, platform).await?)
    }

    async fn save_credential(
        &self,
        account_id: i64,
        platform: Platform,
        credential: &PlatformCredential,
    ) -> StoreResult<()> {
        Ok(credentials::upsert_credential(&self.db, account_id, platform, credential).await?)
    }

    async fn set_container_id(&self, item_id: i64, container_id: &str) -> StoreResult<bool> {
        Ok(content::set_container_id(&self.db, item_id, container_id).await?)
    }

    async fn mark_published(&self, item_id: i64, remote_media_id: &str) -> StoreResult<bool> {
        Ok(content::mark_published(&self.db, item_id, remote_media_id).await?)
    }

    async fn mark_rejected(&self, item_id: i64, reason: &str) -> StoreResult<bool> {
        Ok(content::mark_rejected(&self.db, item_id, reason).await?)
    }

    async fn save_oauth_state(
        &self,
        state: &str,
        account_id: i64,
        platform: Platform,
    ) -> StoreResult<()> {
        Ok(oauth_states::save_oauth_state(&self.db, state, account_id, platform).await?)
    }

    async fn take_oauth_state(&self, state: &str) -> StoreResult<Option<(i64, Platform)>> {
        Ok(oauth_states::take_oauth_state(&self.db, state).await?)
    }
}
