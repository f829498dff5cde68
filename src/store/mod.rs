//! Persistence seam for the orchestrator
//!
//! The publishing engine only sees [`ContentStore`]. Production uses
//! [`PgStore`]; tests and local runs use [`MemoryStore`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ContentItem, Platform, PlatformCredential};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Approved, non-terminal items that need action at `now`
    async fn list_actionable_items(
        &self,
        now: DateTime<Utc>,
        creation_horizon: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<ContentItem>>;

    async fn get_item(&self, item_id: i64) -> StoreResult<Option<ContentItem>>;

    async fn get_credential(
        &self,
        account_id: i64,
        platform: Platform,
    ) -> StoreResult<Option<PlatformCredential>>;

    async fn save_credential(
        &self,
        account_id: i64,
        platform: Platform,
        credential: &PlatformCredential,
    ) -> StoreResult<()>;

    /// Returns false if the item already has a container or left `pending`
    async fn set_container_id(&self, item_id: i64, container_id: &str) -> StoreResult<bool>;

    /// Returns false if the item was already terminal
    async fn mark_published(&self, item_id: i64, remote_media_id: &str) -> StoreResult<bool>;

    /// Returns false if the item was already terminal
    async fn mark_rejected(&self, item_id: i64, reason: &str) -> StoreResult<bool>;

    async fn save_oauth_state(
        &self,
        state: &str,
        account_id: i64,
        platform: Platform,
    ) -> StoreResult<()>;

    /// Consume a state value; `None` if unknown, expired, or already used
    async fn take_oauth_state(&self, state: &str) -> StoreResult<Option<(i64, Platform)>>;
}
