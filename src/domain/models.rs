//! Publishing domain models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};

/// Generates `Type`/`Decode`/`Encode` for a string-backed enum column.
macro_rules! text_column {
    ($ty:ty) => {
        impl Type<Postgres> for $ty {
            fn type_info() -> PgTypeInfo {
                <String as Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                let s = <String as Decode<Postgres>>::decode(value)?;
                <$ty>::parse(&s).ok_or_else(|| format!("unknown {}: {}", stringify!($ty), s).into())
            }
        }

        impl Encode<'_, Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
                <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
            }
        }
    };
}

/// Publishing platform variant. Also the `platform` column of items and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Instagram business account reached through a Facebook page
    Facebook,
    /// Instagram professional account using Instagram Login
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

text_column!(Platform);

/// Workflow status owned by the upstream content pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    InProgress,
    Submitted,
    Approved,
    Rejected,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Submitted => "submitted",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(ItemStatus::InProgress),
            "submitted" => Some(ItemStatus::Submitted),
            "approved" => Some(ItemStatus::Approved),
            "rejected" => Some(ItemStatus::Rejected),
            _ => None,
        }
    }
}

text_column!(ItemStatus);

/// Orchestrator-side publishing state of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Pending,
    ContainerCreated,
    Published,
    Rejected,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishState::Pending => "pending",
            PublishState::ContainerCreated => "container_created",
            PublishState::Published => "published",
            PublishState::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PublishState::Pending),
            "container_created" => Some(PublishState::ContainerCreated),
            "published" => Some(PublishState::Published),
            "rejected" => Some(PublishState::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishState::Published | PublishState::Rejected)
    }
}

text_column!(PublishState);

/// A schedulable unit of media
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItem {
    pub id: i64,
    pub account_id: i64,
    pub platform: Platform,
    pub status: ItemStatus,
    pub publish_state: PublishState,
    pub scheduled_publish_time: DateTime<Utc>,
    pub caption_text: Option<String>,
    pub media_url: Option<String>,
    pub remote_container_id: Option<String>,
    pub remote_media_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_publish_time <= now
    }

    pub fn is_terminal(&self) -> bool {
        self.publish_state.is_terminal()
    }

    /// Whether a pass at `now` has work to do on this item.
    ///
    /// Mirrors the WHERE clause of `content::list_actionable_items`.
    pub fn is_actionable(&self, now: DateTime<Utc>, creation_horizon: Option<DateTime<Utc>>) -> bool {
        if self.status != ItemStatus::Approved || self.is_terminal() {
            return false;
        }
        match self.remote_container_id {
            None => creation_horizon.is_none_or(|horizon| self.scheduled_publish_time <= horizon),
            Some(_) => self.is_due(now),
        }
    }
}

/// Per-account publishing identity for one platform
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformCredential {
    pub access_token: String,
    pub platform_user_id: String,
    pub token_obtained_at: DateTime<Utc>,
    pub token_expires_in: Option<i64>,
}

impl PlatformCredential {
    /// When the long-lived token stops working, if the platform told us.
    /// A lifetime too large to represent counts as no expiry.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token_expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.token_obtained_at.checked_add_signed(lifetime))
    }
}
