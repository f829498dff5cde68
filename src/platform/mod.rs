//! Platform adapters
//!
//! The publishing engine is written once against [`PlatformAdapter`]. Each
//! supported platform variant supplies its own OAuth endpoints, target
//! resolution and polling policy, while container/status/publish calls share
//! the Graph client.

pub mod facebook;
pub mod graph;
pub mod instagram;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::Platform;
use crate::publishing::polling::PollPolicy;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("platform API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected platform response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        // URLs carry access tokens in the query string
        PlatformError::Http(e.without_url())
    }
}

impl PlatformError {
    /// Network-level failure where the platform never answered
    pub fn is_transport(&self) -> bool {
        matches!(self, PlatformError::Http(_))
    }

    /// Failures worth another status check: no answer, or a server-side error
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Http(_) => true,
            PlatformError::Api { status, .. } => *status >= 500,
            PlatformError::Decode(_) => false,
        }
    }

    /// Message suitable for storing on a rejected item
    pub fn reason(&self) -> String {
        match self {
            PlatformError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Processing state reported for a media container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Finished,
    InProgress,
    Error(String),
    Expired,
    Published,
    Unknown(String),
}

impl ContainerStatus {
    pub fn from_code(code: &str, detail: Option<String>) -> Self {
        match code {
            "FINISHED" => ContainerStatus::Finished,
            "IN_PROGRESS" => ContainerStatus::InProgress,
            "ERROR" => ContainerStatus::Error(detail.unwrap_or_else(|| "media processing failed".to_string())),
            "EXPIRED" => ContainerStatus::Expired,
            "PUBLISHED" => ContainerStatus::Published,
            other => ContainerStatus::Unknown(other.to_string()),
        }
    }
}

/// What kind of media the container declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Reels,
    Image,
}

impl MediaKind {
    /// Guess from the asset URL; anything that is not a still image goes out as a reel
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if [".jpg", ".jpeg", ".png"].iter().any(|ext| path.ends_with(ext)) {
            MediaKind::Image
        } else {
            MediaKind::Reels
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Reels => "REELS",
            MediaKind::Image => "IMAGE",
        }
    }

    pub fn url_field(&self) -> &'static str {
        match self {
            MediaKind::Reels => "video_url",
            MediaKind::Image => "image_url",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContainerRequest<'a> {
    pub target_id: &'a str,
    pub access_token: &'a str,
    pub caption: &'a str,
    pub media_url: &'a str,
    pub media_kind: MediaKind,
}

#[derive(Debug, Clone)]
pub struct ShortLivedToken {
    pub access_token: String,
    /// Some platforms identify the user in the code exchange response
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LongLivedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

/// OAuth app registration for one platform
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    fn poll_policy(&self) -> PollPolicy;

    /// URL the account owner is sent to in order to grant access
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ShortLivedToken, PlatformError>;

    async fn exchange_long_lived(&self, short: &ShortLivedToken) -> Result<LongLivedToken, PlatformError>;

    /// Publishing-target id for the token, `None` if the account has no eligible target
    async fn resolve_target(&self, access_token: &str) -> Result<Option<String>, PlatformError>;

    async fn create_container(&self, request: &ContainerRequest<'_>) -> Result<String, PlatformError>;

    async fn container_status(
        &self,
        container_id: &str,
        access_token: &str,
    ) -> Result<ContainerStatus, PlatformError>;

    /// Publish a finished container, returning the remote media id
    async fn publish(
        &self,
        target_id: &str,
        container_id: &str,
        access_token: &str,
    ) -> Result<String, PlatformError>;
}

/// Configured adapters keyed by platform
#[derive(Clone, Default)]
pub struct Platforms {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl Platforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    pub fn configured(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.adapters.keys().copied().collect();
        platforms.sort_by_key(|p| p.as_str());
        platforms
    }
}

pub(crate) fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_url() {
        assert_eq!(MediaKind::from_url("https://cdn.example.com/a.mp4"), MediaKind::Reels);
        assert_eq!(MediaKind::from_url("https://cdn.example.com/a.JPG?sig=1"), MediaKind::Image);
        assert_eq!(MediaKind::from_url("https://cdn.example.com/render"), MediaKind::Reels);
    }

    #[test]
    fn test_container_status_from_code() {
        assert_eq!(ContainerStatus::from_code("FINISHED", None), ContainerStatus::Finished);
        assert_eq!(
            ContainerStatus::from_code("ERROR", None),
            ContainerStatus::Error("media processing failed".to_string())
        );
        assert_eq!(
            ContainerStatus::from_code("QUEUED", None),
            ContainerStatus::Unknown("QUEUED".to_string())
        );
    }

    #[test]
    fn test_api_error_reason_is_platform_message() {
        let err = PlatformError::Api {
            status: 400,
            message: "Media URL unreachable".to_string(),
        };
        assert_eq!(err.reason(), "Media URL unreachable");
        assert!(!err.is_transport());
    }
}
