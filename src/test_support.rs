//! Shared fixtures for unit tests

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::AppState;
use crate::clock::ManualClock;
use crate::config::PublishSettings;
use crate::domain::{ContentItem, ItemStatus, Platform, PlatformCredential, PublishState};
use crate::platform::{
    ContainerRequest, ContainerStatus, LongLivedToken, PlatformAdapter, PlatformError, Platforms,
    ShortLivedToken,
};
use crate::publishing::Orchestrator;
use crate::publishing::polling::PollPolicy;
use crate::services::notify::NullNotifier;
use crate::services::token_exchange::TokenExchange;
use crate::store::{ContentStore, MemoryStore};

pub const TARGET_ID: &str = "17841400";

/// Approved Instagram item owned by account `id`, ready for container creation
pub fn approved_item(id: i64, scheduled: DateTime<Utc>) -> ContentItem {
    ContentItem {
        id,
        account_id: id,
        platform: Platform::Instagram,
        status: ItemStatus::Approved,
        publish_state: PublishState::Pending,
        scheduled_publish_time: scheduled,
        caption_text: Some(format!("caption for item {id}")),
        media_url: Some(format!("https://cdn.example.com/renders/{id}.mp4")),
        remote_container_id: None,
        remote_media_id: None,
        rejection_reason: None,
        published_at: None,
    }
}

pub fn credential(access_token: &str) -> PlatformCredential {
    PlatformCredential {
        access_token: access_token.to_string(),
        platform_user_id: TARGET_ID.to_string(),
        token_obtained_at: Utc::now(),
        token_expires_in: None,
    }
}

/// Access token the store hands out for an account
pub fn token_for(account_id: i64) -> String {
    format!("token-{account_id}")
}

/// Store holding `items`, with a credential for every item's account
pub async fn store_with(items: Vec<ContentItem>) -> MemoryStore {
    let store = MemoryStore::new();
    for item in items {
        store
            .save_credential(item.account_id, item.platform, &credential(&token_for(item.account_id)))
            .await
            .unwrap();
        store.insert_item(item);
    }
    store
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeCalls {
    pub exchange: u32,
    pub long_lived: u32,
    pub resolve: u32,
    pub create: u32,
    pub status: u32,
    pub publish: u32,
}

struct FakeState {
    calls: FakeCalls,
    statuses: VecDeque<ContainerStatus>,
    default_status: ContainerStatus,
    create_error: Option<String>,
    publish_error: Option<String>,
    exchange_error: Option<String>,
    long_lived_error: Option<String>,
    target: Option<String>,
    token_lifetime: Option<i64>,
    panic_on_token: Option<String>,
    status_delay: Option<Duration>,
}

/// Scripted platform adapter that records every call
pub struct FakePlatform {
    platform: Platform,
    policy: PollPolicy,
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            policy: PollPolicy {
                max_attempts: 5,
                interval: Duration::from_secs(5),
            },
            state: Mutex::new(FakeState {
                calls: FakeCalls::default(),
                statuses: VecDeque::new(),
                default_status: ContainerStatus::Finished,
                create_error: None,
                publish_error: None,
                exchange_error: None,
                long_lived_error: None,
                target: Some(TARGET_ID.to_string()),
                token_lifetime: Some(5_184_000),
                panic_on_token: None,
                status_delay: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Statuses returned in order, then `always` (FINISHED unless overridden)
    pub fn with_statuses(self, statuses: Vec<ContainerStatus>) -> Self {
        self.state().statuses = statuses.into();
        self
    }

    pub fn always(self, status: ContainerStatus) -> Self {
        self.state().default_status = status;
        self
    }

    pub fn failing_create(self, message: &str) -> Self {
        self.state().create_error = Some(message.to_string());
        self
    }

    pub fn failing_publish(self, message: &str) -> Self {
        self.state().publish_error = Some(message.to_string());
        self
    }

    pub fn failing_exchange(self, message: &str) -> Self {
        self.state().exchange_error = Some(message.to_string());
        self
    }

    pub fn failing_long_lived(self, message: &str) -> Self {
        self.state().long_lived_error = Some(message.to_string());
        self
    }

    pub fn without_target(self) -> Self {
        self.state().target = None;
        self
    }

    pub fn with_token_lifetime(self, expires_in: Option<i64>) -> Self {
        self.state().token_lifetime = expires_in;
        self
    }

    /// Hold every status check on the tokio timer for `delay` before answering
    pub fn stalling_status(self, delay: Duration) -> Self {
        self.state().status_delay = Some(delay);
        self
    }

    /// Panic inside `create_container` when called with this token
    pub fn panic_on_token(self, access_token: &str) -> Self {
        self.state().panic_on_token = Some(access_token.to_string());
        self
    }

    pub fn calls(&self) -> FakeCalls {
        self.state().calls
    }
}

fn api_error(message: &str) -> PlatformError {
    PlatformError::Api {
        status: 400,
        message: message.to_string(),
    }
}

#[async_trait]
impl PlatformAdapter for FakePlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://auth.example.com/{}/authorize?state={state}", self.platform)
    }

    async fn exchange_code(&self, code: &str) -> Result<ShortLivedToken, PlatformError> {
        let mut state = self.state();
        state.calls.exchange += 1;
        if let Some(message) = &state.exchange_error {
            return Err(api_error(message));
        }
        Ok(ShortLivedToken {
            access_token: format!("short-{code}"),
            user_id: None,
        })
    }

    async fn exchange_long_lived(&self, short: &ShortLivedToken) -> Result<LongLivedToken, PlatformError> {
        let mut state = self.state();
        state.calls.long_lived += 1;
        if let Some(message) = &state.long_lived_error {
            return Err(api_error(message));
        }
        Ok(LongLivedToken {
            access_token: short.access_token.replacen("short-", "long-", 1),
            expires_in: state.token_lifetime,
        })
    }

    async fn resolve_target(&self, _access_token: &str) -> Result<Option<String>, PlatformError> {
        let mut state = self.state();
        state.calls.resolve += 1;
        Ok(state.target.clone())
    }

    async fn create_container(&self, request: &ContainerRequest<'_>) -> Result<String, PlatformError> {
        let mut state = self.state();
        state.calls.create += 1;
        if state.panic_on_token.as_deref() == Some(request.access_token) {
            drop(state);
            panic!("scripted panic for {}", request.access_token);
        }
        if let Some(message) = &state.create_error {
            return Err(api_error(message));
        }
        Ok(format!("container-{}-{}", request.access_token, state.calls.create))
    }

    async fn container_status(
        &self,
        _container_id: &str,
        _access_token: &str,
    ) -> Result<ContainerStatus, PlatformError> {
        let delay = {
            let mut state = self.state();
            state.calls.status += 1;
            state.status_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        let next = state.statuses.pop_front();
        Ok(next.unwrap_or_else(|| state.default_status.clone()))
    }

    async fn publish(
        &self,
        _target_id: &str,
        container_id: &str,
        _access_token: &str,
    ) -> Result<String, PlatformError> {
        let mut state = self.state();
        state.calls.publish += 1;
        if let Some(message) = &state.publish_error {
            return Err(api_error(message));
        }
        Ok(format!("media-{container_id}"))
    }
}

/// Router over an in-memory store and one fake platform
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub fake: Arc<FakePlatform>,
    state: Arc<AppState>,
}

impl TestApp {
    pub const SECRET: &'static str = "cron-secret";

    pub fn new(store: MemoryStore, fake: FakePlatform) -> Self {
        let store = Arc::new(store);
        let fake = Arc::new(fake);
        let platforms = Platforms::new().with(fake.clone());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let state = Arc::new(AppState {
            orchestrator: Orchestrator::new(
                store.clone(),
                platforms.clone(),
                Arc::new(NullNotifier),
                clock.clone(),
                PublishSettings::default(),
            ),
            token_exchange: TokenExchange::new(store.clone(), platforms, clock),
            cron_secret: Some(Self::SECRET.to_string()),
            oauth_success_url: "https://app.example.com/connected".to_string(),
            oauth_failure_url: "https://app.example.com/failed".to_string(),
        });

        Self { store, fake, state }
    }

    pub fn router(&self) -> Router {
        crate::build_router(self.state.clone())
    }
}
