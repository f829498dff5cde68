//! OAuth code-to-credential chain
//!
//! Runs strictly in order and stops at the first failure: code exchange,
//! long-lived exchange, target resolution, then a single credential write.
//! Nothing is persisted unless every remote step succeeded.

use base64::Engine;
use rand::Rng;
use std::sync::Arc;

use crate::clock::Clock;
use crate::constants::{MAX_TOKEN_LIFETIME_SECS, OAUTH_STATE_BYTES};
use crate::domain::{Platform, PlatformCredential};
use crate::error::PublishError;
use crate::platform::{PlatformAdapter, Platforms};
use crate::store::ContentStore;

#[derive(Clone)]
pub struct TokenExchange {
    store: Arc<dyn ContentStore>,
    platforms: Platforms,
    clock: Arc<dyn Clock>,
}

/// Generate random state for CSRF protection
fn generate_state() -> String {
    let bytes: [u8; OAUTH_STATE_BYTES] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

impl TokenExchange {
    pub fn new(store: Arc<dyn ContentStore>, platforms: Platforms, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            platforms,
            clock,
        }
    }

    fn adapter(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>, PublishError> {
        self.platforms
            .get(platform)
            .ok_or(PublishError::PlatformNotConfigured(platform))
    }

    /// Remember a fresh state for the account and return the authorize URL
    pub async fn start(&self, platform: Platform, account_id: i64) -> Result<String, PublishError> {
        let adapter = self.adapter(platform)?;
        let state = generate_state();
        self.store.save_oauth_state(&state, account_id, platform).await?;

        tracing::info!(account_id, %platform, "Issued OAuth authorize URL");
        Ok(adapter.authorize_url(&state))
    }

    /// Finish the callback. Returns the account the credential was stored for.
    pub async fn complete(&self, platform: Platform, code: &str, state: &str) -> Result<i64, PublishError> {
        let adapter = self.adapter(platform)?;

        let (account_id, issued_for) = self
            .store
            .take_oauth_state(state)
            .await?
            .ok_or_else(|| PublishError::TokenExchange("unknown or expired state".to_string()))?;
        if issued_for != platform {
            return Err(PublishError::TokenExchange(format!(
                "state was issued for {issued_for}"
            )));
        }

        let short = adapter
            .exchange_code(code)
            .await
            .map_err(|e| PublishError::TokenExchange(e.reason()))?;

        let long = adapter
            .exchange_long_lived(&short)
            .await
            .map_err(|e| PublishError::TokenExchange(e.reason()))?;

        let target = adapter
            .resolve_target(&long.access_token)
            .await
            .map_err(|e| PublishError::TargetResolution(e.reason()))?
            .or(short.user_id)
            .ok_or_else(|| {
                PublishError::TargetResolution(format!("no {platform} publishing account is linked"))
            })?;

        let credential = PlatformCredential {
            access_token: long.access_token,
            platform_user_id: target,
            token_obtained_at: self.clock.now(),
            token_expires_in: long.expires_in.map(|secs| secs.clamp(0, MAX_TOKEN_LIFETIME_SECS)),
        };
        self.store.save_credential(account_id, platform, &credential).await?;

        tracing::info!(
            account_id,
            %platform,
            platform_user_id = %credential.platform_user_id,
            "Stored platform credential"
        );
        Ok(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use crate::test_support::FakePlatform;
    use chrono::Utc;

    fn exchange(store: Arc<MemoryStore>, fake: Arc<FakePlatform>) -> TokenExchange {
        TokenExchange::new(
            store,
            Platforms::new().with(fake),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    async fn issued_state(exchange: &TokenExchange, account_id: i64) -> String {
        let url = exchange.start(Platform::Instagram, account_id).await.unwrap();
        url.split("state=").nth(1).unwrap().to_string()
    }

    #[test]
    fn test_generated_states_are_distinct() {
        let a = generate_state();
        assert_eq!(a.len(), 22);
        assert_ne!(a, generate_state());
    }

    #[tokio::test]
    async fn test_full_chain_stores_credential() {
        let store = Arc::new(MemoryStore::new());
        let fake = Arc::new(FakePlatform::new(Platform::Instagram));
        let exchange = exchange(store.clone(), fake.clone());

        let state = issued_state(&exchange, 42).await;
        let account_id = exchange.complete(Platform::Instagram, "code-1", &state).await.unwrap();

        assert_eq!(account_id, 42);
        let credential = store.credential(42, Platform::Instagram).unwrap();
        assert_eq!(credential.access_token, "long-code-1");
        assert_eq!(credential.platform_user_id, "17841400");
        assert_eq!(credential.token_expires_in, Some(5_184_000));
    }

    #[tokio::test]
    async fn test_token_lifetime_is_clamped() {
        let store = Arc::new(MemoryStore::new());
        let fake = Arc::new(FakePlatform::new(Platform::Instagram).with_token_lifetime(Some(i64::MAX)));
        let exchange = exchange(store.clone(), fake);

        let state = issued_state(&exchange, 42).await;
        exchange.complete(Platform::Instagram, "code-1", &state).await.unwrap();

        let credential = store.credential(42, Platform::Instagram).unwrap();
        assert_eq!(credential.token_expires_in, Some(MAX_TOKEN_LIFETIME_SECS));
        assert!(credential.expires_at().is_some());
    }

    #[tokio::test]
    async fn test_long_lived_failure_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let fake = Arc::new(FakePlatform::new(Platform::Instagram).failing_long_lived("Session has expired"));
        let exchange = exchange(store.clone(), fake.clone());

        let state = issued_state(&exchange, 42).await;
        let err = exchange.complete(Platform::Instagram, "code-1", &state).await.unwrap_err();

        match err {
            PublishError::TokenExchange(message) => assert_eq!(message, "Session has expired"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.credential(42, Platform::Instagram).is_none());
        assert_eq!(fake.calls().resolve, 0);
    }

    #[tokio::test]
    async fn test_missing_target_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let fake = Arc::new(FakePlatform::new(Platform::Instagram).without_target());
        let exchange = exchange(store.clone(), fake);

        let state = issued_state(&exchange, 42).await;
        let err = exchange.complete(Platform::Instagram, "code-1", &state).await.unwrap_err();

        assert!(matches!(err, PublishError::TargetResolution(_)));
        assert!(store.credential(42, Platform::Instagram).is_none());
    }

    #[tokio::test]
    async fn test_unknown_state_makes_no_remote_calls() {
        let store = Arc::new(MemoryStore::new());
        let fake = Arc::new(FakePlatform::new(Platform::Instagram));
        let exchange = exchange(store, fake.clone());

        let err = exchange.complete(Platform::Instagram, "code-1", "forged").await.unwrap_err();

        assert!(matches!(err, PublishError::TokenExchange(_)));
        assert_eq!(fake.calls().exchange, 0);
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let store = Arc::new(MemoryStore::new());
        let fake = Arc::new(FakePlatform::new(Platform::Instagram));
        let exchange = exchange(store, fake.clone());

        let state = issued_state(&exchange, 42).await;
        exchange.complete(Platform::Instagram, "code-1", &state).await.unwrap();
        assert!(exchange.complete(Platform::Instagram, "code-1", &state).await.is_err());
        assert_eq!(fake.calls().exchange, 1);
    }

    #[tokio::test]
    async fn test_unconfigured_platform() {
        let store = Arc::new(MemoryStore::new());
        let fake = Arc::new(FakePlatform::new(Platform::Instagram));
        let exchange = exchange(store, fake);

        assert!(matches!(
            exchange.start(Platform::Facebook, 1).await,
            Err(PublishError::PlatformNotConfigured(Platform::Facebook))
        ));
    }
}
