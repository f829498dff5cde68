//! Orchestrator error taxonomy

use crate::domain::Platform;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("invalid or missing trigger secret")]
    Authorization,

    #[error("{0}")]
    CredentialMissing(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("no eligible publishing target: {0}")]
    TargetResolution(String),

    #[error("container creation failed: {0}")]
    ContainerCreation(String),

    #[error("media not ready, timeout exceeded after {attempts} status checks")]
    ReadinessTimeout { attempts: u32 },

    #[error("media processing failed: {0}")]
    Processing(String),

    #[error("publish failed: {0}")]
    Publish(String),

    /// Platform unreachable; nothing was decided about the item
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    #[error("no adapter configured for platform {0}")]
    PlatformNotConfigured(Platform),

    #[error("pass deadline exceeded before the item finished")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PublishError {
    /// Errors that end the item as rejected. Everything else leaves it for a later pass.
    pub fn rejects_item(&self) -> bool {
        matches!(
            self,
            PublishError::CredentialMissing(_)
                | PublishError::ContainerCreation(_)
                | PublishError::ReadinessTimeout { .. }
                | PublishError::Processing(_)
                | PublishError::Publish(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_item_failures_reject() {
        assert!(PublishError::CredentialMissing("Missing caption".into()).rejects_item());
        assert!(PublishError::ReadinessTimeout { attempts: 5 }.rejects_item());
        assert!(!PublishError::Cancelled.rejects_item());
        assert!(!PublishError::Unavailable("connection reset".into()).rejects_item());
        assert!(!PublishError::PlatformNotConfigured(Platform::Facebook).rejects_item());
    }

    #[test]
    fn test_timeout_reason_mentions_timeout() {
        let reason = PublishError::ReadinessTimeout { attempts: 5 }.to_string();
        assert!(reason.contains("timeout"));
    }
}
