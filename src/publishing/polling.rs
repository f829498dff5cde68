//! Readiness polling
//!
//! `step` is the whole policy: a pure transition from the current poll state
//! and one observation to the next state. `await_ready` is the only place that
//! holds the attempt counter, sleeps between checks and talks to the platform.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS};
use crate::error::PublishError;
use crate::platform::{ContainerStatus, PlatformError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Status checks allowed before giving up
    pub max_attempts: u32,
    /// Wait before every check after the first
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Polling { attempts: u32 },
    Ready { attempts: u32 },
    /// An earlier pass already published this container
    AlreadyPublished { attempts: u32 },
    Failed(String),
    TimedOut { attempts: u32 },
}

/// Result of one status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollObservation {
    Status(ContainerStatus),
    /// The platform could not be reached; counts as a check that did not finish
    Unreachable(String),
    /// The platform answered with an error or a response we could not read
    Invalid(String),
}

impl From<Result<ContainerStatus, PlatformError>> for PollObservation {
    fn from(result: Result<ContainerStatus, PlatformError>) -> Self {
        match result {
            Ok(status) => PollObservation::Status(status),
            Err(e) if e.is_retryable() => PollObservation::Unreachable(e.to_string()),
            Err(e) => PollObservation::Invalid(e.reason()),
        }
    }
}

pub fn step(state: PollState, observation: PollObservation, policy: &PollPolicy) -> PollState {
    let PollState::Polling { attempts } = state else {
        return state;
    };
    let attempts = attempts + 1;

    match observation {
        PollObservation::Status(ContainerStatus::Finished) => PollState::Ready { attempts },
        PollObservation::Status(ContainerStatus::Error(message)) => PollState::Failed(message),
        PollObservation::Status(ContainerStatus::Expired) => {
            PollState::Failed("media container expired before it was published".to_string())
        }
        PollObservation::Status(ContainerStatus::Published) => PollState::AlreadyPublished { attempts },
        PollObservation::Invalid(message) => PollState::Failed(message),
        PollObservation::Status(ContainerStatus::InProgress)
        | PollObservation::Status(ContainerStatus::Unknown(_))
        | PollObservation::Unreachable(_) => {
            if attempts >= policy.max_attempts.max(1) {
                PollState::TimedOut { attempts }
            } else {
                PollState::Polling { attempts }
            }
        }
    }
}

/// How polling ended for a container that needs no rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Finished { attempts: u32 },
    AlreadyPublished { attempts: u32 },
}

/// Poll until the container is ready or turns out to be published already.
pub async fn await_ready<F, Fut>(
    policy: &PollPolicy,
    clock: &dyn Clock,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<Readiness, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ContainerStatus, PlatformError>>,
{
    let mut state = PollState::Polling { attempts: 0 };

    loop {
        let attempts = match &state {
            PollState::Polling { attempts } => *attempts,
            PollState::Ready { attempts } => return Ok(Readiness::Finished { attempts: *attempts }),
            PollState::AlreadyPublished { attempts } => {
                return Ok(Readiness::AlreadyPublished { attempts: *attempts });
            }
            PollState::Failed(message) => return Err(PublishError::Processing(message.clone())),
            PollState::TimedOut { attempts } => {
                return Err(PublishError::ReadinessTimeout { attempts: *attempts });
            }
        };

        if attempts > 0 {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                _ = clock.sleep(policy.interval) => {}
            }
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            result = check() => result,
        };

        let observation = PollObservation::from(result);
        if let PollObservation::Unreachable(ref message) = observation {
            tracing::warn!(attempt = attempts + 1, error = %message, "Status check failed; counting it as not ready");
        }
        state = step(state, observation, policy);
    }
}
