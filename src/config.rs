//! Service configuration, read once from the environment at startup

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_GRAPH_API_VERSION, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS, DEFAULT_PORT,
    DEFAULT_PUBLISH_CONCURRENCY, DEFAULT_PUBLISH_DEADLINE_SECS,
};
use crate::platform::facebook::{FacebookAdapter, FacebookEndpoints};
use crate::platform::instagram::{InstagramAdapter, InstagramEndpoints};
use crate::platform::{AppCredentials, Platforms};
use crate::publishing::polling::PollPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{0}_APP_ID, {0}_APP_SECRET and {0}_REDIRECT_URI must be set together")]
    Incomplete(&'static str),
}

/// Knobs for one publish pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSettings {
    /// Item tasks running at once
    pub concurrency: usize,
    /// Wall-clock budget for the whole pass
    pub deadline: Duration,
    /// Only create containers for items scheduled within this window
    pub lookahead: Option<chrono::Duration>,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_PUBLISH_CONCURRENCY,
            deadline: Duration::from_secs(DEFAULT_PUBLISH_DEADLINE_SECS),
            lookahead: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cron_secret: Option<String>,
    pub facebook: Option<AppCredentials>,
    pub instagram: Option<AppCredentials>,
    pub oauth_success_url: String,
    pub oauth_failure_url: String,
    pub publish: PublishSettings,
    pub poll: PollPolicy,
    /// Run passes in-process on this interval, in addition to the cron route
    pub publish_interval: Option<Duration>,
    pub notify_webhook_url: Option<String>,
    pub graph_api_version: String,
}

fn parse<T: std::str::FromStr>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| v.trim().parse::<T>().map_err(|_| ConfigError::Invalid { name, value: v }))
        .transpose()
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let app = |prefix: &'static str| -> Result<Option<AppCredentials>, ConfigError> {
            let parts = (
                var(&format!("{prefix}_APP_ID")),
                var(&format!("{prefix}_APP_SECRET")),
                var(&format!("{prefix}_REDIRECT_URI")),
            );
            match parts {
                (Some(client_id), Some(client_secret), Some(redirect_uri)) => Ok(Some(AppCredentials {
                    client_id,
                    client_secret,
                    redirect_uri,
                })),
                (None, None, None) => Ok(None),
                _ => Err(ConfigError::Incomplete(prefix)),
            }
        };

        let concurrency: usize =
            parse("PUBLISH_CONCURRENCY", var("PUBLISH_CONCURRENCY"))?.unwrap_or(DEFAULT_PUBLISH_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "PUBLISH_CONCURRENCY",
                value: "0".to_string(),
            });
        }
        let max_attempts: u32 =
            parse("POLL_MAX_ATTEMPTS", var("POLL_MAX_ATTEMPTS"))?.unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            port: parse("PORT", var("PORT"))?.unwrap_or(DEFAULT_PORT),
            cron_secret: var("CRON_SECRET"),
            facebook: app("FACEBOOK")?,
            instagram: app("INSTAGRAM")?,
            oauth_success_url: var("OAUTH_SUCCESS_URL").unwrap_or_else(|| "/".to_string()),
            oauth_failure_url: var("OAUTH_FAILURE_URL").unwrap_or_else(|| "/".to_string()),
            publish: PublishSettings {
                concurrency,
                deadline: Duration::from_secs(
                    parse("PUBLISH_DEADLINE_SECS", var("PUBLISH_DEADLINE_SECS"))?
                        .unwrap_or(DEFAULT_PUBLISH_DEADLINE_SECS),
                ),
                lookahead: parse::<i64>("PUBLISH_LOOKAHEAD_MINUTES", var("PUBLISH_LOOKAHEAD_MINUTES"))?
                    .map(chrono::Duration::minutes),
            },
            poll: PollPolicy {
                max_attempts,
                interval: Duration::from_secs(
                    parse("POLL_INTERVAL_SECS", var("POLL_INTERVAL_SECS"))?.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
                ),
            },
            publish_interval: parse::<u64>("PUBLISH_INTERVAL_SECS", var("PUBLISH_INTERVAL_SECS"))?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            notify_webhook_url: var("NOTIFY_WEBHOOK_URL"),
            graph_api_version: var("GRAPH_API_VERSION").unwrap_or_else(|| DEFAULT_GRAPH_API_VERSION.to_string()),
        })
    }

    /// Adapters for every platform whose app credentials are configured
    pub fn platforms(&self, http: &Client) -> Platforms {
        let mut platforms = Platforms::new();

        if let Some(app) = &self.facebook {
            let endpoints = FacebookEndpoints {
                version: self.graph_api_version.clone(),
                ..FacebookEndpoints::default()
            };
            platforms.register(Arc::new(FacebookAdapter::new(http.clone(), app.clone(), endpoints, self.poll)));
        }
        if let Some(app) = &self.instagram {
            let endpoints = InstagramEndpoints {
                version: self.graph_api_version.clone(),
                ..InstagramEndpoints::default()
            };
            platforms.register(Arc::new(InstagramAdapter::new(http.clone(), app.clone(), endpoints, self.poll)));
        }

        platforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/publisher")]).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.publish, PublishSettings::default());
        assert_eq!(config.poll, PollPolicy::default());
        assert!(config.cron_secret.is_none());
        assert!(config.publish_interval.is_none());
        assert!(config.platforms(&Client::new()).configured().is_empty());
    }

    #[test]
    fn test_database_url_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_only_configured_platforms_registered() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/publisher"),
            ("INSTAGRAM_APP_ID", "ig-app"),
            ("INSTAGRAM_APP_SECRET", "ig-secret"),
            ("INSTAGRAM_REDIRECT_URI", "https://publisher.example.com/oauth/instagram/callback"),
        ])
        .unwrap();

        assert_eq!(config.platforms(&Client::new()).configured(), vec![Platform::Instagram]);
    }

    #[test]
    fn test_partial_app_credentials_rejected() {
        let result = config(&[
            ("DATABASE_URL", "postgres://localhost/publisher"),
            ("FACEBOOK_APP_ID", "fb-app"),
        ]);
        assert!(matches!(result, Err(ConfigError::Incomplete("FACEBOOK"))));
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let overridden = config(&[
            ("DATABASE_URL", "postgres://localhost/publisher"),
            ("POLL_MAX_ATTEMPTS", "8"),
            ("POLL_INTERVAL_SECS", "2"),
            ("PUBLISH_LOOKAHEAD_MINUTES", "90"),
            ("PUBLISH_INTERVAL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(overridden.poll.max_attempts, 8);
        assert_eq!(overridden.poll.interval, Duration::from_secs(2));
        assert_eq!(overridden.publish.lookahead, Some(chrono::Duration::minutes(90)));
        assert_eq!(overridden.publish_interval, Some(Duration::from_secs(60)));

        let err = config(&[("DATABASE_URL", "postgres://x"), ("PUBLISH_CONCURRENCY", "many")]);
        assert!(matches!(err, Err(ConfigError::Invalid { name: "PUBLISH_CONCURRENCY", .. })));
    }
}
