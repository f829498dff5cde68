//! Instagram business accounts linked to a Facebook page (Facebook Login)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::graph::{self, GraphClient, IdResponse};
use super::{
    AppCredentials, ContainerRequest, ContainerStatus, LongLivedToken, PlatformAdapter,
    PlatformError, ShortLivedToken, percent_encode,
};
use crate::constants::DEFAULT_GRAPH_API_VERSION;
use crate::domain::Platform;
use crate::publishing::polling::PollPolicy;

const SCOPES: &[&str] = &[
    "instagram_basic",
    "instagram_content_publish",
    "pages_show_list",
    "pages_read_engagement",
];

#[derive(Debug, Clone)]
pub struct FacebookEndpoints {
    pub graph_base: String,
    pub dialog_base: String,
    pub version: String,
}

impl Default for FacebookEndpoints {
    fn default() -> Self {
        Self {
            graph_base: "https://graph.facebook.com".to_string(),
            dialog_base: "https://www.facebook.com".to_string(),
            version: DEFAULT_GRAPH_API_VERSION.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct FacebookAdapter {
    app: AppCredentials,
    graph: GraphClient,
    dialog_base: String,
    version: String,
    policy: PollPolicy,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PageList {
    #[serde(default)]
    data: Vec<IdResponse>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    instagram_business_account: Option<IdResponse>,
}

impl FacebookAdapter {
    pub fn new(http: Client, app: AppCredentials, endpoints: FacebookEndpoints, policy: PollPolicy) -> Self {
        let graph = GraphClient::new(
            http,
            &endpoints.graph_base,
            &endpoints.version,
            Some(&app.client_secret),
        );
        Self {
            app,
            graph,
            dialog_base: endpoints.dialog_base.trim_end_matches('/').to_string(),
            version: endpoints.version,
            policy,
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse, PlatformError> {
        let request = self
            .graph
            .http()
            .get(self.graph.url("oauth/access_token"))
            .query(params);
        graph::send(request).await
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/{}/dialog/oauth?client_id={}&redirect_uri={}&state={}&response_type=code&scope={}",
            self.dialog_base,
            self.version,
            percent_encode(self.app.client_id.as_str()),
            percent_encode(self.app.redirect_uri.as_str()),
            percent_encode(state),
            SCOPES.join(","),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ShortLivedToken, PlatformError> {
        let token = self
            .token_request(&[
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("code", code),
            ])
            .await?;

        Ok(ShortLivedToken {
            access_token: token.access_token,
            user_id: None,
        })
    }

    async fn exchange_long_lived(&self, short: &ShortLivedToken) -> Result<LongLivedToken, PlatformError> {
        let token = self
            .token_request(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("fb_exchange_token", short.access_token.as_str()),
            ])
            .await?;

        Ok(LongLivedToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }

    /// Walk the user's pages and take the first one with a linked Instagram account
    async fn resolve_target(&self, access_token: &str) -> Result<Option<String>, PlatformError> {
        let pages: PageList = self
            .graph
            .get("me/accounts", access_token, &[("fields", "id,name")])
            .await?;

        for page in pages.data {
            let linked: PageResponse = self
                .graph
                .get(&page.id, access_token, &[("fields", "instagram_business_account")])
                .await?;
            if let Some(account) = linked.instagram_business_account {
                return Ok(Some(account.id));
            }
            tracing::debug!(page_id = %page.id, "Page has no linked Instagram business account");
        }

        Ok(None)
    }

    async fn create_container(&self, request: &ContainerRequest<'_>) -> Result<String, PlatformError> {
        self.graph.create_container(request).await
    }

    async fn container_status(
        &self,
        container_id: &str,
        access_token: &str,
    ) -> Result<ContainerStatus, PlatformError> {
        self.graph.container_status(container_id, access_token).await
    }

    async fn publish(
        &self,
        target_id: &str,
        container_id: &str,
        access_token: &str,
    ) -> Result<String, PlatformError> {
        self.graph.publish(target_id, container_id, access_token).await
    }
}
