//! Instagram professional accounts using Instagram Login (graph.instagram.com)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::graph::{self, GraphClient};
use super::{
    AppCredentials, ContainerRequest, ContainerStatus, LongLivedToken, PlatformAdapter,
    PlatformError, ShortLivedToken, percent_encode,
};
use crate::constants::DEFAULT_GRAPH_API_VERSION;
use crate::domain::Platform;
use crate::publishing::polling::PollPolicy;

const SCOPES: &[&str] = &[
    "instagram_business_basic",
    "instagram_business_content_publish",
];

#[derive(Debug, Clone)]
pub struct InstagramEndpoints {
    pub graph_base: String,
    /// Host of the code-for-token exchange
    pub oauth_base: String,
    pub dialog_base: String,
    pub version: String,
}

impl Default for InstagramEndpoints {
    fn default() -> Self {
        Self {
            graph_base: "https://graph.instagram.com".to_string(),
            oauth_base: "https://api.instagram.com".to_string(),
            dialog_base: "https://www.instagram.com".to_string(),
            version: DEFAULT_GRAPH_API_VERSION.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct InstagramAdapter {
    app: AppCredentials,
    graph: GraphClient,
    oauth_base: String,
    dialog_base: String,
    policy: PollPolicy,
}

/// The code exchange answers either flat or wrapped in `data`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeExchangeResponse {
    Wrapped { data: Vec<ShortTokenBody> },
    Flat(ShortTokenBody),
}

#[derive(Debug, Deserialize)]
struct ShortTokenBody {
    access_token: String,
    #[serde(default)]
    user_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LongTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
}

/// Instagram returns ids as either JSON numbers or strings
fn id_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl InstagramAdapter {
    pub fn new(http: Client, app: AppCredentials, endpoints: InstagramEndpoints, policy: PollPolicy) -> Self {
        let graph = GraphClient::new(http, &endpoints.graph_base, &endpoints.version, None);
        Self {
            app,
            graph,
            oauth_base: endpoints.oauth_base.trim_end_matches('/').to_string(),
            dialog_base: endpoints.dialog_base.trim_end_matches('/').to_string(),
            policy,
        }
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/oauth/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.dialog_base,
            percent_encode(&self.app.client_id),
            percent_encode(&self.app.redirect_uri),
            SCOPES.join(","),
            percent_encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ShortLivedToken, PlatformError> {
        let params = [
            ("client_id", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.app.redirect_uri.as_str()),
            ("code", code),
        ];

        let request = self
            .graph
            .http()
            .post(format!("{}/oauth/access_token", self.oauth_base))
            .form(&params);

        let body = match graph::send::<CodeExchangeResponse>(request).await? {
            CodeExchangeResponse::Flat(body) => body,
            CodeExchangeResponse::Wrapped { data } => data
                .into_iter()
                .next()
                .ok_or_else(|| PlatformError::Decode("token exchange returned no data".to_string()))?,
        };

        Ok(ShortLivedToken {
            access_token: body.access_token,
            user_id: body.user_id.and_then(id_string),
        })
    }

    async fn exchange_long_lived(&self, short: &ShortLivedToken) -> Result<LongLivedToken, PlatformError> {
        let request = self
            .graph
            .http()
            .get(format!("{}/access_token", self.graph.base_url()))
            .query(&[
                ("grant_type", "ig_exchange_token"),
                ("client_secret", self.app.client_secret.as_str()),
                ("access_token", short.access_token.as_str()),
            ]);

        let token: LongTokenResponse = graph::send(request).await?;
        Ok(LongLivedToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }

    async fn resolve_target(&self, access_token: &str) -> Result<Option<String>, PlatformError> {
        let me: MeResponse = self
            .graph
            .get("me", access_token, &[("fields", "user_id,username")])
            .await?;
        Ok(me.user_id.and_then(id_string))
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> InstagramAdapter {
        InstagramAdapter::new(
            Client::new(),
            AppCredentials {
                client_id: "ig-app".to_string(),
                client_secret: "ig-secret".to_string(),
                redirect_uri: "https://publisher.example.com/oauth/instagram/callback".to_string(),
            },
            InstagramEndpoints {
                graph_base: server.uri(),
                oauth_base: server.uri(),
                dialog_base: server.uri(),
                version: DEFAULT_GRAPH_API_VERSION.to_string(),
            },
            PollPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_exchange_code_accepts_wrapped_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"access_token": "short", "user_id": 1784140, "permissions": "instagram_business_basic"}]
            })))
            .mount(&server)
            .await;

        let token = adapter(&server).exchange_code("abc").await.unwrap();
        assert_eq!(token.access_token, "short");
        assert_eq!(token.user_id.as_deref(), Some("1784140"));
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error_type": "OAuthException", "code": 400,
                "error": {"message": "This authorization code has been used"}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server).exchange_code("used").await.unwrap_err();
        assert_eq!(err.reason(), "This authorization code has been used");
    }

    #[tokio::test]
    async fn test_long_lived_and_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/access_token"))
            .and(query_param("grant_type", "ig_exchange_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "long", "token_type": "bearer", "expires_in": 5184000
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v21.0/me"))
            .and(query_param("access_token", "long"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_id": "17841405", "username": "studio", "id": "9001"
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let long = adapter
            .exchange_long_lived(&ShortLivedToken {
                access_token: "short".to_string(),
                user_id: None,
            })
            .await
            .unwrap();
        assert_eq!(long.expires_in, Some(5184000));

        let target = adapter.resolve_target(&long.access_token).await.unwrap();
        assert_eq!(target.as_deref(), Some("17841405"));
    }
}
