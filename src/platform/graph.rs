//! Shared Graph API plumbing used by both platform adapters
//!
//! Every response is decoded against an explicit schema. Non-2xx responses
//! become [`PlatformError::Api`] with the platform's own message when the
//! body carries the standard `{"error": {"message": ...}}` envelope.

use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use super::{ContainerRequest, ContainerStatus, PlatformError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    version: String,
    /// When set, every authenticated call carries `appsecret_proof`
    app_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    error_user_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status_code: String,
    #[serde(default)]
    status: Option<String>,
}

impl GraphClient {
    pub fn new(http: Client, base_url: &str, version: &str, app_secret: Option<&str>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            version: version.to_string(),
            app_secret: app_secret.map(str::to_string),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Versioned URL for a Graph path (`{base}/{version}/{path}`)
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.version, path.trim_start_matches('/'))
    }

    /// HMAC-SHA256 of the access token keyed by the app secret, hex encoded
    pub fn appsecret_proof(&self, access_token: &str) -> Option<String> {
        let secret = self.app_secret.as_deref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(access_token.as_bytes());
        let digest = mac.finalize().into_bytes();
        Some(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    fn auth_params(&self, access_token: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![("access_token", access_token.to_string())];
        if let Some(proof) = self.appsecret_proof(access_token) {
            params.push(("appsecret_proof", proof));
        }
        params
    }

    /// Authenticated GET against a versioned Graph path
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        params: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let request = self
            .http
            .get(self.url(path))
            .query(params)
            .query(&self.auth_params(access_token));
        send(request).await
    }

    /// Authenticated form POST against a versioned Graph path
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        params: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let mut form: Vec<(&str, String)> = params
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect();
        form.extend(self.auth_params(access_token));

        let request = self.http.post(self.url(path)).form(&form);
        send(request).await
    }

    /// Create a media container on the publishing target
    pub async fn create_container(&self, request: &ContainerRequest<'_>) -> Result<String, PlatformError> {
        let media_type = request.media_kind.as_str();
        let url_field = request.media_kind.url_field();
        let params = [
            ("media_type", media_type),
            (url_field, request.media_url),
            ("caption", request.caption),
        ];

        let created: IdResponse = self
            .post(&format!("{}/media", request.target_id), request.access_token, &params)
            .await?;
        non_empty_id(created.id)
    }

    pub async fn container_status(
        &self,
        container_id: &str,
        access_token: &str,
    ) -> Result<ContainerStatus, PlatformError> {
        let response: StatusResponse = self
            .get(container_id, access_token, &[("fields", "status_code,status")])
            .await?;
        Ok(ContainerStatus::from_code(&response.status_code, response.status))
    }

    pub async fn publish(
        &self,
        target_id: &str,
        container_id: &str,
        access_token: &str,
    ) -> Result<String, PlatformError> {
        let published: IdResponse = self
            .post(
                &format!("{}/media_publish", target_id),
                access_token,
                &[("creation_id", container_id)],
            )
            .await?;
        non_empty_id(published.id)
    }
}

/// Send a request and decode the body as `T`, mapping failures to `PlatformError`
pub async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, PlatformError> {
    let resp = request.send().await?;
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(PlatformError::Api {
            status: status.as_u16(),
            message: api_error_message(&text),
        });
    }

    serde_json::from_str(&text)
        .map_err(|e| PlatformError::Decode(format!("{} - body: {}", e, truncate(&text, 200))))
}

fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.error_user_msg.unwrap_or(envelope.error.message),
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => truncate(body, 200).to_string(),
    }
}

fn non_empty_id(id: String) -> Result<String, PlatformError> {
    if id.trim().is_empty() {
        return Err(PlatformError::Decode("response carried an empty id".to_string()));
    }
    Ok(id)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
