//! HTTP profile backend

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::backend::ProfileBackend;
use super::types::{ProfileEnvelope, Profile, ProfileStatus, ProfileUpdate, StatusEnvelope};
use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use crate::session::SessionId;

/// Build the shared HTTP client for an API configuration
pub(crate) fn build_http_client(config: &ApiConfig) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

    let client = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Read a JSON body, turning non-success statuses into errors
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Server {
            status,
            message: body,
        });
    }

    let body = response.json().await?;
    Ok(body)
}

/// Profile backend speaking the NeethiSaarathi REST API
///
/// # Example
///
/// ```rust,no_run
/// use neethisaarathi::{ApiConfig, HttpProfileBackend, ProfileBackend, SessionId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = HttpProfileBackend::new(&ApiConfig::default())?;
/// let session_id = SessionId::generate();
///
/// if backend.exists(&session_id).await?.exists {
///     let profile = backend.fetch(&session_id).await?;
///     println!("{:?}", profile);
/// }
/// # Ok(())
/// # }
/// ```
pub struct HttpProfileBackend {
    base_url: String,
    client: Client,
}

impl HttpProfileBackend {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: build_http_client(config)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn profile_url(&self) -> String {
        format!("{}/user/profile", self.base_url)
    }

    fn keyed_url(&self, path: &str, session_id: &SessionId) -> String {
        format!(
            "{}{}?session_id={}",
            self.base_url,
            path,
            urlencoding::encode(session_id.as_str())
        )
    }
}

#[async_trait]
impl ProfileBackend for HttpProfileBackend {
    async fn fetch(&self, session_id: &SessionId) -> Result<Option<Profile>> {
        let url = self.keyed_url("/user/profile", session_id);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: ProfileEnvelope = handle_response(response).await?;
        if !envelope.success {
            debug!(
                session_id = %session_id,
                detail = envelope.message.as_deref().unwrap_or(""),
                "Profile not available"
            );
            return Ok(None);
        }

        envelope
            .profile
            .map(Some)
            .ok_or_else(|| ClientError::InvalidResponse("success without profile".to_string()))
    }

    async fn save(&self, update: &ProfileUpdate) -> Result<bool> {
        let response = self
            .client
            .post(self.profile_url())
            .header(header::CONTENT_TYPE, "application/json")
            .json(update)
            .send()
            .await?;

        let envelope: StatusEnvelope = handle_response(response).await?;
        debug!(
            session_id = %update.session_id,
            success = envelope.success,
            "Profile save answered"
        );
        Ok(envelope.success)
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool> {
        let url = self.keyed_url("/user/profile", session_id);

        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server { status, message: body });
        }

        // Any 2xx counts; the body flag is informational only
        if let Ok(envelope) = response.json::<StatusEnvelope>().await {
            debug!(
                session_id = %session_id,
                success = envelope.success,
                detail = envelope.message.as_deref().unwrap_or(""),
                "Profile delete answered"
            );
        }
        Ok(true)
    }

    async fn exists(&self, session_id: &SessionId) -> Result<ProfileStatus> {
        let url = self.keyed_url("/user/profile/exists", session_id);

        let response = self.client.get(&url).send().await?;
        handle_response(response).await
    }
}
