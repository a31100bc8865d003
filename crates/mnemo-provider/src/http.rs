//! HTTP search provider against an OpenAI-compatible `vector_stores` API.
//!
//! Endpoint layout:
//! - `POST   {base}/v1/vector_stores`             — create store
//! - `POST   {base}/v1/vector_stores/{id}`        — rename store
//! - `DELETE {base}/v1/vector_stores/{id}`        — delete store
//! - `POST   {base}/v1/files` (multipart)         — upload file bytes
//! - `POST   {base}/v1/vector_stores/{id}/files`  — attach uploaded file
//! - `DELETE {base}/v1/vector_stores/{id}/files/{file_id}` — detach file
//! - `GET    {base}/v1/vector_stores/{id}/files`  — list attached files
//!
//! A 404/405/501 on the `vector_stores` routes means the deployment does
//! not carry the capability at all; everything retriable maps to
//! [`ProviderError::Transient`].

use crate::error::{ProviderError, Result};
use crate::provider::{RemoteFile, RemoteStore, SearchProvider};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default request timeout for provider calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload purpose accepted by OpenAI-compatible file endpoints.
const FILE_PURPOSE: &str = "assistants";

/// Sanitize provider error text before it can reach logs or callers.
///
/// Never forward key material or another tenant's identifiers verbatim.
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "provider authentication error".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "provider rate limit exceeded".to_string();
    }

    if error.len() > 200 {
        let mut end = 200;
        while !error.is_char_boundary(end) {
            end -= 1;
        }
        return format!("{}...(truncated)", &error[..end]);
    }

    error.to_string()
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateStoreRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateStoreRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct StoreObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadedFileObject {
    id: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AttachFileRequest<'a> {
    file_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    data: Vec<UploadedFileObject>,
}

// ============================================================================
// Provider
// ============================================================================

/// Configuration for the HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL, e.g. `https://api.openai.com`.
    pub base_url: String,
    /// Bearer token for authentication.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpProviderConfig {
    /// Config with the default timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`SearchProvider`] backed by an OpenAI-compatible HTTP API.
pub struct HttpSearchProvider {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl HttpSearchProvider {
    /// Build a provider from config.
    pub fn new(config: HttpProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Transient(sanitize_api_error(&e.to_string())))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            timeout_ms: config.timeout.as_millis() as u64,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success HTTP status to the provider error taxonomy.
    ///
    /// `capability_route` marks requests whose 404 means "this deployment
    /// has no vector-store API" rather than "this id is unknown".
    fn map_status(status: StatusCode, body: &str, capability_route: bool) -> ProviderError {
        match status {
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
                if capability_route =>
            {
                ProviderError::CapabilityAbsent
            }
            s => ProviderError::Transient(format!("{}: {}", s, sanitize_api_error(body))),
        }
    }

    async fn check<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        capability_route: bool,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(sanitize_api_error(&e.to_string())))?;
        if !status.is_success() {
            return Err(Self::map_status(status, &body, capability_route));
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("body did not parse: {e}")))
    }

    async fn check_empty(response: reqwest::Response, capability_route: bool) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::map_status(status, &body, capability_route))
    }

    fn network(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout_ms)
        } else {
            ProviderError::Transient(sanitize_api_error(&e.to_string()))
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for HttpSearchProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn create_store(&self, name: &str) -> Result<RemoteStore> {
        let response = self
            .client
            .post(self.url("/v1/vector_stores"))
            .bearer_auth(&self.api_key)
            .json(&CreateStoreRequest { name })
            .send()
            .await
            .map_err(|e| self.network(e))?;

        let store: StoreObject = Self::check(response, true).await?;
        debug!(remote_id = %store.id, "created remote store");
        Ok(RemoteStore {
            name: store.name.unwrap_or_else(|| name.to_string()),
            id: store.id,
        })
    }

    async fn update_store(&self, remote_id: &str, name: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/v1/vector_stores/{remote_id}")))
            .bearer_auth(&self.api_key)
            .json(&UpdateStoreRequest { name })
            .send()
            .await
            .map_err(|e| self.network(e))?;

        // 404 here is ambiguous (unknown id vs missing capability); treat
        // it as transient so local state stays authoritative either way.
        Self::check_empty(response, false).await
    }

    async fn delete_store(&self, remote_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/v1/vector_stores/{remote_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.network(e))?;

        // Deleting an already-gone store is success for our purposes.
        if response.status() == StatusCode::NOT_FOUND {
            debug!(remote_id, "remote store already absent");
            return Ok(());
        }
        Self::check_empty(response, false).await
    }

    async fn add_file(&self, remote_id: &str, filename: &str, bytes: &[u8]) -> Result<RemoteFile> {
        // Two-step: upload bytes, then attach to the store.
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", FILE_PURPOSE)
            .part("file", part);

        let response = self
            .client
            .post(self.url("/v1/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.network(e))?;
        let uploaded: UploadedFileObject = Self::check(response, false).await?;

        let response = self
            .client
            .post(self.url(&format!("/v1/vector_stores/{remote_id}/files")))
            .bearer_auth(&self.api_key)
            .json(&AttachFileRequest {
                file_id: &uploaded.id,
            })
            .send()
            .await
            .map_err(|e| self.network(e))?;
        Self::check_empty(response, true).await?;

        debug!(remote_id, remote_file_id = %uploaded.id, "attached remote file");
        Ok(RemoteFile {
            filename: uploaded.filename.unwrap_or_else(|| filename.to_string()),
            size_bytes: uploaded.bytes.unwrap_or(bytes.len() as u64),
            id: uploaded.id,
        })
    }

    async fn remove_file(&self, remote_id: &str, remote_file_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!(
                "/v1/vector_stores/{remote_id}/files/{remote_file_id}"
            )))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.network(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_empty(response, false).await
    }

    async fn list_files(&self, remote_id: &str) -> Result<Vec<RemoteFile>> {
        let response = self
            .client
            .get(self.url(&format!("/v1/vector_stores/{remote_id}/files")))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.network(e))?;

        let list: FileListResponse = Self::check(response, true).await?;
        Ok(list
            .data
            .into_iter()
            .map(|f| RemoteFile {
                filename: f.filename.unwrap_or_default(),
                size_bytes: f.bytes.unwrap_or(0),
                id: f.id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_hides_auth_details() {
        let msg = sanitize_api_error("Incorrect API key provided: sk-abc123");
        assert_eq!(msg, "provider authentication error");
        assert!(!msg.contains("sk-abc123"));
    }

    #[test]
    fn test_sanitize_rate_limit() {
        assert_eq!(
            sanitize_api_error("Rate limit reached for requests"),
            "provider rate limit exceeded"
        );
    }

    #[test]
    fn test_sanitize_truncates_long_messages() {
        let long = "x".repeat(500);
        let msg = sanitize_api_error(&long);
        assert!(msg.len() < 250);
        assert!(msg.ends_with("...(truncated)"));
    }

    #[test]
    fn test_map_status_capability_absent() {
        let err = HttpSearchProvider::map_status(StatusCode::NOT_FOUND, "no route", true);
        assert!(matches!(err, ProviderError::CapabilityAbsent));

        let err = HttpSearchProvider::map_status(StatusCode::NOT_IMPLEMENTED, "", true);
        assert!(matches!(err, ProviderError::CapabilityAbsent));
    }

    #[test]
    fn test_map_status_transient() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::UNAUTHORIZED,
        ] {
            let err = HttpSearchProvider::map_status(status, "boom", true);
            assert!(err.is_transient(), "{status} should map to transient");
        }
    }

    #[test]
    fn test_not_found_off_capability_route_is_transient() {
        let err = HttpSearchProvider::map_status(StatusCode::NOT_FOUND, "unknown id", false);
        assert!(err.is_transient());
    }

    #[test]
    fn test_url_join_strips_trailing_slash() {
        let provider = HttpSearchProvider::new(HttpProviderConfig::new(
            "https://api.example.com/",
            "test-key",
        ))
        .unwrap();
        assert_eq!(
            provider.url("/v1/vector_stores"),
            "https://api.example.com/v1/vector_stores"
        );
    }
}
