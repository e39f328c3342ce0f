//! Shared HTTP plumbing for roster providers.
//!
//! Thin wrapper over reqwest with base-URL joining, auth header
//! injection, bounded retries for transient failures, and mapping of
//! transport errors onto the structured source error kinds.

use cw_core::source::{SourceError, SourceResult};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Authentication configuration for a provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    #[default]
    None,
    /// API key in a custom header.
    ApiKey { key: String, header_name: String },
    /// Bearer token.
    BearerToken { token: String },
    /// HTTP basic auth.
    Basic { username: String, password: String },
}

/// Configuration for a provider HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Base URL of the provider API.
    pub base_url: String,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

impl HttpClientConfig {
    /// Creates a config for a base URL with defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: AuthConfig::None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// HTTP client with retry support, shared by all concrete providers.
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Builds a client from configuration.
    pub fn new(config: HttpClientConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Joins a path onto the base URL.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Executes a GET and deserializes the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SourceResult<T> {
        let response = self.get(path).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SourceError::MalformedResponse(e.to_string()))?;

        serde_json::from_str(&text).map_err(|e| {
            SourceError::MalformedResponse(format!(
                "failed to parse response (status {}): {}: {}",
                status,
                e,
                text.chars().take(200).collect::<String>()
            ))
        })
    }

    /// Executes a GET with bounded retries for transient failures.
    pub async fn get(&self, path: &str) -> SourceResult<Response> {
        let url = self.build_url(path);
        let mut delay = Duration::from_millis(200);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!(%url, attempt, ?delay, "retrying request");
                sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
            }

            let request = self.authenticate(self.client.get(&url));
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() {
                        // Transient: retry if budget remains.
                        warn!(%url, %status, "server error");
                        last_error = Some(SourceError::Unreachable(format!("HTTP {}", status)));
                        continue;
                    }
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(SourceError::AuthFailure(format!("HTTP {}", status)));
                    }
                    if status.is_client_error() {
                        return Err(SourceError::Unreachable(format!("HTTP {}", status)));
                    }
                    return Ok(response);
                }
                Err(err) => {
                    last_error = Some(classify_transport_error(&err));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::Unreachable("request never attempted".to_string())))
    }

    fn authenticate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            AuthConfig::None => request,
            AuthConfig::ApiKey { key, header_name } => request.header(header_name, key),
            AuthConfig::BearerToken { token } => {
                request.header("Authorization", format!("Bearer {}", token))
            }
            AuthConfig::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(err.to_string())
    } else {
        SourceError::Unreachable(err.to_string())
    }
}
