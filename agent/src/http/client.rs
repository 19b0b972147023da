//! HTTP client for the reverse proxy administration API

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::AgentError;

/// HTTP client bound to one admin API base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, AgentError> {
        Url::parse(base_url)
            .map_err(|e| AgentError::ConfigError(format!("Invalid admin URL {base_url}: {e}")))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request. A 404 yields `None`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AgentError> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET failed: {} - {}", status, body);
            return Err(AgentError::RouteError(format!("GET {path}: {status}: {body}")));
        }

        let body = response.json().await?;
        Ok(Some(body))
    }

    /// Make a POST request with a JSON body, ignoring the response body
    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), AgentError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP POST failed: {} - {}", status, body);
            return Err(AgentError::RouteError(format!("POST {path}: {status}: {body}")));
        }

        Ok(())
    }

    /// Make a DELETE request. Returns `false` when nothing existed (404).
    pub async fn delete(&self, path: &str) -> Result<bool, AgentError> {
        let url = self.url(path);
        debug!("DELETE {}", url);

        let response = self.client.delete(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP DELETE failed: {} - {}", status, body);
            return Err(AgentError::RouteError(format!("DELETE {path}: {status}: {body}")));
        }

        Ok(true)
    }
}
