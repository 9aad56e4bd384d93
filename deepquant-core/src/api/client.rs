//! HTTP client for the research backend
//!
//! Covers the chat stream (`POST /chat/stream`) and the report store
//! endpoints. Every request carries the bearer token from [`ApiConfig`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::stream::{decode_event_stream, BoxFuture, ChatRequest, EventSource, EventStream};

use super::reports::{Report, ThreadHistory};

/// Response of `DELETE /reports/{id}`
#[derive(Debug, Deserialize)]
struct DeleteResponse {
    status: String,
}

/// Body of `POST /podcast/generate`
#[derive(Debug, Serialize)]
struct PodcastRequest<'a> {
    content: &'a str,
}

/// HTTP client for the research backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Report requests, with a total timeout
    http_client: reqwest::Client,
    /// Chat streams, bounded per read rather than end to end
    stream_client: reqwest::Client,
    base_url: String,
    user_id: Option<String>,
}

impl ApiClient {
    /// Create a client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api token: {}", e)))?,
            );
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers.clone())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            stream_client,
            base_url,
            user_id: config.user_id.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Open the event stream for one turn.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream> {
        let url = format!("{}/chat/stream", self.base_url);
        tracing::debug!(url = %url, thread_id = %request.thread_id, "Opening chat stream");

        let response = self
            .stream_client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::StreamTransport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::StreamTransport(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let body = Box::pin(response.bytes_stream());
        Ok(Box::pin(decode_event_stream(body)))
    }

    /// List the user's reports.
    pub async fn list_reports(&self) -> Result<Vec<Report>> {
        let url = format!("{}/reports", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("user_id", self.require_user()?)])
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;
        Self::parse_json(response).await
    }

    /// Fetch a thread's report and full message history.
    pub async fn fetch_thread(&self, thread_id: &str) -> Result<ThreadHistory> {
        let url = format!(
            "{}/reports/thread/{}",
            self.base_url,
            urlencoding::encode(thread_id)
        );
        let response = self
            .http_client
            .get(&url)
            .query(&[("user_id", self.require_user()?)])
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;
        Self::parse_json(response).await
    }

    /// Delete a report and its chat history.
    pub async fn delete_report(&self, report_id: &str) -> Result<()> {
        let url = format!(
            "{}/reports/{}",
            self.base_url,
            urlencoding::encode(report_id)
        );
        let response = self
            .http_client
            .delete(&url)
            .query(&[("user_id", self.require_user()?)])
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;
        let result: DeleteResponse = Self::parse_json(response).await?;
        tracing::info!(report_id, status = %result.status, "Deleted report");
        Ok(())
    }

    /// Render a report as podcast audio (mp3 bytes).
    pub async fn generate_podcast(&self, content: &str) -> Result<Vec<u8>> {
        let url = format!("{}/podcast/generate", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&PodcastRequest { content })
            .send()
            .await
            .map_err(|e| Error::Api(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Api(format!("API error ({}): {}", status, error_text)));
        }
        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Api(format!("failed to read podcast audio: {}", e)))?;
        Ok(audio.to_vec())
    }

    fn require_user(&self) -> Result<&str> {
        self.user_id
            .as_deref()
            .ok_or_else(|| Error::Config("api.user_id is required for report requests".to_string()))
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Api(format!("failed to parse response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Api(format!("API error ({}): {}", status, error_text)))
        }
    }
}

impl EventSource for ApiClient {
    fn open<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<EventStream>> {
        Box::pin(self.chat_stream(request))
    }
}
