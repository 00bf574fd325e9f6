//! Claude API client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;
use url::Url;

use crate::config::ClaudeConfig;

use super::error::{ApiErrorResponse, ClaudeError};
use super::types::{ChatRequest, ChatResponse, Message, Tool, ToolChoice};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Claude API client.
#[derive(Clone)]
pub struct ClaudeClient {
    inner: Arc<ClaudeClientInner>,
}

struct ClaudeClientInner {
    client: reqwest::Client,
    model: String,
    api_url: Url,
}

impl ClaudeClient {
    /// Create a new Claude client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ClaudeConfig) -> Result<Self, ClaudeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(config.api_key.expose_secret()).map_err(|_| {
                ClaudeError::Unauthorized("API key contains invalid characters".to_string())
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClaudeClientInner {
                client,
                model: config.model.clone(),
                api_url: config.api_url.clone(),
            }),
        })
    }

    /// Model used for requests.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Send a chat request and get a complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self, messages, system, tools), fields(model = %self.inner.model))]
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Option<Vec<Tool>>,
        tool_choice: Option<ToolChoice>,
        max_tokens: u32,
    ) -> Result<ChatResponse, ClaudeError> {
        let request = ChatRequest {
            model: self.inner.model.clone(),
            max_tokens,
            messages,
            system,
            tools,
            tool_choice,
        };

        let response = self
            .inner
            .client
            .post(self.inner.api_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| ClaudeError::Parse(format!("Failed to parse response: {e}")))
        } else {
            Err(handle_error_status(status, response).await)
        }
    }
}

/// Map an error status code to a `ClaudeError`.
async fn handle_error_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> ClaudeError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return ClaudeError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return ClaudeError::Unauthorized("Invalid API key".to_string());
    }

    match response.text().await {
        Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_error) => ClaudeError::Api {
                error_type: api_error.error.error_type,
                message: api_error.error.message,
            },
            Err(_) if status.is_server_error() => ClaudeError::Unavailable(status.as_u16()),
            Err(_) => ClaudeError::Api {
                error_type: "unknown".to_string(),
                message: body,
            },
        },
        Err(e) => ClaudeError::Http(e),
    }
}
