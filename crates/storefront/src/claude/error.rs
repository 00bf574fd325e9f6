//! Error types for the Claude API client.

use thiserror::Error;

/// Errors that can occur when interacting with the Claude API.
#[derive(Debug, Error)]
pub enum ClaudeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Claude API returned an error.
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Error type from the API.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// Server-side failure without a parseable error body.
    #[error("service unavailable (HTTP {0})")]
    Unavailable(u16),

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ClaudeError {
    /// Whether the same request could succeed if sent again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Unavailable(_) | Self::RateLimited(_) | Self::Parse(_) => true,
            Self::Api { error_type, .. } => {
                matches!(error_type.as_str(), "api_error" | "overloaded_error")
            }
            Self::Unauthorized(_) => false,
        }
    }
}

/// API error response from Claude.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Nested error details.
    pub error: ApiError,
}

/// Nested error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    pub message: String,
}
