//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding. Every error body has the same shape
//! as a toast, so clients can show it directly:
//!
//! ```json
//! { "notification": { "title": "...", "description": "...", "variant": "destructive" } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::checkout::{CheckoutError, ValidationError};
use crate::db::RepositoryError;
use crate::services::CartError;
use crate::services::notifications::Notification;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Cart operation rejected or failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order placement rejected or failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::Checkout(CheckoutError::Validation(e))
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub notification: Notification,
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err)
            | Self::Cart(CartError::Repository(err))
            | Self::Checkout(CheckoutError::Persistence(err)) => repository_status(err),
            Self::Cart(err) => match err {
                CartError::ProductNotFound(_) | CartError::ItemNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                CartError::OutOfStock(_) | CartError::InsufficientStock { .. } => {
                    StatusCode::CONFLICT
                }
                CartError::InvalidQuantity => StatusCode::BAD_REQUEST,
                CartError::Money(_) | CartError::Repository(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            },
            Self::Checkout(CheckoutError::Validation(
                ValidationError::AlreadyPlaced | ValidationError::PlacementInProgress,
            )) => StatusCode::CONFLICT,
            Self::Checkout(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn title(&self) -> &'static str {
        match self {
            Self::Cart(_) => "Cart not updated",
            Self::Checkout(_) => "Cannot place order",
            Self::NotFound(_) => "Not found",
            Self::BadRequest(_) => "Invalid request",
            Self::Database(_) | Self::Internal(_) => "Something went wrong",
        }
    }

    /// Client-safe description. Internal details are never exposed.
    fn description(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_string();
        }
        match self {
            Self::Database(err) => err.to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            notification: Notification::destructive(self.title(), self.description()),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for customer actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
