//! HTTP error mapping.
//!
//! Validation failures are the client's fault (400); backend
//! unavailability (pool exhaustion, connect failures, query timeouts)
//! is backpressure the client should retry (503); everything else is an
//! internal error (500). Diagnostic detail is attached only in
//! development mode so infrastructure internals never leak to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use spendwatch_core::Error as CoreError;

use crate::types::ErrorBody;

/// Errors a route handler can produce.
#[derive(Debug)]
pub enum ApiError {
    /// The request's parameters failed validation.
    Validation(String),
    /// A core (pool/cache/driver) operation failed.
    Core(CoreError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl ApiError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Core(
                CoreError::PoolExhausted(_)
                | CoreError::ConnectionFailed(_)
                | CoreError::QueryTimeout(_),
            ) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self, dev_mode: bool) -> ErrorBody {
        let (error, message) = match self {
            Self::Validation(detail) => (
                "Invalid request parameters".to_string(),
                Some(detail.clone()),
            ),
            Self::Core(CoreError::ConnectionFailed(_)) => (
                "Database connection failed".to_string(),
                Some("Unable to connect to Vertica database".to_string()),
            ),
            Self::Core(CoreError::PoolExhausted(_)) => (
                "Connection pool timeout".to_string(),
                Some("All database connections are busy. Please try again in a moment.".to_string()),
            ),
            Self::Core(CoreError::QueryTimeout(_)) => (
                "Query timeout".to_string(),
                Some("The query took too long to complete. Please try again in a moment.".to_string()),
            ),
            Self::Core(_) => ("Internal server error".to_string(), None),
        };

        let details = match self {
            Self::Validation(_) => None,
            Self::Core(e) if dev_mode => Some(e.to_string()),
            Self::Core(_) => None,
        };

        ErrorBody {
            error,
            message,
            details,
            success: false,
        }
    }

    /// Renders the error as a structured JSON response. A failing route
    /// never returns a partial payload shaped like a success response.
    pub fn into_response(self, dev_mode: bool) -> Response {
        if let Self::Core(e) = &self {
            tracing::error!(code = e.code(), error = %e, "request failed");
        }
        (self.status(), Json(self.body(dev_mode))).into_response()
    }
}
