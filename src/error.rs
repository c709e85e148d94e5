//! Auction error types with HTTP status code mapping.
//!
//! [`AuctionError`] is the central error type for the replica. Transient
//! store and bus failures are recovered locally or surfaced to a viewer as an
//! `error` event; REST handlers map every variant to a status code and a
//! structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid bid: bidder name must not be empty"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Replica-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status                 |
/// |-----------|------------|-----------------------------|
/// | 1000–1999 | Validation | 400 Bad Request             |
/// | 3000–3099 | Server     | 500 Internal Server Error   |
/// | 3100–3199 | Backends   | 503 Service Unavailable     |
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    /// The shared state store could not be reached or rejected the operation.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    /// Publishing to or subscribing on the update channel failed.
    #[error("update channel unavailable: {0}")]
    BusUnavailable(String),

    /// A single viewer's stream failed.
    #[error("connection i/o failed: {0}")]
    ConnectionIo(String),

    /// Writing to the durable bid log failed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// The bid itself is malformed (e.g. blank bidder name).
    #[error("invalid bid: {0}")]
    InvalidBid(String),

    /// A non-bid command carried invalid fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An event payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuctionError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidBid(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::Internal(_) => 3000,
            Self::PersistenceFailure(_) => 3001,
            Self::Serialization(_) => 3002,
            Self::ConnectionIo(_) => 3003,
            Self::StoreUnavailable(_) => 3101,
            Self::BusUnavailable(_) => 3102,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBid(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) | Self::BusUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceFailure(_)
            | Self::Serialization(_)
            | Self::ConnectionIo(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` for failures that a later attempt may not hit.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::BusUnavailable(_) | Self::PersistenceFailure(_)
        )
    }
}

impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
