//! Error taxonomy of the federation engine.

use std::fmt;

use axum::http::StatusCode;
use hearth_common::AppError;
use url::Url;

/// Result type used throughout the engine.
pub type FederationResult<T> = Result<T, FederationError>;

/// A single failed delivery inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// Inbox that could not be reached.
    pub inbox: Url,
    /// Transport error text.
    pub reason: String,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.inbox, self.reason)
    }
}

/// Engine error.
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("gone: {0}")]
    Gone(String),
    #[error("object property required on the provided activity")]
    ObjectRequired,
    #[error("target property required on the provided activity")]
    TargetRequired,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("delivery failed for {} recipient(s): {}", .0.len(), join_failures(.0))]
    Delivery(Vec<DeliveryFailure>),
    #[error("internal error: {0}")]
    Internal(String),
}

fn join_failures(failures: &[DeliveryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl FederationError {
    /// HTTP status for this error when it ends a request.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ObjectRequired | Self::TargetRequired => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::Transport(_) | Self::Database(_) | Self::Delivery(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the error is one of the distinguished validation failures.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::ObjectRequired | Self::TargetRequired)
    }

    /// Whether the error reports a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn not_found(iri: &Url) -> Self {
        Self::NotFound(iri.to_string())
    }
}

impl From<AppError> for FederationError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Gone(msg) => Self::Gone(msg),
            AppError::BadRequest(msg) => Self::BadRequest(msg),
            AppError::Unauthorized => Self::Unauthorized("unauthorized".to_string()),
            AppError::Forbidden(msg) => Self::Forbidden(msg),
            AppError::Database(msg) => Self::Database(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<FederationError> for AppError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::BadRequest(msg) => Self::BadRequest(msg),
            FederationError::ObjectRequired | FederationError::TargetRequired => {
                Self::BadRequest(err.to_string())
            }
            FederationError::Unauthorized(_) => Self::Unauthorized,
            FederationError::Forbidden(msg) => Self::Forbidden(msg),
            FederationError::NotFound(msg) => Self::NotFound(msg),
            FederationError::Gone(msg) => Self::Gone(msg),
            FederationError::Database(msg) => Self::Database(msg),
            other => Self::Federation(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for FederationError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<url::ParseError> for FederationError {
    fn from(err: url::ParseError) -> Self {
        Self::BadRequest(format!("invalid IRI: {err}"))
    }
}
