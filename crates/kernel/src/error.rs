//! Application error types.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Which catalog uniqueness rule rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRule {
    /// Another restaurant already carries the same external place reference.
    ExternalPlace,
    /// Another restaurant already has the same name at the same address.
    NameAddress,
}

impl fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictRule::ExternalPlace => f.write_str("external_place"),
            ConflictRule::NameAddress => f.write_str("name_address"),
        }
    }
}

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("bad request: {0}")]
    Validation(String),

    #[error("conflict: a restaurant with the same {0} already exists")]
    Conflict(ConflictRule),

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("request cancelled")]
    Cancelled,

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// Message including the underlying cause, for logs and warnings.
    pub fn detail(&self) -> String {
        match self {
            AppError::Internal(e) => format!("{e:#}"),
            AppError::Database(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Unique index backing [`ConflictRule::ExternalPlace`].
pub const PLACE_ID_CONSTRAINT: &str = "restaurant_place_id_key";

/// Unique index backing [`ConflictRule::NameAddress`].
pub const NAME_ADDRESS_CONSTRAINT: &str = "restaurant_name_address_key";

/// Classify a failed write by SQLSTATE.
///
/// Unique violations on the catalog indexes become [`AppError::Conflict`],
/// foreign key and check violations become [`AppError::Validation`].
/// Anything else stays a database error.
pub fn classify_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => match db_err.constraint() {
                Some(PLACE_ID_CONSTRAINT) => return AppError::Conflict(ConflictRule::ExternalPlace),
                Some(NAME_ADDRESS_CONSTRAINT) => {
                    return AppError::Conflict(ConflictRule::NameAddress);
                }
                _ => {}
            },
            Some("23503") => {
                return AppError::validation("referenced category or food type does not exist");
            }
            Some("23514") => {
                return AppError::validation(format!(
                    "value rejected by constraint {}",
                    db_err.constraint().unwrap_or("unknown")
                ));
            }
            _ => {}
        }
    }
    AppError::Database(err)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<ConflictRule>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Storage details are logged, never returned
        let error = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let rule = match &self {
            AppError::Conflict(rule) => Some(*rule),
            _ => None,
        };

        (status, Json(ErrorResponse { error, rule })).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
