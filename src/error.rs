use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::order::OrderError;

/// The main error type for ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error body returned to API clients.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl LedgerError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether repeating the same request later could succeed.
    ///
    /// Storage failures are transient. Business-rule refusals and bad input
    /// are permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Anyhow(_) => true,
            Self::NotFound(_) | Self::InvalidInput(_) | Self::Config(_) | Self::Order(_) => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Order(err) if err.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Order(_)
            | Self::Database(_) | Self::Config(_) | Self::Internal(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients. Server-side failures are masked.
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(_) | Self::InvalidInput(_) => self.to_string(),
            Self::Order(err) if err.is_client_error() => self.to_string(),
            Self::Database(_) => "Database error".to_string(),
            Self::Order(_) | Self::Config(_) | Self::Internal(_) | Self::Anyhow(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            status = status.as_u16(),
            error_id = %error_id,
            error = %self,
            "Request failed"
        );

        let code = match &self {
            Self::Order(err) => Some(err.code()),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.safe_message(),
            error_id,
            code,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            LedgerError::InvalidInput(format!("JSON error: {}", err))
        } else {
            LedgerError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

#[cfg(feature = "database")]
impl From<sea_orm::DbErr> for LedgerError {
    fn from(err: sea_orm::DbErr) -> Self {
        LedgerError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(LedgerError::database("connection reset").is_retryable());
        assert!(LedgerError::internal("boom").is_retryable());
        assert!(!LedgerError::not_found("order FT00").is_retryable());
        assert!(!LedgerError::invalid_input("bad plan").is_retryable());
        assert!(
            !LedgerError::from(OrderError::PlanNotFound {
                plan_id: "x".to_string()
            })
            .is_retryable()
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            LedgerError::not_found("x").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LedgerError::database("x").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err: LedgerError = OrderError::DowngradeNotAllowed {
            current: crate::membership::Tier::Premium,
            target: crate::membership::Tier::Standard,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_safe_message_hides_database_details() {
        let err = LedgerError::database("password authentication failed for user ledger");
        assert_eq!(err.safe_message(), "Database error");
    }

    #[test]
    fn test_json_error_conversion() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(LedgerError::from(err), LedgerError::InvalidInput(_)));
    }
}
