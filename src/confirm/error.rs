//! Confirmation failures and how gateways should treat them.

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Why a payment result was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmErrorKind {
    /// The order was confirmed by an earlier delivery.
    AlreadyConfirmed,
    /// The gateway reported a different amount than the order charges.
    AmountMismatch,
    /// The reader is already a valid premium member.
    DuplicateUpgrade,
    /// No order with the reported id exists.
    OrderNotFound,
    /// The payment result names another order.
    OrderMismatch,
    /// The order's cycle cannot produce an end date.
    InvalidCycle,
    /// The store failed.
    Storage,
}

impl ConfirmErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyConfirmed => "already_confirmed",
            Self::AmountMismatch => "amount_mismatch",
            Self::DuplicateUpgrade => "duplicate_upgrade",
            Self::OrderNotFound => "order_not_found",
            Self::OrderMismatch => "order_mismatch",
            Self::InvalidCycle => "invalid_cycle",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ConfirmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused or failed confirmation.
///
/// `retry` tells the webhook handler whether to invite redelivery. Business
/// refusals are final; infrastructure failures may succeed next time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmError {
    pub kind: ConfirmErrorKind,
    pub message: String,
    pub retry: bool,
}

impl ConfirmError {
    fn new(kind: ConfirmErrorKind, message: impl Into<String>, retry: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retry,
        }
    }

    pub fn already_confirmed(order_id: &str) -> Self {
        Self::new(
            ConfirmErrorKind::AlreadyConfirmed,
            format!("Order {} is already confirmed", order_id),
            false,
        )
    }

    pub fn amount_mismatch(order_id: &str, expected: i64, actual: i64) -> Self {
        Self::new(
            ConfirmErrorKind::AmountMismatch,
            format!(
                "Order {} charges {} cents but {} cents were paid",
                order_id, expected, actual
            ),
            false,
        )
    }

    pub fn duplicate_upgrade(order_id: &str) -> Self {
        Self::new(
            ConfirmErrorKind::DuplicateUpgrade,
            format!("Order {} upgrades a membership that is already premium", order_id),
            false,
        )
    }

    pub fn order_not_found(order_id: &str) -> Self {
        Self::new(
            ConfirmErrorKind::OrderNotFound,
            format!("Order {} not found", order_id),
            false,
        )
    }

    pub fn order_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            ConfirmErrorKind::OrderMismatch,
            format!("Payment for order {} applied to order {}", actual, expected),
            false,
        )
    }

    pub fn invalid_cycle(order_id: &str) -> Self {
        Self::new(
            ConfirmErrorKind::InvalidCycle,
            format!("Order {} has no computable end date", order_id),
            true,
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ConfirmErrorKind::Storage, message, true)
    }
}

impl fmt::Display for ConfirmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ConfirmError {}

impl From<LedgerError> for ConfirmError {
    fn from(err: LedgerError) -> Self {
        Self::storage(err.to_string())
    }
}

#[derive(Serialize)]
struct ConfirmErrorBody {
    code: ConfirmErrorKind,
    message: String,
    retry: bool,
}

impl IntoResponse for ConfirmError {
    fn into_response(self) -> Response {
        // Gateways redeliver on anything other than 2xx.
        let status = if self.retry {
            tracing::error!(target: "subs_ledger::confirm", kind = %self.kind, error = %self.message, "confirmation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            tracing::info!(target: "subs_ledger::confirm", kind = %self.kind, "confirmation refused, acknowledging");
            StatusCode::OK
        };

        let body = ConfirmErrorBody {
            code: self.kind,
            message: self.message,
            retry: self.retry,
        };
        (status, Json(body)).into_response()
    }
}
