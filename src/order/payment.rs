//! Gateway-neutral payment notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a gateway adapter reports once it has verified a notification.
///
/// Alipay and WeChat notifications are parsed and signature-checked
/// outside the engine and normalized into this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub order_id: String,
    /// Amount actually paid, in cents.
    pub amount_cents: i64,
    /// When the gateway settled the payment.
    pub confirmed_utc: DateTime<Utc>,
}

impl PaymentResult {
    #[must_use]
    pub fn new(order_id: impl Into<String>, amount_cents: i64, confirmed_utc: DateTime<Utc>) -> Self {
        Self {
            order_id: order_id.into(),
            amount_cents,
            confirmed_utc,
        }
    }

    /// Result for an order settled entirely from the reader's balance.
    #[must_use]
    pub fn free(order_id: impl Into<String>, confirmed_utc: DateTime<Utc>) -> Self {
        Self::new(order_id, 0, confirmed_utc)
    }
}
