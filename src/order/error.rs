//! Order construction errors.

use std::fmt;

use chrono::NaiveDate;

use crate::membership::{PaymentMethod, Tier};

/// Reasons an order cannot be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The reader has no usable id.
    MissingReader,
    /// The requested plan does not exist.
    PlanNotFound { plan_id: String },
    /// The plan definition cannot be sold. This is a configuration problem.
    InvalidPlan { plan_id: String, reason: String },
    /// Ledger orders are only settled by one-off gateways.
    UnsupportedPaymentMethod { method: PaymentMethod },
    /// The membership is renewed by Stripe or Apple and cannot be stacked on.
    ForeignAutoRenew { method: PaymentMethod },
    /// Renewing would push the expiration beyond the stacking cap.
    RenewalWindowExceeded {
        expire_date: NaiveDate,
        window_years: u32,
    },
    /// Only standard to premium is an upgrade.
    DowngradeNotAllowed { current: Tier, target: Tier },
}

impl OrderError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingReader => "missing_reader",
            Self::PlanNotFound { .. } => "plan_not_found",
            Self::InvalidPlan { .. } => "invalid_plan",
            Self::UnsupportedPaymentMethod { .. } => "unsupported_payment_method",
            Self::ForeignAutoRenew { .. } => "foreign_auto_renew",
            Self::RenewalWindowExceeded { .. } => "renewal_window_exceeded",
            Self::DowngradeNotAllowed { .. } => "downgrade_not_allowed",
        }
    }

    /// Refusals caused by the request rather than by server configuration.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::MissingReader
            | Self::PlanNotFound { .. }
            | Self::UnsupportedPaymentMethod { .. }
            | Self::ForeignAutoRenew { .. }
            | Self::RenewalWindowExceeded { .. }
            | Self::DowngradeNotAllowed { .. } => true,
            Self::InvalidPlan { .. } => false,
        }
    }
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingReader => write!(f, "Order requires a reader id"),
            Self::PlanNotFound { plan_id } => write!(f, "Plan not found: {}", plan_id),
            Self::InvalidPlan { plan_id, reason } => {
                write!(f, "Plan '{}' is misconfigured: {}", plan_id, reason)
            }
            Self::UnsupportedPaymentMethod { method } => {
                write!(f, "Payment method '{}' cannot settle orders", method)
            }
            Self::ForeignAutoRenew { method } => {
                write!(f, "Membership is auto-renewed through {}", method)
            }
            Self::RenewalWindowExceeded {
                expire_date,
                window_years,
            } => write!(
                f,
                "Membership expiring on {} is beyond the {}-year renewal window",
                expire_date, window_years
            ),
            Self::DowngradeNotAllowed { current, target } => {
                write!(f, "Cannot switch from {} to {}", current, target)
            }
        }
    }
}

impl std::error::Error for OrderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrderError::RenewalWindowExceeded {
            expire_date: NaiveDate::from_ymd_opt(2030, 1, 2).unwrap(),
            window_years: 3,
        };
        assert_eq!(
            err.to_string(),
            "Membership expiring on 2030-01-02 is beyond the 3-year renewal window"
        );

        let err = OrderError::DowngradeNotAllowed {
            current: Tier::Premium,
            target: Tier::Standard,
        };
        assert_eq!(err.to_string(), "Cannot switch from premium to standard");
    }

    #[test]
    fn test_error_classification() {
        assert!(OrderError::MissingReader.is_client_error());
        assert!(
            !OrderError::InvalidPlan {
                plan_id: "p".to_string(),
                reason: "no cycle".to_string()
            }
            .is_client_error()
        );
        assert_eq!(
            OrderError::ForeignAutoRenew {
                method: PaymentMethod::Stripe
            }
            .code(),
            "foreign_auto_renew"
        );
    }
}
