//! Closed vocabularies shared by memberships and orders.
//!
//! Every enum parses from its wire string through [`FromStr`] and refuses
//! unknown values instead of falling back to a default.

use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Membership tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// No membership.
    #[default]
    None,
    Standard,
    Premium,
}

impl Tier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Standard => "standard",
            Self::Premium => "premium",
        }
    }

    /// Whether a member on `self` may upgrade to `target`.
    ///
    /// Standard to premium is the only upgrade path.
    #[must_use]
    pub fn can_upgrade_to(&self, target: Tier) -> bool {
        matches!((self, target), (Self::Standard, Tier::Premium))
    }
}

impl FromStr for Tier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            other => Err(LedgerError::invalid_input(format!("unknown tier '{}'", other))),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cycle {
    #[default]
    None,
    Month,
    Year,
}

impl Cycle {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Nominal length in days, used to price leftover balance.
    #[must_use]
    pub fn nominal_days(&self) -> Option<i64> {
        match self {
            Self::None => None,
            Self::Month => Some(30),
            Self::Year => Some(365),
        }
    }

    /// Add `count` cycles to `date` on the calendar.
    ///
    /// Returns `None` for [`Cycle::None`] or when the result overflows.
    #[must_use]
    pub fn add_to(&self, date: NaiveDate, count: u32) -> Option<NaiveDate> {
        let months = match self {
            Self::None => return None,
            Self::Month => count,
            Self::Year => count.checked_mul(12)?,
        };
        date.checked_add_months(Months::new(months))
    }
}

impl FromStr for Cycle {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(LedgerError::invalid_input(format!("unknown cycle '{}'", other))),
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a membership was paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    None,
    Alipay,
    Wechat,
    Stripe,
    Apple,
    B2b,
}

impl PaymentMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Alipay => "alipay",
            Self::Wechat => "wechat",
            Self::Stripe => "stripe",
            Self::Apple => "apple",
            Self::B2b => "b2b",
        }
    }

    /// Gateways that manage their own subscription objects and never
    /// produce ledger orders.
    #[must_use]
    pub fn is_gateway_managed(&self) -> bool {
        match self {
            Self::Stripe | Self::Apple => true,
            Self::None | Self::Alipay | Self::Wechat | Self::B2b => false,
        }
    }

    /// Gateways that settle one-off ledger orders.
    #[must_use]
    pub fn is_one_off(&self) -> bool {
        match self {
            Self::Alipay | Self::Wechat => true,
            Self::None | Self::Stripe | Self::Apple | Self::B2b => false,
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "alipay" => Ok(Self::Alipay),
            "wechat" => Ok(Self::Wechat),
            "stripe" => Ok(Self::Stripe),
            "apple" => Ok(Self::Apple),
            "b2b" => Ok(Self::B2b),
            other => Err(LedgerError::invalid_input(format!(
                "unknown payment method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription status reported by gateways with their own state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsStatus {
    /// Not managed by a gateway state machine.
    #[default]
    None,
    Active,
    Canceled,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Trialing,
    Unpaid,
}

impl SubsStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::PastDue => "past_due",
            Self::Trialing => "trialing",
            Self::Unpaid => "unpaid",
        }
    }

    /// Whether the gateway has given up on this subscription, so the reader
    /// may start a fresh one.
    #[must_use]
    pub fn permits_new_subscription(&self) -> bool {
        match self {
            Self::Canceled | Self::IncompleteExpired | Self::PastDue | Self::Unpaid => true,
            Self::None | Self::Active | Self::Incomplete | Self::Trialing => false,
        }
    }
}

impl FromStr for SubsStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "incomplete" => Ok(Self::Incomplete),
            "incomplete_expired" => Ok(Self::IncompleteExpired),
            "past_due" => Ok(Self::PastDue),
            "trialing" => Ok(Self::Trialing),
            "unpaid" => Ok(Self::Unpaid),
            other => Err(LedgerError::invalid_input(format!(
                "unknown subscription status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SubsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Purpose of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsKind {
    Create,
    Renew,
    Upgrade,
}

impl SubsKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Renew => "renew",
            Self::Upgrade => "upgrade",
        }
    }
}

impl FromStr for SubsKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "renew" => Ok(Self::Renew),
            "upgrade" => Ok(Self::Upgrade),
            other => Err(LedgerError::invalid_input(format!("unknown order kind '{}'", other))),
        }
    }
}

impl fmt::Display for SubsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a membership snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReason {
    Create,
    Renew,
    Upgrade,
    /// Overwritten by a gateway-managed subscription notification.
    Webhook,
}

impl SnapshotReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Renew => "renew",
            Self::Upgrade => "upgrade",
            Self::Webhook => "webhook",
        }
    }
}

impl From<SubsKind> for SnapshotReason {
    fn from(kind: SubsKind) -> Self {
        match kind {
            SubsKind::Create => Self::Create,
            SubsKind::Renew => Self::Renew,
            SubsKind::Upgrade => Self::Upgrade,
        }
    }
}

impl FromStr for SnapshotReason {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "renew" => Ok(Self::Renew),
            "upgrade" => Ok(Self::Upgrade),
            "webhook" => Ok(Self::Webhook),
            other => Err(LedgerError::invalid_input(format!(
                "unknown snapshot reason '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for SnapshotReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
