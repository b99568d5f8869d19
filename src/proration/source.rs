//! Unused value of previously paid orders.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order::Order;

/// Cents in one whole currency unit.
const CENTS_PER_UNIT: i64 = 100;

/// A confirmed order whose paid period has not run out yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSource {
    pub order_id: String,
    /// Amount paid, in cents.
    pub amount: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BalanceSource {
    /// Source for a confirmed order. Unconfirmed orders carry no balance.
    #[must_use]
    pub fn from_order(order: &Order) -> Option<Self> {
        if !order.is_confirmed() {
            return None;
        }
        Some(Self {
            order_id: order.id.clone(),
            amount: order.amount,
            start_date: order.start_date?,
            end_date: order.end_date?,
        })
    }

    /// Whether any paid time remains after `as_of`.
    #[must_use]
    pub fn is_active(&self, as_of: DateTime<Utc>) -> bool {
        day_start(self.end_date) > as_of
    }
}

/// Remaining value of `source` at `as_of`, in cents.
///
/// Before the period starts the whole payment is returned. Otherwise the
/// payment is scaled by the share of time left and rounded up to a whole
/// currency unit. A remainder worth less than one unit is kept as is so it
/// never rounds to zero.
#[must_use]
pub fn prorate(source: &BalanceSource, as_of: DateTime<Utc>) -> i64 {
    let start = day_start(source.start_date);
    let end = day_start(source.end_date);

    if source.amount <= 0 || end <= as_of || end <= start {
        return 0;
    }
    if as_of < start {
        return source.amount;
    }

    let total = i128::from((end - start).num_seconds());
    let remaining = i128::from((end - as_of).num_seconds());
    let amount = i128::from(source.amount);

    // Ceiling division keeps a sub-cent remainder from vanishing.
    let raw = (amount * remaining + total - 1) / total;
    let raw = i64::try_from(raw).unwrap_or(source.amount);

    let balance = if raw >= CENTS_PER_UNIT {
        (raw + CENTS_PER_UNIT - 1) / CENTS_PER_UNIT * CENTS_PER_UNIT
    } else {
        raw
    };

    balance.min(source.amount)
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
