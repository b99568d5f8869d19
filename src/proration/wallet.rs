//! Wallet: the total balance a reader can apply toward an upgrade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source::{BalanceSource, prorate};
use crate::order::Plan;

/// A source together with its balance at the wallet's reference instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProratedSource {
    pub source: BalanceSource,
    /// Remaining value in cents.
    pub balance: i64,
}

/// Audit row linking a source order to the upgrade that draws on it.
///
/// Rows are written with the upgrade order, before payment, and flagged
/// consumed once that upgrade is confirmed. A consumed source never counts
/// toward another wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProratedOrder {
    pub source_order_id: String,
    pub balance: i64,
    pub created_utc: DateTime<Utc>,
    pub consumed_utc: Option<DateTime<Utc>>,
    pub upgrade_order_id: String,
}

impl ProratedOrder {
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed_utc.is_some()
    }
}

/// Purchased duration in cycles plus days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub cycle_count: u32,
    pub extra_days: u32,
}

/// Balance computed fresh from a reader's unconsumed sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Sum of all source balances, in cents.
    pub balance: i64,
    pub sources: Vec<ProratedSource>,
    pub as_of: DateTime<Utc>,
}

impl Wallet {
    #[must_use]
    pub fn empty(as_of: DateTime<Utc>) -> Self {
        Self {
            balance: 0,
            sources: Vec::new(),
            as_of,
        }
    }

    /// Prorate every source at `as_of` and sum the results.
    ///
    /// Sources with nothing left are dropped so they do not appear in the
    /// audit trail.
    #[must_use]
    pub fn aggregate(sources: Vec<BalanceSource>, as_of: DateTime<Utc>) -> Self {
        let sources: Vec<ProratedSource> = sources
            .into_iter()
            .map(|source| {
                let balance = prorate(&source, as_of);
                ProratedSource { source, balance }
            })
            .filter(|p| p.balance > 0)
            .collect();

        let balance = sources.iter().map(|p| p.balance).sum();

        Self {
            balance,
            sources,
            as_of,
        }
    }

    /// Whether the balance pays for `plan` outright.
    #[must_use]
    pub fn covers(&self, plan: &Plan) -> bool {
        self.balance >= plan.price
    }

    /// Convert a balance that covers `plan` into purchased time.
    ///
    /// Whole multiples of the price become cycles. The leftover is priced
    /// at the plan's daily rate and rounded up to whole days, then
    /// `extra_days` is added. Returns `None` when the balance does not
    /// cover the plan or the plan has no cycle.
    #[must_use]
    pub fn convert_balance(&self, plan: &Plan, extra_days: u32) -> Option<Duration> {
        if plan.price <= 0 || !self.covers(plan) {
            return None;
        }
        let days_per_cycle = plan.cycle.nominal_days()?;

        let cycles = self.balance / plan.price;
        let leftover = self.balance % plan.price;
        let leftover_days = (leftover * days_per_cycle + plan.price - 1) / plan.price;

        Some(Duration {
            cycle_count: u32::try_from(cycles).ok()?,
            extra_days: u32::try_from(leftover_days).ok()?.checked_add(extra_days)?,
        })
    }

    /// Audit rows for an upgrade order that draws on this wallet.
    #[must_use]
    pub fn prorated_orders(&self, upgrade_order_id: &str) -> Vec<ProratedOrder> {
        self.sources
            .iter()
            .map(|p| ProratedOrder {
                source_order_id: p.source.order_id.clone(),
                balance: p.balance,
                created_utc: self.as_of,
                consumed_utc: None,
                upgrade_order_id: upgrade_order_id.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{Cycle, Tier};
    use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime};

    fn premium_year() -> Plan {
        Plan {
            id: "premium_year".to_string(),
            tier: Tier::Premium,
            cycle: Cycle::Year,
            price: 199800,
            discount: 0,
            currency: "cny".to_string(),
            description: None,
        }
    }

    fn source(id: &str, amount: i64, start: NaiveDate, end: NaiveDate) -> BalanceSource {
        BalanceSource {
            order_id: id.to_string(),
            amount,
            start_date: start,
            end_date: end,
        }
    }

    fn at(date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc()
    }

    #[test]
    fn test_aggregate_sums_sources() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let as_of = at(d(1, 6));
        let wallet = Wallet::aggregate(
            vec![
                // Half used.
                source("FT01", 25800, d(1, 1), d(1, 11)),
                // Not started yet.
                source("FT02", 25800, d(1, 11), d(1, 21)),
                // Already over.
                source("FT03", 25800, d(1, 1), d(1, 5)),
            ],
            as_of,
        );

        assert_eq!(wallet.sources.len(), 2);
        assert_eq!(wallet.balance, 12900 + 25800);
        assert_eq!(wallet.as_of, as_of);
    }

    #[test]
    fn test_prorated_orders_are_pending() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let wallet = Wallet::aggregate(vec![source("FT01", 25800, d(1, 1), d(1, 11))], at(d(1, 6)));

        let rows = wallet.prorated_orders("FTUPGRADE");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_order_id, "FT01");
        assert_eq!(rows[0].upgrade_order_id, "FTUPGRADE");
        assert_eq!(rows[0].balance, 12900);
        assert!(!rows[0].is_consumed());
    }

    #[test]
    fn test_convert_balance() {
        let plan = premium_year();
        let now = Utc::now();

        let mut wallet = Wallet::empty(now);
        wallet.balance = plan.price - 1;
        assert_eq!(wallet.convert_balance(&plan, 1), None);

        wallet.balance = plan.price;
        assert_eq!(
            wallet.convert_balance(&plan, 1),
            Some(Duration {
                cycle_count: 1,
                extra_days: 1
            })
        );

        // Half a year left over: 182.5 days rounds up to 183.
        wallet.balance = plan.price * 2 + plan.price / 2;
        assert_eq!(
            wallet.convert_balance(&plan, 1),
            Some(Duration {
                cycle_count: 2,
                extra_days: 184
            })
        );
    }

    #[test]
    fn test_empty_wallet() {
        let wallet = Wallet::empty(Utc::now() - ChronoDuration::seconds(1));
        assert_eq!(wallet.balance, 0);
        assert!(wallet.prorated_orders("FT01").is_empty());
        assert!(!wallet.covers(&premium_year()));
    }
}
