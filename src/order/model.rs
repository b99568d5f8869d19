//! The order entity.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::membership::{Cycle, PaymentMethod, ReaderIds, SubsKind, Tier};

/// A priced purchase commitment, confirmed once payment is verified.
///
/// Amounts are integer cents. After confirmation the price, start date and
/// end date never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// `FT` followed by 16 upper-case hex characters.
    pub id: String,
    pub reader: ReaderIds,
    pub plan_id: String,
    pub tier: Tier,
    pub cycle: Cycle,
    /// List price of the plan at purchase time.
    pub price: i64,
    /// Amount the reader is charged.
    pub amount: i64,
    pub currency: String,
    /// Number of cycles purchased.
    pub cycle_count: u32,
    /// Days granted on top of the cycles.
    pub extra_days: u32,
    pub kind: SubsKind,
    pub payment_method: PaymentMethod,
    pub created_utc: DateTime<Utc>,
    pub confirmed_utc: Option<DateTime<Utc>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Snapshot of the membership this order replaced, set on confirmation.
    pub snapshot_id: Option<String>,
}

impl Order {
    /// The amount the gateway must report, compared exactly.
    #[must_use]
    pub fn amount_in_cent(&self) -> i64 {
        self.amount
    }

    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_utc.is_some()
    }

    /// Orders fully paid by the reader's balance skip the gateway.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.amount == 0
    }

    /// End of the purchased period when it starts on `start`.
    ///
    /// `None` when the cycle is unsupported or the date overflows.
    #[must_use]
    pub fn period_end(&self, start: NaiveDate) -> Option<NaiveDate> {
        self.cycle
            .add_to(start, self.cycle_count)?
            .checked_add_days(Days::new(u64::from(self.extra_days)))
    }

    /// Confirmed copy of this order.
    ///
    /// Returns `None` if the order was already confirmed, since confirmed
    /// orders are immutable.
    #[must_use]
    pub fn confirmed(
        &self,
        confirmed_utc: DateTime<Utc>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        snapshot_id: Option<String>,
    ) -> Option<Order> {
        if self.is_confirmed() {
            return None;
        }
        Some(Order {
            confirmed_utc: Some(confirmed_utc),
            start_date: Some(start_date),
            end_date: Some(end_date),
            snapshot_id,
            ..self.clone()
        })
    }
}

/// Generate an order id safe for every gateway's out-trade-no field.
#[must_use]
pub fn generate_order_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().r#gen();
    let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    format!("FT{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order {
            id: generate_order_id(),
            reader: ReaderIds::ftc("reader-1"),
            plan_id: "standard_year".to_string(),
            tier: Tier::Standard,
            cycle: Cycle::Year,
            price: 25800,
            amount: 25800,
            currency: "cny".to_string(),
            cycle_count: 1,
            extra_days: 1,
            kind: SubsKind::Create,
            payment_method: PaymentMethod::Alipay,
            created_utc: Utc::now(),
            confirmed_utc: None,
            start_date: None,
            end_date: None,
            snapshot_id: None,
        }
    }

    #[test]
    fn test_order_id_format() {
        let id = generate_order_id();
        assert_eq!(id.len(), 18);
        assert!(id.starts_with("FT"));
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_period_end_adds_cycles_and_days() {
        let o = order();
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(o.period_end(start), NaiveDate::from_ymd_opt(2025, 3, 2));
    }

    #[test]
    fn test_period_end_unsupported_cycle() {
        let mut o = order();
        o.cycle = Cycle::None;
        assert_eq!(o.period_end(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()), None);
    }

    #[test]
    fn test_confirmed_once() {
        let o = order();
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = o.period_end(start).unwrap();
        let confirmed = o.confirmed(Utc::now(), start, end, None).unwrap();

        assert!(confirmed.is_confirmed());
        assert_eq!(confirmed.start_date, Some(start));
        assert!(confirmed.confirmed(Utc::now(), end, end, None).is_none());
    }
}
