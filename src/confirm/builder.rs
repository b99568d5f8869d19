//! Applying a verified payment to an order and a membership.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::ConfirmError;
use crate::membership::{Membership, MembershipSnapshot, SnapshotReason, SubsKind, Tier};
use crate::order::{Order, PaymentResult};

/// Outcome of a successful confirmation, ready to be written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResult {
    /// The order with confirmation time and period filled in.
    pub order: Order,
    /// The membership rebuilt from the order.
    pub membership: Membership,
    /// The membership as it was before this confirmation.
    pub snapshot: MembershipSnapshot,
}

/// Validates a payment result and derives the new state.
///
/// The builder is pure: it reads the order and the locked membership and
/// never touches storage. Only its output may be used to mutate a
/// membership.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationBuilder;

impl ConfirmationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        result: &PaymentResult,
        order: &Order,
        member: &Membership,
    ) -> Result<ConfirmationResult, ConfirmError> {
        if result.order_id != order.id {
            return Err(ConfirmError::order_mismatch(&order.id, &result.order_id));
        }

        if order.is_confirmed() {
            return Err(ConfirmError::already_confirmed(&order.id));
        }

        if order.amount_in_cent() != result.amount_cents {
            return Err(ConfirmError::amount_mismatch(
                &order.id,
                order.amount_in_cent(),
                result.amount_cents,
            ));
        }

        let today = result.confirmed_utc.date_naive();

        if order.kind == SubsKind::Upgrade && member.is_valid(today) && member.tier == Tier::Premium {
            return Err(ConfirmError::duplicate_upgrade(&order.id));
        }

        let start = start_date(order, member, today);
        let Some(end) = order.period_end(start) else {
            tracing::error!(
                target: "subs_ledger::confirm",
                order_id = %order.id,
                cycle = %order.cycle,
                cycle_count = order.cycle_count,
                start = %start,
                "cannot compute end date for order"
            );
            return Err(ConfirmError::invalid_cycle(&order.id));
        };

        let snapshot = member
            .snapshot(SnapshotReason::from(order.kind), result.confirmed_utc)
            .with_order(order.id.clone());
        let snapshot_id = (!snapshot.is_empty()).then(|| snapshot.id.clone());

        let confirmed = order
            .confirmed(result.confirmed_utc, start, end, snapshot_id)
            .ok_or_else(|| ConfirmError::already_confirmed(&order.id))?;
        let membership = Membership::from_order(&confirmed, member);

        tracing::debug!(
            target: "subs_ledger::confirm",
            order_id = %confirmed.id,
            kind = %confirmed.kind,
            start = %start,
            end = %end,
            "order confirmed"
        );

        Ok(ConfirmationResult {
            order: confirmed,
            membership,
            snapshot,
        })
    }
}

/// A renewal continues from the current expiration. New, lapsed and
/// upgraded memberships start on the confirmation date.
fn start_date(order: &Order, member: &Membership, today: NaiveDate) -> NaiveDate {
    if member.is_zero() || member.is_expired(today) {
        return today;
    }
    match order.kind {
        SubsKind::Upgrade => today,
        SubsKind::Create | SubsKind::Renew => member.expire_date.unwrap_or(today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::ConfirmErrorKind;
    use crate::membership::{Cycle, PaymentMethod, ReaderIds};
    use chrono::{DateTime, NaiveTime, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap()).and_utc()
    }

    fn order(kind: SubsKind, tier: Tier, amount: i64) -> Order {
        Order {
            id: "FT00000000000000AA".to_string(),
            reader: ReaderIds::ftc("reader-1"),
            plan_id: format!("{}_year", tier),
            tier,
            cycle: Cycle::Year,
            price: amount,
            amount,
            currency: "cny".to_string(),
            cycle_count: 1,
            extra_days: 1,
            kind,
            payment_method: PaymentMethod::Alipay,
            created_utc: at(date(2024, 6, 1)),
            confirmed_utc: None,
            start_date: None,
            end_date: None,
            snapshot_id: None,
        }
    }

    fn member(tier: Tier, expire: NaiveDate) -> Membership {
        Membership {
            ids: ReaderIds::ftc("reader-1"),
            id: Some("mmb_000000000001".to_string()),
            tier,
            cycle: Cycle::Year,
            expire_date: Some(expire),
            payment_method: PaymentMethod::Wechat,
            ..Membership::default()
        }
    }

    #[test]
    fn test_create_starts_today() {
        let o = order(SubsKind::Create, Tier::Standard, 25800);
        let m = Membership::zero(ReaderIds::ftc("reader-1"));
        let result = PaymentResult::new(&o.id, 25800, at(date(2024, 6, 1)));

        let confirmed = ConfirmationBuilder::new().build(&result, &o, &m).unwrap();
        assert!(confirmed.snapshot.is_empty());
        assert_eq!(confirmed.order.start_date, Some(date(2024, 6, 1)));
        assert_eq!(confirmed.order.end_date, Some(date(2025, 6, 2)));
        assert_eq!(confirmed.order.snapshot_id, None);
        assert_eq!(confirmed.membership.tier, Tier::Standard);
        assert_eq!(confirmed.membership.expire_date, Some(date(2025, 6, 2)));
        assert!(confirmed.membership.id.as_deref().unwrap().starts_with("mmb_"));
    }

    #[test]
    fn test_renewal_is_contiguous() {
        let expire = date(2024, 9, 30);
        let o = order(SubsKind::Renew, Tier::Standard, 25800);
        let m = member(Tier::Standard, expire);
        let result = PaymentResult::new(&o.id, 25800, at(date(2024, 6, 1)));

        let confirmed = ConfirmationBuilder::new().build(&result, &o, &m).unwrap();
        assert_eq!(confirmed.order.start_date, Some(expire));
        assert_eq!(confirmed.order.end_date, Some(date(2025, 10, 1)));
        assert_eq!(confirmed.membership.id, m.id);
        assert_eq!(confirmed.snapshot.reason, SnapshotReason::Renew);
        assert_eq!(confirmed.order.snapshot_id, Some(confirmed.snapshot.id.clone()));
    }

    #[test]
    fn test_upgrade_restarts_on_confirmation() {
        let o = order(SubsKind::Upgrade, Tier::Premium, 187000);
        let m = member(Tier::Standard, date(2024, 12, 31));
        let result = PaymentResult::new(&o.id, 187000, at(date(2024, 6, 15)));

        let confirmed = ConfirmationBuilder::new().build(&result, &o, &m).unwrap();
        assert_eq!(confirmed.order.start_date, Some(date(2024, 6, 15)));
        assert_eq!(confirmed.membership.tier, Tier::Premium);
        assert_eq!(confirmed.snapshot.membership, m);
        assert_eq!(confirmed.snapshot.reason, SnapshotReason::Upgrade);
    }

    #[test]
    fn test_expired_membership_restarts_today() {
        let o = order(SubsKind::Create, Tier::Standard, 25800);
        let m = member(Tier::Standard, date(2023, 1, 1));
        let result = PaymentResult::new(&o.id, 25800, at(date(2024, 6, 1)));

        let confirmed = ConfirmationBuilder::new().build(&result, &o, &m).unwrap();
        assert_eq!(confirmed.order.start_date, Some(date(2024, 6, 1)));
        assert!(!confirmed.snapshot.is_empty());
    }

    #[test]
    fn test_already_confirmed() {
        let o = order(SubsKind::Create, Tier::Standard, 25800);
        let m = Membership::zero(ReaderIds::ftc("reader-1"));
        let result = PaymentResult::new(&o.id, 25800, at(date(2024, 6, 1)));
        let first = ConfirmationBuilder::new().build(&result, &o, &m).unwrap();

        let err = ConfirmationBuilder::new()
            .build(&result, &first.order, &first.membership)
            .unwrap_err();
        assert_eq!(err.kind, ConfirmErrorKind::AlreadyConfirmed);
        assert!(!err.retry);
    }

    #[test]
    fn test_amount_mismatch() {
        let o = order(SubsKind::Create, Tier::Standard, 25800);
        let m = Membership::zero(ReaderIds::ftc("reader-1"));

        for paid in [0, 1, 25799, 25801] {
            let result = PaymentResult::new(&o.id, paid, at(date(2024, 6, 1)));
            let err = ConfirmationBuilder::new().build(&result, &o, &m).unwrap_err();
            assert_eq!(err.kind, ConfirmErrorKind::AmountMismatch);
            assert!(!err.retry);
        }
    }

    #[test]
    fn test_duplicate_upgrade() {
        let o = order(SubsKind::Upgrade, Tier::Premium, 187000);
        let m = member(Tier::Premium, date(2025, 6, 1));
        let result = PaymentResult::new(&o.id, 187000, at(date(2024, 6, 1)));

        let err = ConfirmationBuilder::new().build(&result, &o, &m).unwrap_err();
        assert_eq!(err.kind, ConfirmErrorKind::DuplicateUpgrade);
        assert!(!err.retry);
    }

    #[test]
    fn test_invalid_cycle_is_retryable() {
        let mut o = order(SubsKind::Create, Tier::Standard, 25800);
        o.cycle = Cycle::None;
        let m = Membership::zero(ReaderIds::ftc("reader-1"));
        let result = PaymentResult::new(&o.id, 25800, at(date(2024, 6, 1)));

        let err = ConfirmationBuilder::new().build(&result, &o, &m).unwrap_err();
        assert_eq!(err.kind, ConfirmErrorKind::InvalidCycle);
        assert!(err.retry);
    }

    #[test]
    fn test_order_mismatch() {
        let o = order(SubsKind::Create, Tier::Standard, 25800);
        let m = Membership::zero(ReaderIds::ftc("reader-1"));
        let result = PaymentResult::new("FT00000000000000BB", 25800, at(date(2024, 6, 1)));

        let err = ConfirmationBuilder::new().build(&result, &o, &m).unwrap_err();
        assert_eq!(err.kind, ConfirmErrorKind::OrderMismatch);
    }
}
