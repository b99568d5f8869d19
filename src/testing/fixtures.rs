//! Test fixtures for plans, memberships and orders.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::membership::{Cycle, Membership, PaymentMethod, ReaderIds, SubsKind, SubsStatus, Tier};
use crate::order::{Order, Plans, generate_order_id};

/// Helper functions for generating fake test data
pub mod fake {
    use super::*;

    /// Generate a fake FTC account id
    pub fn ftc_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generate a fake WeChat union id
    pub fn union_id() -> String {
        format!("oAbC{}", &Uuid::new_v4().simple().to_string()[..24])
    }

    /// Identity of a reader with only an FTC account
    pub fn reader() -> ReaderIds {
        ReaderIds::ftc(ftc_id())
    }
}

/// Midnight UTC at the start of `date`.
pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// The standard catalogue: standard monthly and yearly, premium yearly.
pub fn default_plans() -> Plans {
    Plans::builder()
        .plan("standard_month")
            .tier(Tier::Standard)
            .cycle(Cycle::Month)
            .price(3500)
            .done()
        .plan("standard_year")
            .tier(Tier::Standard)
            .cycle(Cycle::Year)
            .price(25800)
            .done()
        .plan("premium_year")
            .tier(Tier::Premium)
            .cycle(Cycle::Year)
            .price(199800)
            .done()
        .build()
}

/// Builder for membership fixtures
#[derive(Debug, Clone)]
pub struct TestMember {
    member: Membership,
}

impl TestMember {
    /// A yearly standard membership paid through Alipay.
    pub fn standard(ids: &ReaderIds, expire_date: NaiveDate) -> Self {
        Self::new(ids, Tier::Standard, expire_date)
    }

    /// A yearly premium membership paid through Alipay.
    pub fn premium(ids: &ReaderIds, expire_date: NaiveDate) -> Self {
        Self::new(ids, Tier::Premium, expire_date)
    }

    fn new(ids: &ReaderIds, tier: Tier, expire_date: NaiveDate) -> Self {
        Self {
            member: Membership {
                ids: ids.clone(),
                id: Some(crate::membership::generate_membership_id()),
                tier,
                cycle: Cycle::Year,
                expire_date: Some(expire_date),
                payment_method: PaymentMethod::Alipay,
                auto_renew: false,
                status: SubsStatus::None,
                foreign_sub_id: None,
            },
        }
    }

    /// Mark the membership as renewed by a gateway subscription.
    pub fn auto_renewing(mut self, method: PaymentMethod) -> Self {
        self.member.payment_method = method;
        self.member.auto_renew = true;
        self.member.status = SubsStatus::Active;
        self.member.foreign_sub_id = Some(format!("sub_{}", &Uuid::new_v4().simple().to_string()[..14]));
        self
    }

    pub fn with_status(mut self, status: SubsStatus) -> Self {
        self.member.status = status;
        self
    }

    pub fn build(self) -> Membership {
        self.member
    }
}

/// A confirmed order covering `start..end`, usable as a balance source.
pub fn paid_order(ids: &ReaderIds, amount: i64, start: NaiveDate, end: NaiveDate) -> Order {
    Order {
        id: generate_order_id(),
        reader: ids.clone(),
        plan_id: "standard_year".to_string(),
        tier: Tier::Standard,
        cycle: Cycle::Year,
        price: amount,
        amount,
        currency: "cny".to_string(),
        cycle_count: 1,
        extra_days: 1,
        kind: SubsKind::Create,
        payment_method: PaymentMethod::Wechat,
        created_utc: midnight(start),
        confirmed_utc: Some(midnight(start)),
        start_date: Some(start),
        end_date: Some(end),
        snapshot_id: None,
    }
}
