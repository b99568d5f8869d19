//! The membership entity.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::enums::{Cycle, PaymentMethod, SubsStatus, Tier};
use crate::order::Order;

/// Identity of a reader.
///
/// A reader may sign in with an FTC account, a WeChat account, or both
/// once the two have been linked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ReaderIds {
    /// FTC account id.
    pub ftc_id: Option<String>,
    /// WeChat union id.
    pub union_id: Option<String>,
}

impl ReaderIds {
    /// Identity for an FTC account.
    #[must_use]
    pub fn ftc(id: impl Into<String>) -> Self {
        Self {
            ftc_id: Some(id.into()),
            union_id: None,
        }
    }

    /// Identity for a WeChat-only account.
    #[must_use]
    pub fn wechat(union_id: impl Into<String>) -> Self {
        Self {
            ftc_id: None,
            union_id: Some(union_id.into()),
        }
    }

    /// Identity for linked FTC and WeChat accounts.
    #[must_use]
    pub fn linked(ftc_id: impl Into<String>, union_id: impl Into<String>) -> Self {
        Self {
            ftc_id: Some(ftc_id.into()),
            union_id: Some(union_id.into()),
        }
    }

    /// The id used as primary key: FTC id if present, otherwise union id.
    #[must_use]
    pub fn compound_id(&self) -> Option<&str> {
        self.ftc_id.as_deref().or(self.union_id.as_deref())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ftc_id.is_none() && self.union_id.is_none()
    }

    /// Whether two identities share at least one id.
    #[must_use]
    pub fn overlaps(&self, other: &ReaderIds) -> bool {
        let same = |a: &Option<String>, b: &Option<String>| matches!((a, b), (Some(x), Some(y)) if x == y);
        same(&self.ftc_id, &other.ftc_id) || same(&self.union_id, &other.union_id)
    }

    /// Union of two identities. Ids already on `self` win.
    #[must_use]
    pub fn merge(&self, other: &ReaderIds) -> ReaderIds {
        ReaderIds {
            ftc_id: self.ftc_id.clone().or_else(|| other.ftc_id.clone()),
            union_id: self.union_id.clone().or_else(|| other.union_id.clone()),
        }
    }
}

/// A reader's current subscription state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Membership {
    pub ids: ReaderIds,
    /// Opaque membership id, `mmb_` followed by 12 hex characters.
    pub id: Option<String>,
    pub tier: Tier,
    pub cycle: Cycle,
    pub expire_date: Option<NaiveDate>,
    pub payment_method: PaymentMethod,
    pub auto_renew: bool,
    pub status: SubsStatus,
    /// Stripe subscription id or Apple original transaction id.
    pub foreign_sub_id: Option<String>,
}

impl Membership {
    /// The "no membership" value for a reader.
    #[must_use]
    pub fn zero(ids: ReaderIds) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.tier == Tier::None
    }

    /// Expired means the expiration date has passed and nothing will renew it.
    ///
    /// An auto-renewing membership past its nominal date stays valid until
    /// the gateway actually cancels it.
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self.expire_date {
            Some(date) => date < today && !self.auto_renew,
            None => !self.auto_renew,
        }
    }

    #[must_use]
    pub fn is_valid(&self, today: NaiveDate) -> bool {
        !self.is_zero() && !self.is_expired(today)
    }

    /// Whether a renewal bought today keeps the expiration inside the
    /// stacking cap of `window_years`.
    #[must_use]
    pub fn within_renewal_window(&self, today: NaiveDate, window_years: u32) -> bool {
        let Some(expire_date) = self.expire_date else {
            return true;
        };
        match today.checked_add_months(Months::new(window_years.saturating_mul(12))) {
            Some(limit) => expire_date <= limit,
            None => true,
        }
    }

    /// Valid membership renewed by Stripe or Apple on its own schedule.
    #[must_use]
    pub fn is_gateway_auto_renewing(&self, today: NaiveDate) -> bool {
        self.is_valid(today) && self.auto_renew && self.payment_method.is_gateway_managed()
    }

    /// Rebuild a membership from a confirmed order.
    ///
    /// Keeps the existing membership id and every reader id already on the
    /// row, or generates an id for a first purchase. Gateway-specific fields
    /// are cleared because one-off orders never auto-renew.
    #[must_use]
    pub fn from_order(order: &Order, previous: &Membership) -> Self {
        Self {
            ids: previous.ids.merge(&order.reader),
            id: previous.id.clone().or_else(|| Some(generate_membership_id())),
            tier: order.tier,
            cycle: order.cycle,
            expire_date: order.end_date,
            payment_method: order.payment_method,
            auto_renew: false,
            status: SubsStatus::None,
            foreign_sub_id: None,
        }
    }
}

/// Generate an opaque membership id.
#[must_use]
pub fn generate_membership_id() -> String {
    format!("mmb_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}
