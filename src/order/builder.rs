//! Order classification and pricing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::OrderError;
use super::model::{Order, generate_order_id};
use super::plan::Plan;
use crate::config::LedgerConfig;
use crate::membership::{Membership, PaymentMethod, ReaderIds, SubsKind};
use crate::proration::{ProratedOrder, Wallet};

/// Everything needed to build one order.
#[derive(Debug, Clone, Copy)]
pub struct OrderContext<'a> {
    pub reader: &'a ReaderIds,
    pub plan: &'a Plan,
    pub payment_method: PaymentMethod,
    /// Current membership, read under lock.
    pub member: &'a Membership,
    pub now: DateTime<Utc>,
}

/// An unsaved order and the proration rows to persist with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub order: Order,
    /// Empty unless the order is an upgrade drawing on a balance.
    pub prorated: Vec<ProratedOrder>,
}

impl OrderDraft {
    /// Balance applied toward this order, in cents.
    #[must_use]
    pub fn applied_balance(&self) -> i64 {
        self.prorated.iter().map(|p| p.balance).sum()
    }
}

/// What a draft order costs and how long it lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub amount: i64,
    pub cycle_count: u32,
    pub extra_days: u32,
}

/// Decides which kind of order a reader may place and prices it.
#[derive(Debug, Clone)]
pub struct OrderBuilder {
    renewal_window_years: u32,
    extra_days: u32,
    currency: String,
}

impl OrderBuilder {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            renewal_window_years: config.renewal_window_years,
            extra_days: config.extra_days,
            currency: config.currency.clone(),
        }
    }

    /// Classify a purchase of `plan` against the current membership.
    ///
    /// The rules are tried top to bottom and the first match wins.
    pub fn classify(
        &self,
        member: &Membership,
        plan: &Plan,
        today: chrono::NaiveDate,
    ) -> Result<SubsKind, OrderError> {
        if member.is_zero() || member.is_expired(today) {
            return Ok(SubsKind::Create);
        }

        if member.status.permits_new_subscription() {
            return Ok(SubsKind::Create);
        }

        if member.is_gateway_auto_renewing(today) {
            return Err(OrderError::ForeignAutoRenew {
                method: member.payment_method,
            });
        }

        if member.tier == plan.tier {
            if member.within_renewal_window(today, self.renewal_window_years) {
                return Ok(SubsKind::Renew);
            }
            return Err(OrderError::RenewalWindowExceeded {
                expire_date: member.expire_date.unwrap_or(today),
                window_years: self.renewal_window_years,
            });
        }

        if member.tier.can_upgrade_to(plan.tier) {
            return Ok(SubsKind::Upgrade);
        }

        Err(OrderError::DowngradeNotAllowed {
            current: member.tier,
            target: plan.tier,
        })
    }

    /// Price an order of `kind`.
    ///
    /// New and renewed memberships pay the discounted price. Upgrades pay the
    /// list price less the wallet balance, never below zero. A balance that
    /// covers the price is turned into time instead.
    #[must_use]
    pub fn price(&self, kind: SubsKind, plan: &Plan, wallet: &Wallet) -> Pricing {
        let standard = Pricing {
            amount: plan.net_price(),
            cycle_count: 1,
            extra_days: self.extra_days,
        };

        match kind {
            SubsKind::Create | SubsKind::Renew => standard,
            SubsKind::Upgrade => match wallet.convert_balance(plan, self.extra_days) {
                Some(duration) => Pricing {
                    amount: 0,
                    cycle_count: duration.cycle_count,
                    extra_days: duration.extra_days,
                },
                None => Pricing {
                    amount: (plan.price - wallet.balance).max(0),
                    ..standard
                },
            },
        }
    }

    /// Validate a purchase request and decide its kind.
    ///
    /// This is the only place an order is accepted or refused. The returned
    /// kind decides whether a wallet is needed and is then passed to
    /// [`build`](Self::build).
    pub fn check(&self, ctx: OrderContext<'_>) -> Result<SubsKind, OrderError> {
        if ctx.reader.is_empty() {
            return Err(OrderError::MissingReader);
        }

        if !ctx.payment_method.is_one_off() {
            return Err(OrderError::UnsupportedPaymentMethod {
                method: ctx.payment_method,
            });
        }

        ctx.plan.validate()?;
        if ctx.plan.currency != self.currency {
            return Err(OrderError::InvalidPlan {
                plan_id: ctx.plan.id.clone(),
                reason: format!("currency '{}' is not settled here", ctx.plan.currency),
            });
        }

        self.classify(ctx.member, ctx.plan, ctx.now.date_naive())
    }

    /// Build an unsaved order of `kind`, as returned by [`check`](Self::check).
    ///
    /// `wallet` is only read for upgrades.
    #[must_use]
    pub fn build(&self, ctx: OrderContext<'_>, kind: SubsKind, wallet: &Wallet) -> OrderDraft {
        let pricing = self.price(kind, ctx.plan, wallet);

        let order = Order {
            id: generate_order_id(),
            reader: ctx.reader.clone(),
            plan_id: ctx.plan.id.clone(),
            tier: ctx.plan.tier,
            cycle: ctx.plan.cycle,
            price: ctx.plan.price,
            amount: pricing.amount,
            currency: ctx.plan.currency.clone(),
            cycle_count: pricing.cycle_count,
            extra_days: pricing.extra_days,
            kind,
            payment_method: ctx.payment_method,
            created_utc: ctx.now,
            confirmed_utc: None,
            start_date: None,
            end_date: None,
            snapshot_id: None,
        };

        let prorated = match kind {
            SubsKind::Upgrade => wallet.prorated_orders(&order.id),
            SubsKind::Create | SubsKind::Renew => Vec::new(),
        };

        OrderDraft { order, prorated }
    }
}
