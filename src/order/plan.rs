//! Plan configuration.
//!
//! Plans are defined in code with the builder:
//!
//! ```rust
//! use subs_ledger::order::Plans;
//! use subs_ledger::membership::{Cycle, Tier};
//!
//! let plans = Plans::builder()
//!     .plan("standard_year")
//!         .tier(Tier::Standard)
//!         .cycle(Cycle::Year)
//!         .price(25800)
//!         .done()
//!     .plan("premium_year")
//!         .tier(Tier::Premium)
//!         .cycle(Cycle::Year)
//!         .price(199800)
//!         .discount(20000)
//!         .done()
//!     .build();
//!
//! assert_eq!(plans.get("premium_year").unwrap().net_price(), 179800);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::OrderError;
use crate::membership::{Cycle, Tier};

/// A purchasable plan. All prices are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub tier: Tier,
    pub cycle: Cycle,
    /// List price.
    pub price: i64,
    /// Promotional discount subtracted from the list price.
    pub discount: i64,
    /// Lower-case ISO currency code.
    pub currency: String,
    pub description: Option<String>,
}

impl Plan {
    /// Price charged for a create or renew order.
    #[must_use]
    pub fn net_price(&self) -> i64 {
        (self.price - self.discount).max(0)
    }

    /// Reject plans that cannot produce a sensible order.
    pub fn validate(&self) -> Result<(), OrderError> {
        let invalid = |reason: &str| OrderError::InvalidPlan {
            plan_id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.tier == Tier::None {
            return Err(invalid("tier must not be none"));
        }
        if self.cycle == Cycle::None {
            return Err(invalid("cycle must not be none"));
        }
        if self.price <= 0 {
            return Err(invalid("price must be positive"));
        }
        if self.discount < 0 || self.discount > self.price {
            return Err(invalid("discount must be between 0 and the price"));
        }
        Ok(())
    }
}

/// A collection of plans keyed by id.
#[derive(Clone, Debug, Default)]
pub struct Plans {
    plans: HashMap<String, Plan>,
}

impl Plans {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> PlansBuilder {
        PlansBuilder::new()
    }

    pub fn add(&mut self, plan: Plan) {
        self.plans.insert(plan.id.clone(), plan);
    }

    #[must_use]
    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(plan_id)
    }

    /// Look up a plan, failing with [`OrderError::PlanNotFound`].
    pub fn require(&self, plan_id: &str) -> Result<&Plan, OrderError> {
        self.get(plan_id).ok_or_else(|| OrderError::PlanNotFound {
            plan_id: plan_id.to_string(),
        })
    }

    /// Find the plan selling `tier` on `cycle`.
    #[must_use]
    pub fn find(&self, tier: Tier, cycle: Cycle) -> Option<&Plan> {
        self.plans
            .values()
            .find(|p| p.tier == tier && p.cycle == cycle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Plan)> {
        self.plans.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Builder for a collection of plans.
#[derive(Debug, Default)]
pub struct PlansBuilder {
    plans: HashMap<String, Plan>,
}

impl PlansBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start defining a new plan.
    #[must_use]
    pub fn plan(self, id: &str) -> PlanBuilder {
        PlanBuilder {
            parent: self,
            plan: Plan {
                id: id.to_string(),
                tier: Tier::None,
                cycle: Cycle::None,
                price: 0,
                discount: 0,
                currency: "cny".to_string(),
                description: None,
            },
        }
    }

    #[must_use]
    pub fn build(self) -> Plans {
        Plans { plans: self.plans }
    }

    fn add_plan(mut self, plan: Plan) -> Self {
        self.plans.insert(plan.id.clone(), plan);
        self
    }
}

/// Builder for a single plan.
///
/// Plans are not validated here; the order builder refuses malformed plans
/// when they are used.
#[derive(Debug)]
pub struct PlanBuilder {
    parent: PlansBuilder,
    plan: Plan,
}

impl PlanBuilder {
    #[must_use]
    pub fn tier(mut self, tier: Tier) -> Self {
        self.plan.tier = tier;
        self
    }

    #[must_use]
    pub fn cycle(mut self, cycle: Cycle) -> Self {
        self.plan.cycle = cycle;
        self
    }

    /// List price in cents.
    #[must_use]
    pub fn price(mut self, cents: i64) -> Self {
        self.plan.price = cents;
        self
    }

    /// Discount in cents.
    #[must_use]
    pub fn discount(mut self, cents: i64) -> Self {
        self.plan.discount = cents;
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: &str) -> Self {
        self.plan.currency = currency.to_lowercase();
        self
    }

    #[must_use]
    pub fn description(mut self, desc: &str) -> Self {
        self.plan.description = Some(desc.to_string());
        self
    }

    /// Finish this plan and return to the parent builder.
    #[must_use]
    pub fn done(self) -> PlansBuilder {
        self.parent.add_plan(self.plan)
    }
}
