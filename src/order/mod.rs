//! Orders: plans, classification, pricing.
//!
//! An order is created when a reader starts a purchase and confirmed when
//! the payment gateway reports success. [`OrderBuilder`] decides whether the
//! purchase is a create, renew or upgrade and what it costs.

mod builder;
mod error;
mod model;
mod payment;
mod plan;

pub use builder::{OrderBuilder, OrderContext, OrderDraft, Pricing};
pub use error::OrderError;
pub use model::{Order, generate_order_id};
pub use payment::PaymentResult;
pub use plan::{Plan, PlanBuilder, Plans, PlansBuilder};
