//! Proration of unused subscription time.
//!
//! When a standard member upgrades, whatever they have paid for but not yet
//! used is credited toward the premium price. [`prorate`] values a single
//! paid order; [`Wallet::aggregate`] sums a reader's unconsumed orders.
//!
//! Wallets are computed inside the order-creation transaction and never
//! cached: a concurrent confirmation may consume a source at any time.

mod source;
mod wallet;

pub use source::{BalanceSource, prorate};
pub use wallet::{Duration, ProratedOrder, ProratedSource, Wallet};
