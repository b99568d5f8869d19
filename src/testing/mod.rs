//! Testing utilities.
//!
//! Fixtures for the common cases: a plan catalogue, memberships in various
//! states and confirmed orders to draw balances from. Pair them with
//! [`InMemoryOrderStore`](crate::storage::InMemoryOrderStore), whose
//! `fail_next` injects storage failures.

mod fixtures;

pub use fixtures::{TestMember, default_plans, fake, midnight, paid_order};
