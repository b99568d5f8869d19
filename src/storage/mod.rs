//! Transactional storage for orders and memberships.
//!
//! The ledger never opens connections itself. It asks an [`OrderStore`] for
//! a transaction and performs every read and write of one operation through
//! the returned [`OrderTx`]. Reads of memberships and orders are locking
//! reads, so two confirmations touching the same rows run one after the
//! other.
//!
//! [`InMemoryOrderStore`] is provided for tests and single-process use.
//! With the `database` feature, `SeaOrmOrderStore` persists to SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::membership::{Membership, ReaderIds};
use crate::order::Order;
use crate::proration::{BalanceSource, ProratedOrder};

mod memory;
#[cfg(feature = "database")]
mod sea_orm_store;

pub use memory::{InMemoryOrderStore, InMemoryTx, StoreOperation};
#[cfg(feature = "database")]
pub use sea_orm_store::{SeaOrmOrderStore, SeaOrmTx};

/// Source of transactions.
#[async_trait]
pub trait OrderStore: Send + Sync {
    type Tx: OrderTx;

    /// Start a transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// One unit of work against the store.
///
/// Nothing written through a transaction is visible to others until
/// [`commit`](OrderTx::commit). Dropping a transaction without committing
/// discards its writes, but callers should still
/// [`rollback`](OrderTx::rollback) explicitly.
#[async_trait]
pub trait OrderTx: Send {
    /// Locked read of a reader's membership row. `None` when no row
    /// exists; a stored row may still hold the zero membership.
    async fn retrieve_member(&mut self, ids: &ReaderIds) -> Result<Option<Membership>>;

    /// Locked read of an order.
    async fn retrieve_order(&mut self, order_id: &str) -> Result<Option<Order>>;

    /// Insert a new, unconfirmed order.
    async fn save_order(&mut self, order: &Order) -> Result<()>;

    /// Write back the confirmation fields of an order.
    async fn update_confirmed_order(&mut self, order: &Order) -> Result<()>;

    /// Insert a membership row. Only called when no row exists.
    async fn create_member(&mut self, member: &Membership) -> Result<()>;

    async fn update_member(&mut self, member: &Membership) -> Result<()>;

    /// Confirmed orders of the reader whose period ends after `as_of` and
    /// whose balance has not been consumed by a confirmed upgrade.
    async fn find_proration_sources(
        &mut self,
        ids: &ReaderIds,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<BalanceSource>>;

    async fn save_proration_sources(&mut self, rows: &[ProratedOrder]) -> Result<()>;

    /// Flag every proration row of `upgrade_order_id` as consumed and
    /// return the rows that were flagged.
    async fn consume_proration_sources(
        &mut self,
        upgrade_order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<ProratedOrder>>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
