//! In-memory order store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{OrderStore, OrderTx};
use crate::error::{LedgerError, Result};
use crate::membership::{Membership, ReaderIds};
use crate::order::Order;
use crate::proration::{BalanceSource, ProratedOrder};

/// Store operations that can be made to fail in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Begin,
    RetrieveMember,
    RetrieveOrder,
    SaveOrder,
    UpdateConfirmedOrder,
    CreateMember,
    UpdateMember,
    FindProrationSources,
    SaveProrationSources,
    ConsumeProrationSources,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    /// Keyed by compound id.
    members: HashMap<String, Membership>,
    orders: HashMap<String, Order>,
    prorated: Vec<ProratedOrder>,
}

impl Tables {
    fn find_member(&self, ids: &ReaderIds) -> Option<(&String, &Membership)> {
        self.members.iter().find(|(_, m)| m.ids.overlaps(ids))
    }

    fn is_consumed(&self, source_order_id: &str) -> bool {
        self.prorated
            .iter()
            .any(|p| p.source_order_id == source_order_id && p.is_consumed())
    }
}

type Faults = Arc<StdMutex<HashMap<StoreOperation, u32>>>;

/// In-memory order store for tests and single-process use.
///
/// A transaction holds the store's lock from `begin` until it commits or
/// is dropped, so transactions run strictly one at a time. Writes go to a
/// private copy of the tables that replaces the shared one on commit.
///
/// Cloning is cheap; clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<Mutex<Tables>>,
    faults: Faults,
}

impl InMemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `operation` fail with a database error.
    pub fn fail_next(&self, operation: StoreOperation, times: u32) {
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.insert(operation, times);
    }

    /// Seed a membership outside any transaction.
    pub async fn insert_member(&self, member: Membership) -> Result<()> {
        let key = member_key(&member.ids)?;
        self.tables.lock().await.members.insert(key, member);
        Ok(())
    }

    /// Seed an order outside any transaction.
    pub async fn insert_order(&self, order: Order) {
        self.tables.lock().await.orders.insert(order.id.clone(), order);
    }

    /// Committed membership of a reader.
    pub async fn member(&self, ids: &ReaderIds) -> Option<Membership> {
        let tables = self.tables.lock().await;
        tables.find_member(ids).map(|(_, m)| m.clone())
    }

    /// Committed order.
    pub async fn order(&self, order_id: &str) -> Option<Order> {
        self.tables.lock().await.orders.get(order_id).cloned()
    }

    /// Committed proration rows.
    pub async fn prorated_orders(&self) -> Vec<ProratedOrder> {
        self.tables.lock().await.prorated.clone()
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }
}

fn check_fault(faults: &Faults, operation: StoreOperation) -> Result<()> {
    let mut faults = faults.lock().unwrap_or_else(|e| e.into_inner());
    match faults.get_mut(&operation) {
        Some(remaining) if *remaining > 0 => {
            *remaining -= 1;
            Err(LedgerError::database(format!("injected failure in {:?}", operation)))
        }
        _ => Ok(()),
    }
}

fn member_key(ids: &ReaderIds) -> Result<String> {
    ids.compound_id()
        .map(str::to_string)
        .ok_or_else(|| LedgerError::invalid_input("membership has no reader id"))
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        check_fault(&self.faults, StoreOperation::Begin)?;
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }
}

/// Transaction over an [`InMemoryOrderStore`].
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Faults,
}

impl InMemoryTx {
    fn check(&self, operation: StoreOperation) -> Result<()> {
        check_fault(&self.faults, operation)
    }
}

#[async_trait]
impl OrderTx for InMemoryTx {
    async fn retrieve_member(&mut self, ids: &ReaderIds) -> Result<Option<Membership>> {
        self.check(StoreOperation::RetrieveMember)?;
        Ok(self.working.find_member(ids).map(|(_, m)| m.clone()))
    }

    async fn retrieve_order(&mut self, order_id: &str) -> Result<Option<Order>> {
        self.check(StoreOperation::RetrieveOrder)?;
        Ok(self.working.orders.get(order_id).cloned())
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        self.check(StoreOperation::SaveOrder)?;
        if self.working.orders.contains_key(&order.id) {
            return Err(LedgerError::database(format!(
                "duplicate order id {}",
                order.id
            )));
        }
        self.working.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn update_confirmed_order(&mut self, order: &Order) -> Result<()> {
        self.check(StoreOperation::UpdateConfirmedOrder)?;
        let stored = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| LedgerError::not_found(format!("order {}", order.id)))?;
        stored.confirmed_utc = order.confirmed_utc;
        stored.start_date = order.start_date;
        stored.end_date = order.end_date;
        stored.snapshot_id = order.snapshot_id.clone();
        Ok(())
    }

    async fn create_member(&mut self, member: &Membership) -> Result<()> {
        self.check(StoreOperation::CreateMember)?;
        let key = member_key(&member.ids)?;
        if self.working.find_member(&member.ids).is_some() {
            return Err(LedgerError::database(format!("membership {} already exists", key)));
        }
        self.working.members.insert(key, member.clone());
        Ok(())
    }

    async fn update_member(&mut self, member: &Membership) -> Result<()> {
        self.check(StoreOperation::UpdateMember)?;
        let key = match self.working.find_member(&member.ids) {
            Some((key, _)) => key.clone(),
            None => {
                return Err(LedgerError::not_found(format!(
                    "membership for {:?}",
                    member.ids.compound_id()
                )));
            }
        };
        self.working.members.insert(key, member.clone());
        Ok(())
    }

    async fn find_proration_sources(
        &mut self,
        ids: &ReaderIds,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<BalanceSource>> {
        self.check(StoreOperation::FindProrationSources)?;
        let mut sources: Vec<BalanceSource> = self
            .working
            .orders
            .values()
            .filter(|o| o.reader.overlaps(ids))
            .filter_map(BalanceSource::from_order)
            .filter(|s| s.is_active(as_of) && !self.working.is_consumed(&s.order_id))
            .collect();
        sources.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(sources)
    }

    async fn save_proration_sources(&mut self, rows: &[ProratedOrder]) -> Result<()> {
        self.check(StoreOperation::SaveProrationSources)?;
        self.working.prorated.extend_from_slice(rows);
        Ok(())
    }

    async fn consume_proration_sources(
        &mut self,
        upgrade_order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<ProratedOrder>> {
        self.check(StoreOperation::ConsumeProrationSources)?;
        let mut consumed = Vec::new();
        for row in self
            .working
            .prorated
            .iter_mut()
            .filter(|p| p.upgrade_order_id == upgrade_order_id && !p.is_consumed())
        {
            row.consumed_utc = Some(at);
            consumed.push(row.clone());
        }
        Ok(consumed)
    }

    async fn commit(mut self) -> Result<()> {
        self.check(StoreOperation::Commit)?;
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{Cycle, PaymentMethod, SubsKind, Tier};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn order(id: &str, reader: &ReaderIds, end: Option<NaiveDate>) -> Order {
        Order {
            id: id.to_string(),
            reader: reader.clone(),
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
            confirmed_utc: end.map(|_| Utc::now()),
            start_date: end.map(|_| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            end_date: end,
            snapshot_id: None,
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryOrderStore::new();
        let reader = ReaderIds::ftc("reader-1");

        let mut tx = store.begin().await.unwrap();
        tx.save_order(&order("FT01", &reader, None)).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.order("FT01").await.is_some());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryOrderStore::new();
        let reader = ReaderIds::ftc("reader-1");

        let mut tx = store.begin().await.unwrap();
        tx.save_order(&order("FT01", &reader, None)).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.order("FT01").await.is_none());

        let mut tx = store.begin().await.unwrap();
        tx.save_order(&order("FT02", &reader, None)).await.unwrap();
        drop(tx);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_and_zero_members_are_distinct() {
        let store = InMemoryOrderStore::new();
        let reader = ReaderIds::wechat("union-1");
        let mut tx = store.begin().await.unwrap();
        assert!(tx.retrieve_member(&reader).await.unwrap().is_none());
        drop(tx);

        store.insert_member(Membership::zero(reader.clone())).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let stored = tx.retrieve_member(&reader).await.unwrap().unwrap();
        assert!(stored.is_zero());
        assert!(tx.create_member(&stored).await.is_err());
    }

    #[tokio::test]
    async fn test_transactions_are_serialized() {
        let store = InMemoryOrderStore::new();
        let tx = store.begin().await.unwrap();

        let other = store.clone();
        let waiting = tokio::spawn(async move { other.begin().await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        tx.rollback().await.unwrap();
        waiting.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_proration_sources_exclude_consumed() {
        let store = InMemoryOrderStore::new();
        let reader = ReaderIds::ftc("reader-1");
        let end = NaiveDate::from_ymd_opt(2099, 1, 1);
        store.insert_order(order("FT01", &reader, end)).await;
        store.insert_order(order("FT02", &reader, end)).await;
        store.insert_order(order("FT03", &reader, None)).await;
        store
            .insert_order(order("FT04", &ReaderIds::ftc("reader-2"), end))
            .await;

        let mut tx = store.begin().await.unwrap();
        let sources = tx.find_proration_sources(&reader, Utc::now()).await.unwrap();
        assert_eq!(sources.len(), 2);

        tx.save_proration_sources(&[ProratedOrder {
            source_order_id: "FT01".to_string(),
            balance: 100,
            created_utc: Utc::now(),
            consumed_utc: None,
            upgrade_order_id: "FTUP".to_string(),
        }])
        .await
        .unwrap();
        // Pending rows do not hide a source.
        assert_eq!(tx.find_proration_sources(&reader, Utc::now()).await.unwrap().len(), 2);

        let consumed = tx.consume_proration_sources("FTUP", Utc::now()).await.unwrap();
        assert_eq!(consumed.len(), 1);
        assert!(consumed[0].is_consumed());
        let sources = tx.find_proration_sources(&reader, Utc::now()).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].order_id, "FT02");
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = InMemoryOrderStore::new();
        store.fail_next(StoreOperation::Commit, 1);

        let tx = store.begin().await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(err.is_retryable());

        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
    }
}
