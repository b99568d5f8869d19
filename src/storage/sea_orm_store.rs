//! SeaORM-backed order store.
//!
//! Locked reads use `SELECT ... FOR UPDATE`, so this store needs a database
//! with row locks (PostgreSQL or MySQL).
//!
//! # Example
//!
//! ```rust,ignore
//! use subs_ledger::storage::SeaOrmOrderStore;
//!
//! let db = sea_orm::Database::connect(&url).await?;
//! let ledger = Ledger::new(SeaOrmOrderStore::new(db), plans, config, tasks);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};

use super::{OrderStore, OrderTx};
use crate::error::{LedgerError, Result};
use crate::membership::{Membership, ReaderIds};
use crate::order::Order;
use crate::proration::{BalanceSource, ProratedOrder};

mod entity {
    pub mod membership {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "memberships")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub compound_id: String,
            pub ftc_id: Option<String>,
            pub union_id: Option<String>,
            pub membership_id: Option<String>,
            pub tier: String,
            pub cycle: String,
            pub expire_date: Option<Date>,
            pub payment_method: String,
            pub auto_renew: bool,
            pub status: String,
            pub foreign_sub_id: Option<String>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod order {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "orders")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub id: String,
            pub ftc_id: Option<String>,
            pub union_id: Option<String>,
            pub plan_id: String,
            pub tier: String,
            pub cycle: String,
            pub price: i64,
            pub amount: i64,
            pub currency: String,
            pub cycle_count: i32,
            pub extra_days: i32,
            pub kind: String,
            pub payment_method: String,
            pub created_utc: DateTimeUtc,
            pub confirmed_utc: Option<DateTimeUtc>,
            pub start_date: Option<Date>,
            pub end_date: Option<Date>,
            pub snapshot_id: Option<String>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod prorated_order {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "prorated_orders")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub source_order_id: String,
            #[sea_orm(primary_key, auto_increment = false)]
            pub upgrade_order_id: String,
            pub balance: i64,
            pub created_utc: DateTimeUtc,
            pub consumed_utc: Option<DateTimeUtc>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::{membership, order, prorated_order};

#[inline]
fn i32_to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[inline]
fn u32_to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn model_to_member(model: membership::Model) -> Result<Membership> {
    Ok(Membership {
        ids: ReaderIds {
            ftc_id: model.ftc_id,
            union_id: model.union_id,
        },
        id: model.membership_id,
        tier: model.tier.parse()?,
        cycle: model.cycle.parse()?,
        expire_date: model.expire_date,
        payment_method: model.payment_method.parse()?,
        auto_renew: model.auto_renew,
        status: model.status.parse()?,
        foreign_sub_id: model.foreign_sub_id,
    })
}

fn member_to_active_model(member: &Membership) -> Result<membership::ActiveModel> {
    let compound_id = member
        .ids
        .compound_id()
        .ok_or_else(|| LedgerError::invalid_input("membership has no reader id"))?;
    Ok(membership::ActiveModel {
        compound_id: Set(compound_id.to_string()),
        ftc_id: Set(member.ids.ftc_id.clone()),
        union_id: Set(member.ids.union_id.clone()),
        membership_id: Set(member.id.clone()),
        tier: Set(member.tier.as_str().to_string()),
        cycle: Set(member.cycle.as_str().to_string()),
        expire_date: Set(member.expire_date),
        payment_method: Set(member.payment_method.as_str().to_string()),
        auto_renew: Set(member.auto_renew),
        status: Set(member.status.as_str().to_string()),
        foreign_sub_id: Set(member.foreign_sub_id.clone()),
    })
}

fn model_to_order(model: order::Model) -> Result<Order> {
    Ok(Order {
        id: model.id,
        reader: ReaderIds {
            ftc_id: model.ftc_id,
            union_id: model.union_id,
        },
        plan_id: model.plan_id,
        tier: model.tier.parse()?,
        cycle: model.cycle.parse()?,
        price: model.price,
        amount: model.amount,
        currency: model.currency,
        cycle_count: i32_to_u32(model.cycle_count),
        extra_days: i32_to_u32(model.extra_days),
        kind: model.kind.parse()?,
        payment_method: model.payment_method.parse()?,
        created_utc: model.created_utc,
        confirmed_utc: model.confirmed_utc,
        start_date: model.start_date,
        end_date: model.end_date,
        snapshot_id: model.snapshot_id,
    })
}

fn order_to_active_model(o: &Order) -> order::ActiveModel {
    order::ActiveModel {
        id: Set(o.id.clone()),
        ftc_id: Set(o.reader.ftc_id.clone()),
        union_id: Set(o.reader.union_id.clone()),
        plan_id: Set(o.plan_id.clone()),
        tier: Set(o.tier.as_str().to_string()),
        cycle: Set(o.cycle.as_str().to_string()),
        price: Set(o.price),
        amount: Set(o.amount),
        currency: Set(o.currency.clone()),
        cycle_count: Set(u32_to_i32(o.cycle_count)),
        extra_days: Set(u32_to_i32(o.extra_days)),
        kind: Set(o.kind.as_str().to_string()),
        payment_method: Set(o.payment_method.as_str().to_string()),
        created_utc: Set(o.created_utc),
        confirmed_utc: Set(o.confirmed_utc),
        start_date: Set(o.start_date),
        end_date: Set(o.end_date),
        snapshot_id: Set(o.snapshot_id.clone()),
    }
}

fn prorated_to_active_model(row: &ProratedOrder) -> prorated_order::ActiveModel {
    prorated_order::ActiveModel {
        source_order_id: Set(row.source_order_id.clone()),
        upgrade_order_id: Set(row.upgrade_order_id.clone()),
        balance: Set(row.balance),
        created_utc: Set(row.created_utc),
        consumed_utc: Set(row.consumed_utc),
    }
}

fn model_to_prorated(model: prorated_order::Model) -> ProratedOrder {
    ProratedOrder {
        source_order_id: model.source_order_id,
        balance: model.balance,
        created_utc: model.created_utc,
        consumed_utc: model.consumed_utc,
        upgrade_order_id: model.upgrade_order_id,
    }
}

/// Rows owned by any of the reader's ids.
fn member_condition(ids: &ReaderIds) -> Condition {
    let mut cond = Condition::any();
    if let Some(ftc_id) = &ids.ftc_id {
        cond = cond.add(membership::Column::FtcId.eq(ftc_id.clone()));
    }
    if let Some(union_id) = &ids.union_id {
        cond = cond.add(membership::Column::UnionId.eq(union_id.clone()));
    }
    cond
}

fn order_condition(ids: &ReaderIds) -> Condition {
    let mut cond = Condition::any();
    if let Some(ftc_id) = &ids.ftc_id {
        cond = cond.add(order::Column::FtcId.eq(ftc_id.clone()));
    }
    if let Some(union_id) = &ids.union_id {
        cond = cond.add(order::Column::UnionId.eq(union_id.clone()));
    }
    cond
}

/// SeaORM implementation of [`OrderStore`].
#[derive(Clone)]
pub struct SeaOrmOrderStore {
    db: DatabaseConnection,
}

impl SeaOrmOrderStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderStore for SeaOrmOrderStore {
    type Tx = SeaOrmTx;

    async fn begin(&self) -> Result<SeaOrmTx> {
        let txn = self.db.begin().await?;
        Ok(SeaOrmTx { txn })
    }
}

/// Transaction over a [`SeaOrmOrderStore`].
pub struct SeaOrmTx {
    txn: DatabaseTransaction,
}

#[async_trait]
impl OrderTx for SeaOrmTx {
    async fn retrieve_member(&mut self, ids: &ReaderIds) -> Result<Option<Membership>> {
        if ids.is_empty() {
            return Ok(None);
        }
        membership::Entity::find()
            .filter(member_condition(ids))
            .lock_exclusive()
            .one(&self.txn)
            .await?
            .map(model_to_member)
            .transpose()
    }

    async fn retrieve_order(&mut self, order_id: &str) -> Result<Option<Order>> {
        order::Entity::find_by_id(order_id.to_string())
            .lock_exclusive()
            .one(&self.txn)
            .await?
            .map(model_to_order)
            .transpose()
    }

    async fn save_order(&mut self, o: &Order) -> Result<()> {
        order_to_active_model(o).insert(&self.txn).await?;
        Ok(())
    }

    async fn update_confirmed_order(&mut self, o: &Order) -> Result<()> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::ConfirmedUtc, Expr::value(o.confirmed_utc))
            .col_expr(order::Column::StartDate, Expr::value(o.start_date))
            .col_expr(order::Column::EndDate, Expr::value(o.end_date))
            .col_expr(order::Column::SnapshotId, Expr::value(o.snapshot_id.clone()))
            .filter(order::Column::Id.eq(o.id.clone()))
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(LedgerError::not_found(format!("order {}", o.id)));
        }
        Ok(())
    }

    async fn create_member(&mut self, member: &Membership) -> Result<()> {
        member_to_active_model(member)?.insert(&self.txn).await?;
        Ok(())
    }

    async fn update_member(&mut self, member: &Membership) -> Result<()> {
        let mut active = member_to_active_model(member)?;
        active.compound_id = sea_orm::ActiveValue::NotSet;
        let result = membership::Entity::update_many()
            .set(active)
            .filter(member_condition(&member.ids))
            .exec(&self.txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(LedgerError::not_found(format!(
                "membership for {:?}",
                member.ids.compound_id()
            )));
        }
        Ok(())
    }

    async fn find_proration_sources(
        &mut self,
        ids: &ReaderIds,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<BalanceSource>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let orders = order::Entity::find()
            .filter(order_condition(ids))
            .filter(order::Column::ConfirmedUtc.is_not_null())
            .filter(order::Column::EndDate.gt(as_of.date_naive()))
            .all(&self.txn)
            .await?;

        let order_ids: Vec<String> = orders.iter().map(|o| o.id.clone()).collect();
        let consumed: Vec<String> = prorated_order::Entity::find()
            .filter(prorated_order::Column::SourceOrderId.is_in(order_ids))
            .filter(prorated_order::Column::ConsumedUtc.is_not_null())
            .all(&self.txn)
            .await?
            .into_iter()
            .map(|row| row.source_order_id)
            .collect();

        let mut sources = Vec::with_capacity(orders.len());
        for model in orders {
            if consumed.contains(&model.id) {
                continue;
            }
            let o = model_to_order(model)?;
            if let Some(source) = BalanceSource::from_order(&o).filter(|s| s.is_active(as_of)) {
                sources.push(source);
            }
        }
        sources.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(sources)
    }

    async fn save_proration_sources(&mut self, rows: &[ProratedOrder]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        prorated_order::Entity::insert_many(rows.iter().map(prorated_to_active_model))
            .exec(&self.txn)
            .await?;
        Ok(())
    }

    async fn consume_proration_sources(
        &mut self,
        upgrade_order_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<ProratedOrder>> {
        let pending = prorated_order::Entity::find()
            .filter(prorated_order::Column::UpgradeOrderId.eq(upgrade_order_id.to_string()))
            .filter(prorated_order::Column::ConsumedUtc.is_null())
            .lock_exclusive()
            .all(&self.txn)
            .await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        prorated_order::Entity::update_many()
            .col_expr(prorated_order::Column::ConsumedUtc, Expr::value(Some(at)))
            .filter(prorated_order::Column::UpgradeOrderId.eq(upgrade_order_id.to_string()))
            .filter(prorated_order::Column::ConsumedUtc.is_null())
            .exec(&self.txn)
            .await?;

        Ok(pending
            .into_iter()
            .map(|model| ProratedOrder {
                consumed_utc: Some(at),
                ..model_to_prorated(model)
            })
            .collect())
    }

    async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
