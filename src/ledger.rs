//! The ledger service.
//!
//! [`Ledger`] ties the pieces together. Each public operation runs inside a
//! single store transaction: it begins, does all reads and writes through
//! the transaction, and either commits or rolls back before returning.
//! Side effects are dispatched to the [`TaskQueue`] only after a commit.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subs_ledger::config::LedgerConfig;
//! use subs_ledger::membership::{Cycle, PaymentMethod, ReaderIds, Tier};
//! use subs_ledger::order::{PaymentResult, Plans};
//! use subs_ledger::storage::InMemoryOrderStore;
//! use subs_ledger::tasks::{LoggingTaskHandler, TaskQueue};
//! use subs_ledger::Ledger;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LedgerConfig::default();
//! let plans = Plans::builder()
//!     .plan("standard_year")
//!         .tier(Tier::Standard)
//!         .cycle(Cycle::Year)
//!         .price(25800)
//!         .done()
//!     .build();
//! let (tasks, worker) = TaskQueue::spawn(Arc::new(LoggingTaskHandler), &config.tasks);
//! let ledger = Ledger::new(InMemoryOrderStore::new(), plans, &config, tasks);
//!
//! let reader = ReaderIds::ftc("reader-1");
//! let draft = ledger.create_order(&reader, "standard_year", PaymentMethod::Alipay).await?;
//!
//! // Later, when the gateway notification arrives:
//! let paid = PaymentResult::new(&draft.order.id, draft.order.amount, chrono::Utc::now());
//! let confirmation = ledger.confirm_payment(paid).await?;
//! assert_eq!(confirmation.membership.tier, Tier::Standard);
//!
//! worker.shutdown().await;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};

use crate::audit::{LedgerAuditEvent, LedgerAuditLogger, NoOpAuditLogger};
use crate::config::LedgerConfig;
use crate::confirm::{ConfirmError, ConfirmationBuilder, ConfirmationResult};
use crate::error::Result;
use crate::membership::{Membership, PaymentMethod, ReaderIds, SubsKind};
use crate::order::{OrderBuilder, OrderContext, OrderDraft, PaymentResult, Plan, Plans};
use crate::proration::{ProratedOrder, Wallet};
use crate::storage::{OrderStore, OrderTx};
use crate::tasks::{PostCommitTask, TaskQueue};

/// Subscription ledger over an [`OrderStore`].
pub struct Ledger<S: OrderStore, A: LedgerAuditLogger = NoOpAuditLogger> {
    store: S,
    plans: Plans,
    orders: OrderBuilder,
    confirmations: ConfirmationBuilder,
    tasks: TaskQueue,
    audit: A,
}

impl<S: OrderStore> Ledger<S> {
    pub fn new(store: S, plans: Plans, config: &LedgerConfig, tasks: TaskQueue) -> Self {
        Self {
            store,
            plans,
            orders: OrderBuilder::new(config),
            confirmations: ConfirmationBuilder::new(),
            tasks,
            audit: NoOpAuditLogger,
        }
    }
}

impl<S: OrderStore, A: LedgerAuditLogger> Ledger<S, A> {
    /// Replace the audit logger.
    pub fn with_audit_logger<B: LedgerAuditLogger>(self, audit: B) -> Ledger<S, B> {
        Ledger {
            store: self.store,
            plans: self.plans,
            orders: self.orders,
            confirmations: self.confirmations,
            tasks: self.tasks,
            audit,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn plans(&self) -> &Plans {
        &self.plans
    }

    /// Create an order for `reader` to buy `plan_id`.
    ///
    /// The order is saved unconfirmed. An upgrade that the reader's balance
    /// pays for in full comes back with a zero amount; confirm it with
    /// [`confirm_free_order`](Self::confirm_free_order).
    pub async fn create_order(
        &self,
        reader: &ReaderIds,
        plan_id: &str,
        payment_method: PaymentMethod,
    ) -> Result<OrderDraft> {
        self.create_order_at(reader, plan_id, payment_method, Utc::now())
            .await
    }

    /// [`create_order`](Self::create_order) with an explicit clock.
    pub async fn create_order_at(
        &self,
        reader: &ReaderIds,
        plan_id: &str,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<OrderDraft> {
        let plan = self.plans.require(plan_id)?;

        let mut tx = self.store.begin().await?;
        let draft = match self
            .create_order_in(&mut tx, reader, plan, payment_method, now)
            .await
        {
            Ok(draft) => draft,
            Err(e) => {
                rollback(tx).await;
                tracing::info!(
                    target: "subs_ledger::ledger",
                    plan_id = %plan_id,
                    error = %e,
                    "order refused"
                );
                return Err(e);
            }
        };
        tx.commit().await?;

        tracing::info!(
            target: "subs_ledger::ledger",
            order_id = %draft.order.id,
            kind = %draft.order.kind,
            amount = draft.order.amount,
            balance = draft.applied_balance(),
            "order created"
        );
        self.audit
            .log(LedgerAuditEvent::OrderCreated {
                order_id: draft.order.id.clone(),
                reader_id: reader_id(reader),
                plan_id: draft.order.plan_id.clone(),
                kind: draft.order.kind,
                amount: draft.order.amount,
            })
            .await;

        Ok(draft)
    }

    async fn create_order_in(
        &self,
        tx: &mut S::Tx,
        reader: &ReaderIds,
        plan: &Plan,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<OrderDraft> {
        let member = tx
            .retrieve_member(reader)
            .await?
            .unwrap_or_else(|| Membership::zero(reader.clone()));

        let ctx = OrderContext {
            reader,
            plan,
            payment_method,
            member: &member,
            now,
        };
        let kind = self.orders.check(ctx)?;

        // Only upgrades draw on the balance.
        let wallet = match kind {
            SubsKind::Upgrade => {
                let sources = tx.find_proration_sources(reader, now).await?;
                Wallet::aggregate(sources, now)
            }
            SubsKind::Create | SubsKind::Renew => Wallet::empty(now),
        };

        let draft = self.orders.build(ctx, kind, &wallet);

        tx.save_order(&draft.order).await?;
        if !draft.prorated.is_empty() {
            tx.save_proration_sources(&draft.prorated).await?;
        }
        Ok(draft)
    }

    /// Apply a verified payment notification.
    ///
    /// Safe to call any number of times with the same result: only the
    /// first call changes anything, later ones fail with `AlreadyConfirmed`.
    pub async fn confirm_payment(
        &self,
        result: PaymentResult,
    ) -> std::result::Result<ConfirmationResult, ConfirmError> {
        let outcome = self.confirm_in_transaction(&result).await;

        match outcome {
            Ok((confirmation, consumed)) => {
                self.after_confirm(&confirmation, &consumed).await;
                Ok(confirmation)
            }
            Err(err) => {
                if err.retry {
                    tracing::error!(
                        target: "subs_ledger::ledger",
                        order_id = %result.order_id,
                        kind = %err.kind,
                        error = %err.message,
                        "confirmation failed"
                    );
                } else {
                    tracing::warn!(
                        target: "subs_ledger::ledger",
                        order_id = %result.order_id,
                        kind = %err.kind,
                        error = %err.message,
                        "confirmation refused"
                    );
                }
                self.audit
                    .log(LedgerAuditEvent::ConfirmationRejected {
                        order_id: result.order_id.clone(),
                        reason: err.kind,
                        retry: err.retry,
                    })
                    .await;
                Err(err)
            }
        }
    }

    /// Confirm an order whose amount is zero without a gateway.
    pub async fn confirm_free_order(
        &self,
        order_id: &str,
    ) -> std::result::Result<ConfirmationResult, ConfirmError> {
        self.confirm_payment(PaymentResult::free(order_id, Utc::now()))
            .await
    }

    async fn confirm_in_transaction(
        &self,
        result: &PaymentResult,
    ) -> std::result::Result<(ConfirmationResult, Vec<ProratedOrder>), ConfirmError> {
        let mut tx = self.store.begin().await?;
        match self.confirm_in(&mut tx, result).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn confirm_in(
        &self,
        tx: &mut S::Tx,
        result: &PaymentResult,
    ) -> std::result::Result<(ConfirmationResult, Vec<ProratedOrder>), ConfirmError> {
        let order = tx
            .retrieve_order(&result.order_id)
            .await?
            .ok_or_else(|| ConfirmError::order_not_found(&result.order_id))?;
        let stored = tx.retrieve_member(&order.reader).await?;
        let row_exists = stored.is_some();
        let member = stored.unwrap_or_else(|| Membership::zero(order.reader.clone()));

        let confirmation = self.confirmations.build(result, &order, &member)?;

        tx.update_confirmed_order(&confirmation.order).await?;
        // A stored row may hold the zero membership; it is updated, not
        // inserted again.
        if row_exists {
            tx.update_member(&confirmation.membership).await?;
        } else {
            tx.create_member(&confirmation.membership).await?;
        }

        let consumed = match order.kind {
            SubsKind::Upgrade => {
                tx.consume_proration_sources(&order.id, result.confirmed_utc)
                    .await?
            }
            SubsKind::Create | SubsKind::Renew => Vec::new(),
        };

        Ok((confirmation, consumed))
    }

    async fn after_confirm(&self, confirmation: &ConfirmationResult, consumed: &[ProratedOrder]) {
        let order = &confirmation.order;
        tracing::info!(
            target: "subs_ledger::ledger",
            order_id = %order.id,
            kind = %order.kind,
            start = ?order.start_date,
            end = ?order.end_date,
            "payment confirmed"
        );

        if !confirmation.snapshot.is_empty() {
            self.tasks
                .dispatch(PostCommitTask::BackupSnapshot(confirmation.snapshot.clone()));
        }
        self.tasks.dispatch(PostCommitTask::NotifyConfirmation {
            result: confirmation.clone(),
        });

        self.audit
            .log(LedgerAuditEvent::PaymentConfirmed {
                order_id: order.id.clone(),
                reader_id: reader_id(&order.reader),
                kind: order.kind,
                amount: order.amount,
                membership_id: confirmation.membership.id.clone().unwrap_or_default(),
            })
            .await;

        if !consumed.is_empty() {
            self.audit
                .log(LedgerAuditEvent::ProrationConsumed {
                    upgrade_order_id: order.id.clone(),
                    sources: consumed.len(),
                    balance: consumed.iter().map(|p| p.balance).sum(),
                })
                .await;
        }
    }
}

async fn rollback<T: OrderTx>(tx: T) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(target: "subs_ledger::ledger", error = %e, "rollback failed");
    }
}

fn reader_id(ids: &ReaderIds) -> String {
    ids.compound_id().unwrap_or_default().to_string()
}
