//! Audit logging for ledger operations.
//!
//! Every order created and every confirmation attempt, applied or refused,
//! produces a [`LedgerAuditEvent`]. Plug in a [`LedgerAuditLogger`] to keep
//! them somewhere durable.

use std::fmt;

use crate::confirm::ConfirmErrorKind;
use crate::membership::SubsKind;

/// Audit event types for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAuditEvent {
    /// An order was saved and is awaiting payment.
    OrderCreated {
        order_id: String,
        reader_id: String,
        plan_id: String,
        kind: SubsKind,
        amount: i64,
    },
    /// A payment was applied to a membership.
    PaymentConfirmed {
        order_id: String,
        reader_id: String,
        kind: SubsKind,
        amount: i64,
        membership_id: String,
    },
    /// A payment result was refused or could not be applied.
    ConfirmationRejected {
        order_id: String,
        reason: ConfirmErrorKind,
        retry: bool,
    },
    /// An upgrade used up the balance of earlier orders.
    ProrationConsumed {
        upgrade_order_id: String,
        sources: usize,
        balance: i64,
    },
}

impl LedgerAuditEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order_created",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::ConfirmationRejected { .. } => "confirmation_rejected",
            Self::ProrationConsumed { .. } => "proration_consumed",
        }
    }
}

impl fmt::Display for LedgerAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderCreated { order_id, reader_id, plan_id, kind, amount } => {
                write!(f, "Order created: order={}, reader={}, plan={}, kind={}, amount={}", order_id, reader_id, plan_id, kind, amount)
            }
            Self::PaymentConfirmed { order_id, reader_id, kind, amount, membership_id } => {
                write!(f, "Payment confirmed: order={}, reader={}, kind={}, amount={}, membership={}", order_id, reader_id, kind, amount, membership_id)
            }
            Self::ConfirmationRejected { order_id, reason, retry } => {
                write!(f, "Confirmation rejected: order={}, reason={}, retry={}", order_id, reason, retry)
            }
            Self::ProrationConsumed { upgrade_order_id, sources, balance } => {
                write!(f, "Proration consumed: upgrade={}, sources={}, balance={}", upgrade_order_id, sources, balance)
            }
        }
    }
}

/// Trait for audit logging backends.
#[allow(async_fn_in_trait)]
pub trait LedgerAuditLogger: Send + Sync {
    /// Log a ledger audit event.
    ///
    /// Failures must be handled inside the logger. The operation being
    /// audited has already committed.
    async fn log(&self, event: LedgerAuditEvent);
}

/// Audit logger that discards events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

impl LedgerAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: LedgerAuditEvent) {}
}

/// Logs audit events through `tracing` at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl LedgerAuditLogger for TracingAuditLogger {
    async fn log(&self, event: LedgerAuditEvent) {
        tracing::info!(
            target: "subs_ledger::audit",
            event_type = event.kind(),
            "{}", event
        );
    }
}
