//! # subs-ledger
//!
//! Subscription ledger and payment confirmation engine.
//!
//! Readers buy, renew or upgrade standard and premium memberships. This
//! crate decides what kind of order a reader may place, credits the unused
//! value of earlier purchases toward an upgrade, and turns gateway payment
//! notifications (delivered at least once, in any order) into exactly one
//! membership change each.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subs_ledger::{Ledger, LedgerConfigBuilder, TracingAuditLogger};
//! use subs_ledger::membership::{Cycle, Tier};
//! use subs_ledger::order::Plans;
//! use subs_ledger::storage::InMemoryOrderStore;
//! use subs_ledger::tasks::{LoggingTaskHandler, TaskQueue};
//!
//! #[tokio::main]
//! async fn main() -> subs_ledger::Result<()> {
//!     let config = LedgerConfigBuilder::new().from_env().build()?;
//!     subs_ledger::init_tracing_with_config(&config);
//!
//!     let plans = Plans::builder()
//!         .plan("standard_year")
//!             .tier(Tier::Standard)
//!             .cycle(Cycle::Year)
//!             .price(25800)
//!             .done()
//!         .plan("premium_year")
//!             .tier(Tier::Premium)
//!             .cycle(Cycle::Year)
//!             .price(199800)
//!             .done()
//!         .build();
//!
//!     let (tasks, worker) = TaskQueue::spawn(Arc::new(LoggingTaskHandler), &config.tasks);
//!     let ledger = Ledger::new(InMemoryOrderStore::new(), plans, &config, tasks)
//!         .with_audit_logger(TracingAuditLogger);
//!
//!     // ... create orders and confirm payments ...
//!
//!     worker.shutdown().await;
//!     Ok(())
//! }
//! ```

#![allow(async_fn_in_trait)]

pub mod audit;
pub mod config;
pub mod confirm;
mod error;
mod ledger;
pub mod membership;
pub mod order;
pub mod proration;
pub mod storage;
pub mod tasks;
pub mod testing;
pub mod utils;

pub use audit::{LedgerAuditEvent, LedgerAuditLogger, NoOpAuditLogger, TracingAuditLogger};
pub use config::{LedgerConfig, LedgerConfigBuilder, LoggingConfig, TasksConfig};
pub use confirm::{ConfirmError, ConfirmErrorKind, ConfirmationBuilder, ConfirmationResult};
pub use error::{ErrorResponse, LedgerError, Result};
pub use ledger::Ledger;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with sensible defaults
///
/// Filters come from `RUST_LOG` (default `info`). Set `SUBS_LOG_JSON=true`
/// for JSON output.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if utils::env_flag("LOG_JSON") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing from a [`LedgerConfig`]
pub fn init_tracing_with_config(config: &LedgerConfig) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
