#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use subs_ledger::storage::InMemoryOrderStore;
use subs_ledger::tasks::{PostCommitTask, TaskHandler, TaskQueue, TaskWorker};
use subs_ledger::testing::default_plans;
use subs_ledger::{Ledger, LedgerAuditEvent, LedgerAuditLogger, LedgerConfig};

/// Task handler that remembers every task it ran.
#[derive(Default)]
pub struct RecordingHandler {
    pub tasks: Mutex<Vec<PostCommitTask>>,
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn handle(&self, task: &PostCommitTask) -> subs_ledger::Result<()> {
        self.tasks.lock().unwrap().push(task.clone());
        Ok(())
    }
}

impl RecordingHandler {
    pub fn names(&self) -> Vec<&'static str> {
        self.tasks.lock().unwrap().iter().map(|t| t.name()).collect()
    }
}

/// Audit logger that captures events.
#[derive(Clone, Default)]
pub struct RecordingAudit {
    pub events: Arc<Mutex<Vec<LedgerAuditEvent>>>,
}

impl LedgerAuditLogger for RecordingAudit {
    async fn log(&self, event: LedgerAuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RecordingAudit {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }
}

pub struct Harness {
    pub ledger: Ledger<InMemoryOrderStore, RecordingAudit>,
    pub store: InMemoryOrderStore,
    pub handler: Arc<RecordingHandler>,
    pub audit: RecordingAudit,
    pub worker: TaskWorker,
}

impl Harness {
    pub fn new() -> Self {
        let config = LedgerConfig::default();
        let store = InMemoryOrderStore::new();
        let handler = Arc::new(RecordingHandler::default());
        let audit = RecordingAudit::default();
        let (tasks, worker) = TaskQueue::spawn(handler.clone(), &config.tasks);
        let ledger = Ledger::new(store.clone(), default_plans(), &config, tasks)
            .with_audit_logger(audit.clone());

        Self {
            ledger,
            store,
            handler,
            audit,
            worker,
        }
    }

    /// Flush the task queue and return the handler.
    pub async fn finish(self) -> Arc<RecordingHandler> {
        let Harness { worker, handler, .. } = self;
        worker.shutdown().await;
        handler
    }
}
