//! Post-commit side effects.
//!
//! Work that must not hold up or undo a committed transaction, such as
//! backing up a membership snapshot or notifying the reader, is handed to a
//! [`TaskQueue`]. A single background worker feeds each task to a
//! [`TaskHandler`] and retries failures with exponential backoff.
//!
//! Dispatch never blocks. When the queue is full the task is dropped and a
//! warning is logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use crate::config::TasksConfig;
use crate::confirm::ConfirmationResult;
use crate::error::Result;
use crate::membership::MembershipSnapshot;

/// A side effect scheduled after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostCommitTask {
    /// Persist the membership as it was before a confirmation.
    BackupSnapshot(MembershipSnapshot),
    /// Tell the reader (and anyone else interested) about a confirmation.
    NotifyConfirmation { result: ConfirmationResult },
}

impl PostCommitTask {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BackupSnapshot(_) => "backup_snapshot",
            Self::NotifyConfirmation { .. } => "notify_confirmation",
        }
    }

    /// Order the task concerns.
    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::BackupSnapshot(snapshot) => snapshot.order_id.as_deref(),
            Self::NotifyConfirmation { result } => Some(&result.order.id),
        }
    }
}

/// Executes post-commit tasks.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: &PostCommitTask) -> Result<()>;
}

/// Handler that only logs each task.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTaskHandler;

#[async_trait]
impl TaskHandler for LoggingTaskHandler {
    async fn handle(&self, task: &PostCommitTask) -> Result<()> {
        tracing::info!(
            target: "subs_ledger::tasks",
            task = task.name(),
            order_id = task.order_id().unwrap_or_default(),
            "post-commit task"
        );
        Ok(())
    }
}

/// Sending half of the post-commit queue. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<PostCommitTask>,
    dropped: Arc<AtomicU64>,
}

/// The background worker.
///
/// Dropping this handle also stops the worker once the queued tasks are
/// done, after which every dispatch is dropped.
pub struct TaskWorker {
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(handler: Arc<dyn TaskHandler>, config: &TasksConfig) -> (TaskQueue, TaskWorker) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let runner = Runner {
            handler,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_millis),
        };
        let handle = tokio::spawn(runner.run(receiver, shutdown_rx));

        (
            TaskQueue {
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            TaskWorker {
                handle,
                shutdown_tx,
            },
        )
    }

    /// Queue a task without waiting. Returns `false` if it was dropped.
    pub fn dispatch(&self, task: PostCommitTask) -> bool {
        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "subs_ledger::tasks",
                    task = task.name(),
                    order_id = task.order_id().unwrap_or_default(),
                    "task queue full, dropping task"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "subs_ledger::tasks",
                    task = task.name(),
                    "task queue closed, dropping task"
                );
                false
            }
        }
    }

    /// Tasks dropped since the queue was created.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TaskWorker {
    /// Stop accepting tasks, finish the queued ones and wait for the worker.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            tracing::error!(target: "subs_ledger::tasks", error = %e, "task worker panicked");
        }
    }
}

struct Runner {
    handler: Arc<dyn TaskHandler>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Runner {
    async fn run(
        self,
        mut receiver: mpsc::Receiver<PostCommitTask>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::debug!(target: "subs_ledger::tasks", "task worker started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    receiver.close();
                    while let Some(task) = receiver.recv().await {
                        self.execute(task).await;
                    }
                    break;
                }
                next = receiver.recv() => match next {
                    Some(task) => self.execute(task).await,
                    None => break,
                },
            }
        }

        tracing::debug!(target: "subs_ledger::tasks", "task worker stopped");
    }

    async fn execute(&self, task: PostCommitTask) {
        let mut attempt = 0u32;
        loop {
            match self.handler.handle(&task).await {
                Ok(()) => {
                    tracing::debug!(
                        target: "subs_ledger::tasks",
                        task = task.name(),
                        attempt = attempt,
                        "task completed"
                    );
                    return;
                }
                Err(e) if attempt < self.max_retries => {
                    let backoff = self.retry_backoff.saturating_mul(2_u32.saturating_pow(attempt));
                    tracing::warn!(
                        target: "subs_ledger::tasks",
                        task = task.name(),
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "task failed, retrying"
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        target: "subs_ledger::tasks",
                        task = task.name(),
                        order_id = task.order_id().unwrap_or_default(),
                        attempts = attempt + 1,
                        error = %e,
                        "task failed permanently, dropping"
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::membership::{Membership, ReaderIds, SnapshotReason};
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TaskHandler for Recorder {
        async fn handle(&self, task: &PostCommitTask) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(LedgerError::database("backup store unavailable"));
            }
            self.seen.lock().unwrap().push(task.name().to_string());
            Ok(())
        }
    }

    fn snapshot_task() -> PostCommitTask {
        let snapshot = Membership::zero(ReaderIds::ftc("reader-1"))
            .snapshot(SnapshotReason::Create, Utc::now())
            .with_order("FT01");
        PostCommitTask::BackupSnapshot(snapshot)
    }

    #[tokio::test]
    async fn test_tasks_are_handled() {
        let recorder = Arc::new(Recorder::default());
        let (queue, worker) = TaskQueue::spawn(recorder.clone(), &TasksConfig::default());

        assert!(queue.dispatch(snapshot_task()));
        worker.shutdown().await;

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["backup_snapshot"]);
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_is_retried() {
        let recorder = Arc::new(Recorder::default());
        recorder.failures_left.store(2, Ordering::SeqCst);
        let (queue, worker) = TaskQueue::spawn(recorder.clone(), &TasksConfig::default());

        queue.dispatch(snapshot_task());
        worker.shutdown().await;

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let recorder = Arc::new(Recorder::default());
        recorder.failures_left.store(10, Ordering::SeqCst);
        let config = TasksConfig {
            max_retries: 2,
            ..TasksConfig::default()
        };
        let (queue, worker) = TaskQueue::spawn(recorder.clone(), &config);

        queue.dispatch(snapshot_task());
        worker.shutdown().await;

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 3);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_drops_task() {
        let recorder = Arc::new(Recorder::default());
        let config = TasksConfig {
            capacity: 1,
            ..TasksConfig::default()
        };
        let (queue, worker) = TaskQueue::spawn(recorder.clone(), &config);

        // The worker has not run yet, so the second send finds the queue full.
        assert!(queue.dispatch(snapshot_task()));
        assert!(!queue.dispatch(snapshot_task()));
        assert_eq!(queue.dropped(), 1);

        worker.shutdown().await;
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }
}
