//! LeaseManager - タスクの lease ライフサイクル
//!
//! タスクの状態遷移（claim / renew / requeue / fail）をすべてここが所有します。
//!
//! # 並行制御
//! 唯一のプリミティブは Store の version CAS です。claim が競合したときは
//! 正確に一方だけが勝ち、負けた側はそのタスクを観測しません（別の候補に
//! 進むか、空の結果を受け取るだけ）。Sweeper とも claim/renew とも
//! ロックを共有しないので、全経路が並行に走れます。

use std::sync::Arc;

use tracing::debug;

use crate::app::config::Config;
use crate::app::consensus::{FinalizeAttempt, finalize_on_quorum};
use crate::app::status::SweepReport;
use crate::domain::{ForemanError, TaskId, TaskRecord, TaskStatus, WorkerId, WorkerStatus};
use crate::ports::{Clock, IdGenerator, Store};

/// Reason a task left the assigned state during a sweep.
const EXHAUSTED_MESSAGE: &str = "max attempts reached";

/// Owns all task-status transitions.
#[derive(Clone)]
pub struct LeaseManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: Arc<Config>,
}

impl LeaseManager {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            clock,
            ids,
            config,
        }
    }

    /// Create a new pending task. No side effects besides the store write.
    pub async fn create(
        &self,
        payload: serde_json::Value,
        required_submissions: Option<u32>,
        max_attempts: Option<u32>,
    ) -> Result<TaskRecord, ForemanError> {
        let task = TaskRecord::new(
            self.ids.new_task_id(),
            payload,
            required_submissions.unwrap_or(self.config.required_submissions_default),
            max_attempts.unwrap_or(self.config.max_attempts_default),
            self.clock.now(),
        );
        self.store.insert_task(task.clone()).await?;
        Ok(task)
    }

    /// Claim the oldest pending task for `worker`.
    ///
    /// Exactly one concurrent claimer wins each task: the transition is a
    /// single conditional update keyed on the task still being pending. A
    /// loser moves on to the next candidate and never observes a task it did
    /// not successfully transition. `Ok(None)` means the pending pool is
    /// empty — not an error.
    pub async fn claim(&self, worker: &WorkerId) -> Result<Option<TaskRecord>, ForemanError> {
        let now = self.clock.now();
        let lease_until = now + self.config.lease_duration();

        // Oldest first; requeued tasks keep their original creation position,
        // so retries don't starve newer tasks and are bounded by max_attempts.
        let candidates = self.store.list_tasks_in(TaskStatus::Pending).await?;
        for candidate in candidates {
            let mut claimed = candidate;
            claimed.claim(worker.clone(), lease_until, now);
            if self.store.update_task(claimed.clone()).await? {
                debug!(task = %claimed.id, worker = %worker, "task claimed");
                return Ok(Some(claimed));
            }
            // Lost the race for this one; try the next candidate.
        }
        Ok(None)
    }

    /// Extend the lease on `task_id`, only while `worker` still holds it
    /// and it has not expired. An expired lease is not resurrected; the
    /// caller must treat any error here as "stop working, lease lost."
    pub async fn renew(
        &self,
        worker: &WorkerId,
        task_id: TaskId,
    ) -> Result<TaskRecord, ForemanError> {
        loop {
            let task = self
                .store
                .get_task(task_id)
                .await?
                .ok_or(ForemanError::TaskNotFound(task_id))?;

            let now = self.clock.now();
            match task.status {
                TaskStatus::Assigned => {}
                TaskStatus::Pending => {
                    return Err(ForemanError::conflict(task_id, "task is no longer leased"));
                }
                TaskStatus::Completed => {
                    return Err(ForemanError::conflict(task_id, "task already completed"));
                }
                TaskStatus::Failed => return Err(ForemanError::AttemptsExhausted(task_id)),
            }
            if !task.held_by(worker) {
                return Err(ForemanError::conflict(task_id, "lease held by another worker"));
            }
            if task.lease_expired(now) {
                return Err(ForemanError::conflict(task_id, "lease expired"));
            }

            let mut renewed = task;
            renewed.renew(now + self.config.lease_duration(), now);
            if self.store.update_task(renewed.clone()).await? {
                return Ok(renewed);
            }
            // Lost a race (sweeper or consensus moved first); re-read and
            // re-validate rather than assuming anything about the outcome.
        }
    }

    /// Return expired or orphaned leases to the pending pool; fail tasks
    /// that are out of attempts. A task that already holds a full quorum is
    /// finalized rather than recycled.
    ///
    /// Safe to run concurrently with claim/renew: each transition is an
    /// independent conditional update and a lost race is simply skipped —
    /// worst case a just-renewed task is caught next sweep.
    pub async fn requeue_expired(&self) -> Result<SweepReport, ForemanError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for task in self.store.list_tasks_in(TaskStatus::Assigned).await? {
            let lease_expired = task.lease_expired(now);
            let holder_gone = self.holder_gone(&task).await?;
            if !(lease_expired || holder_gone) {
                continue;
            }

            // A full quorum stranded by a lost finalize race completes here
            // instead of burning an attempt.
            match finalize_on_quorum(self.store.as_ref(), self.clock.as_ref(), task.clone()).await?
            {
                FinalizeAttempt::Finalized(_) => {
                    report.finalized += 1;
                    continue;
                }
                // Lost races are caught next sweep.
                FinalizeAttempt::Lost => continue,
                FinalizeAttempt::NotReady => {}
            }

            let mut updated = task;
            if updated.attempts + 1 >= updated.max_attempts {
                updated.mark_failed(EXHAUSTED_MESSAGE, now);
                if self.store.update_task(updated.clone()).await? {
                    debug!(task = %updated.id, attempts = updated.attempts, "task failed: attempts exhausted");
                    report.failed += 1;
                }
            } else {
                updated.requeue(now);
                if self.store.update_task(updated.clone()).await? {
                    debug!(task = %updated.id, attempts = updated.attempts, "lease lost, task requeued");
                    report.requeued += 1;
                }
            }
        }

        // Pending tasks past their bound (e.g. max_attempts lowered to zero
        // at creation) are failed here rather than handed out again.
        for task in self.store.list_tasks_in(TaskStatus::Pending).await? {
            if task.attempts >= task.max_attempts {
                let mut updated = task;
                updated.mark_failed(EXHAUSTED_MESSAGE, now);
                if self.store.update_task(updated).await? {
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Is the lease holder stale or offline? A missing worker record is not
    /// treated as stale; only the lease clock applies then.
    async fn holder_gone(&self, task: &TaskRecord) -> Result<bool, ForemanError> {
        let Some(holder) = &task.reserved_by else {
            return Ok(false);
        };
        let Some(worker) = self.store.get_worker(holder).await? else {
            return Ok(false);
        };
        let status = worker.status_at(
            self.clock.now(),
            self.config.heartbeat_ttl(),
            self.config.offline_after(),
        );
        Ok(status != WorkerStatus::Active)
    }
}
