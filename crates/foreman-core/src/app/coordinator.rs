//! Coordinator - 全操作を束ねる薄い facade
//!
//! ここはワイヤリングと合成だけで、難しいロジックは持ちません。
//! トランスポート非依存の request/response 境界です（HTTP へのマッピングは
//! デプロイ側の関心事）。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::app::config::Config;
use crate::app::consensus::{ConsensusEngine, SubmitOutcome};
use crate::app::lease::LeaseManager;
use crate::app::registry::WorkerRegistry;
use crate::app::status::{CoordinatorStats, Health, SweepReport, TaskDetail, WorkerView};
use crate::app::sweeper::SweeperLoop;
use crate::domain::{
    ErrorKind, ForemanError, ScoreRecord, TaskId, TaskRecord, TaskStatus, WorkerId, WorkerRecord,
    WorkerStatus,
};
use crate::ports::{Clock, IdGenerator, Store};

/// Per-task renewal failure inside a heartbeat. The liveness update itself
/// still succeeded; the caller must stop treating itself as the owner of
/// this task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewConflict {
    pub task_id: TaskId,
    pub reason: String,
}

/// Heartbeat acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatAck {
    pub renewed: Vec<TaskId>,
    pub conflicts: Vec<RenewConflict>,
}

/// The coordinator boundary: every operation the system exposes.
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<Config>,
    store: Arc<dyn Store>,
    lease: LeaseManager,
    registry: WorkerRegistry,
    consensus: ConsensusEngine,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: Arc<Config>,
    ) -> Self {
        let lease = LeaseManager::new(store.clone(), clock.clone(), ids.clone(), config.clone());
        let registry = WorkerRegistry::new(store.clone(), clock.clone(), config.clone());
        let consensus = ConsensusEngine::new(store.clone(), clock, ids);
        Self {
            config,
            store,
            lease,
            registry,
            consensus,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start the background requeue sweeper for this coordinator.
    pub fn start_sweeper(&self) -> SweeperLoop {
        SweeperLoop::spawn(self.lease.clone(), self.config.sweep_interval())
    }

    // ---- tasks ----

    pub async fn create_task(
        &self,
        payload: serde_json::Value,
        required_submissions: Option<u32>,
        max_attempts: Option<u32>,
    ) -> Result<TaskRecord, ForemanError> {
        self.lease
            .create(payload, required_submissions, max_attempts)
            .await
    }

    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<TaskRecord>, ForemanError> {
        match status {
            Some(status) => self.store.list_tasks_in(status).await,
            None => self.store.list_tasks().await,
        }
    }

    pub async fn get_task(&self, id: TaskId) -> Result<TaskDetail, ForemanError> {
        let task = self
            .store
            .get_task(id)
            .await?
            .ok_or(ForemanError::TaskNotFound(id))?;
        let submissions = self.store.list_submissions(id).await?;
        Ok(TaskDetail { task, submissions })
    }

    pub async fn claim_next(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Option<TaskRecord>, ForemanError> {
        self.lease.claim(worker_id).await
    }

    // ---- workers ----

    pub async fn register_worker(
        &self,
        worker_id: &WorkerId,
        capabilities: Option<Vec<String>>,
    ) -> Result<WorkerRecord, ForemanError> {
        self.registry.register(worker_id, capabilities).await
    }

    /// Liveness plus explicit lease renewal: only the listed task ids are
    /// renewed, so abandoned claims are never silently extended. A renewal
    /// conflict does not fail the heartbeat; it is reported in the ack.
    pub async fn heartbeat(
        &self,
        worker_id: &WorkerId,
        renew_task_ids: &[TaskId],
    ) -> Result<HeartbeatAck, ForemanError> {
        self.registry.heartbeat(worker_id).await?;

        let mut ack = HeartbeatAck {
            renewed: Vec::new(),
            conflicts: Vec::new(),
        };
        for &task_id in renew_task_ids {
            match self.lease.renew(worker_id, task_id).await {
                Ok(_) => ack.renewed.push(task_id),
                Err(err) if err.kind() == ErrorKind::Unavailable => return Err(err),
                Err(err) => ack.conflicts.push(RenewConflict {
                    task_id,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(ack)
    }

    pub async fn list_workers(&self) -> Result<Vec<WorkerView>, ForemanError> {
        self.registry.list().await
    }

    // ---- results ----

    pub async fn submit_result(
        &self,
        worker_id: &WorkerId,
        task_id: TaskId,
        label: &str,
        confidence: f64,
    ) -> Result<SubmitOutcome, ForemanError> {
        self.consensus
            .submit(worker_id, task_id, label, confidence)
            .await
    }

    pub async fn leaderboard(&self) -> Result<Vec<ScoreRecord>, ForemanError> {
        self.store.leaderboard().await
    }

    // ---- ops ----

    /// Run one sweep now (operational/debug).
    pub async fn force_sweep(&self) -> Result<SweepReport, ForemanError> {
        self.lease.requeue_expired().await
    }

    pub async fn stats(&self) -> Result<CoordinatorStats, ForemanError> {
        let tasks_by_status = self.store.counts().await?;
        let submissions = self.store.submission_count().await?;
        let workers = self.registry.list().await?;
        let workers_stale = workers
            .iter()
            .filter(|view| view.status != WorkerStatus::Active)
            .count();
        Ok(CoordinatorStats {
            tasks_total: tasks_by_status.total(),
            tasks_by_status,
            submissions,
            workers: workers.len(),
            workers_stale,
        })
    }

    /// Wipe all entities. Non-production use only.
    pub async fn reset(&self) -> Result<(), ForemanError> {
        self.store.reset().await
    }

    /// Liveness of the coordinator process itself; store reachability is
    /// deliberately not part of this check.
    pub fn health(&self) -> Health {
        Health { ok: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryStore;
    use crate::ports::{FixedClock, SystemClock, UlidGenerator};
    use chrono::{Duration, TimeZone, Utc};

    fn coordinator() -> (Arc<FixedClock>, Coordinator) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let coordinator = Coordinator::new(
            Arc::new(InMemoryStore::new()),
            clock.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(Config::default()),
        );
        (clock, coordinator)
    }

    fn payload(text: &str) -> serde_json::Value {
        serde_json::json!({ "text": text })
    }

    #[tokio::test]
    async fn lost_lease_end_to_end() {
        let (clock, c) = coordinator();
        let w1 = WorkerId::new("w1");
        let w2 = WorkerId::new("w2");

        // A single-submission task; w1 claims it and then disappears.
        let task = c
            .create_task(payload("test"), Some(1), None)
            .await
            .unwrap();
        let claimed = c.claim_next(&w1).await.unwrap().unwrap();
        assert_eq!(claimed.id, task.id);
        assert!(claimed.held_by(&w1));

        // w1 never heartbeats; after LEASE_SECONDS the sweep reclaims it.
        clock.advance(Duration::seconds(76));
        let report = c.force_sweep().await.unwrap();
        assert_eq!(report.requeued, 1);

        let detail = c.get_task(task.id).await.unwrap();
        assert_eq!(detail.task.status, TaskStatus::Pending);
        assert_eq!(detail.task.attempts, 1);

        // w2 claims and completes it with the sole required submission.
        let reclaimed = c.claim_next(&w2).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, task.id);
        let outcome = c
            .submit_result(&w2, task.id, "positive", 0.9)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Finalized {
                label: "positive".into()
            }
        );

        let board = c.leaderboard().await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].worker_id, w2);
        assert_eq!(board[0].points, 1);
    }

    #[tokio::test]
    async fn heartbeat_renews_only_the_listed_leases() {
        let (clock, c) = coordinator();
        let w = WorkerId::new("w1");
        c.register_worker(&w, None).await.unwrap();

        c.create_task(payload("a"), None, None).await.unwrap();
        c.create_task(payload("b"), None, None).await.unwrap();
        let t1 = c.claim_next(&w).await.unwrap().unwrap();
        let t2 = c.claim_next(&w).await.unwrap().unwrap();

        clock.advance(Duration::seconds(30));
        let ack = c.heartbeat(&w, &[t1.id]).await.unwrap();
        assert_eq!(ack.renewed, vec![t1.id]);
        assert!(ack.conflicts.is_empty());

        // Only t1 moved; t2 keeps its original deadline and expires first.
        let d1 = c.get_task(t1.id).await.unwrap().task;
        let d2 = c.get_task(t2.id).await.unwrap().task;
        assert!(d1.lease_expires_at.unwrap() > d2.lease_expires_at.unwrap());

        // Keep the worker live and t1 renewed past t2's old deadline.
        clock.advance(Duration::seconds(46));
        c.heartbeat(&w, &[t1.id]).await.unwrap();
        let report = c.force_sweep().await.unwrap();
        assert_eq!(report.requeued, 1);
        assert_eq!(
            c.get_task(t2.id).await.unwrap().task.status,
            TaskStatus::Pending
        );
        assert_eq!(
            c.get_task(t1.id).await.unwrap().task.status,
            TaskStatus::Assigned
        );
    }

    #[tokio::test]
    async fn heartbeat_reports_conflicts_without_failing_liveness() {
        let (_, c) = coordinator();
        let w1 = WorkerId::new("w1");
        let w2 = WorkerId::new("w2");

        c.create_task(payload("a"), None, None).await.unwrap();
        let held_by_other = c.claim_next(&w2).await.unwrap().unwrap();

        let ack = c.heartbeat(&w1, &[held_by_other.id]).await.unwrap();
        assert!(ack.renewed.is_empty());
        assert_eq!(ack.conflicts.len(), 1);
        assert_eq!(ack.conflicts[0].task_id, held_by_other.id);

        // The liveness update still landed (auto-registered on first beat).
        let views = c.list_workers().await.unwrap();
        assert!(views.iter().any(|v| v.worker.worker_id == w1));
    }

    #[tokio::test]
    async fn list_tasks_supports_status_filter() {
        let (_, c) = coordinator();
        c.create_task(payload("a"), None, None).await.unwrap();
        c.create_task(payload("b"), None, None).await.unwrap();
        c.claim_next(&WorkerId::new("w1")).await.unwrap().unwrap();

        assert_eq!(c.list_tasks(None).await.unwrap().len(), 2);
        assert_eq!(
            c.list_tasks(Some(TaskStatus::Pending)).await.unwrap().len(),
            1
        );
        assert_eq!(
            c.list_tasks(Some(TaskStatus::Assigned)).await.unwrap().len(),
            1
        );
        assert!(c
            .list_tasks(Some(TaskStatus::Completed))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn stats_and_reset() {
        let (clock, c) = coordinator();
        let w = WorkerId::new("w1");
        c.register_worker(&w, None).await.unwrap();
        let task = c.create_task(payload("a"), Some(2), None).await.unwrap();
        c.claim_next(&w).await.unwrap().unwrap();
        c.submit_result(&w, task.id, "positive", 0.8).await.unwrap();

        clock.advance(Duration::seconds(50));
        let stats = c.stats().await.unwrap();
        assert_eq!(stats.tasks_total, 1);
        assert_eq!(stats.tasks_by_status.assigned, 1);
        assert_eq!(stats.submissions, 1);
        assert_eq!(stats.workers, 1);
        assert_eq!(stats.workers_stale, 1);

        c.reset().await.unwrap();
        let stats = c.stats().await.unwrap();
        assert_eq!(stats.tasks_total, 0);
        assert_eq!(stats.submissions, 0);
        assert_eq!(stats.workers, 0);
    }

    #[tokio::test]
    async fn get_task_detail_includes_submissions() {
        let (_, c) = coordinator();
        let w = WorkerId::new("w1");
        let task = c.create_task(payload("a"), Some(2), None).await.unwrap();
        c.claim_next(&w).await.unwrap().unwrap();
        c.submit_result(&w, task.id, "positive", 0.8).await.unwrap();

        let detail = c.get_task(task.id).await.unwrap();
        assert_eq!(detail.submissions.len(), 1);
        assert_eq!(detail.submissions[0].label, "positive");

        let ghost = TaskId::from_ulid(ulid::Ulid::new());
        assert!(matches!(
            c.get_task(ghost).await.unwrap_err(),
            ForemanError::TaskNotFound(_)
        ));
    }

    #[test]
    fn health_is_process_liveness() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let c = Coordinator::new(
            Arc::new(InMemoryStore::new()),
            clock,
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(Config::default()),
        );
        assert!(c.health().ok);
    }
}
