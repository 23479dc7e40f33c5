//! In-memory store implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app::status::TaskCounts;
use crate::domain::{
    ForemanError, ScoreRecord, SubmissionRecord, TaskId, TaskRecord, TaskStatus, WorkerId,
    WorkerRecord,
};
use crate::ports::Store;

/// In-memory store state.
struct InMemoryState {
    /// All task records (single source of truth for tasks).
    tasks: HashMap<TaskId, TaskRecord>,

    /// Task creation order (TaskIds only). Never reordered, so a requeued
    /// task keeps its original FIFO position.
    task_order: Vec<TaskId>,

    /// Submissions in arrival order.
    submissions: Vec<SubmissionRecord>,

    /// Dedup index for (task, worker) pairs.
    submitted_pairs: HashSet<(TaskId, WorkerId)>,

    /// Worker records.
    workers: HashMap<WorkerId, WorkerRecord>,

    /// Consensus points.
    scores: HashMap<WorkerId, u64>,
}

impl InMemoryState {
    fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            task_order: Vec::new(),
            submissions: Vec::new(),
            submitted_pairs: HashSet::new(),
            workers: HashMap::new(),
            scores: HashMap::new(),
        }
    }

    fn counts_by_status(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Assigned => counts.assigned += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// In-memory store. Development and test implementation of the [`Store`]
/// port; a durable engine plugs in behind the same trait.
///
/// The single mutex models the store's per-record atomicity guarantee: every
/// mutation happens entirely inside one lock scope, and `update_task` applies
/// the version compare-and-set that callers rely on for task transitions.
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_task(&self, task: TaskRecord) -> Result<(), ForemanError> {
        let mut state = self.state.lock().await;
        if state.tasks.contains_key(&task.id) {
            return Err(ForemanError::StoreUnavailable(format!(
                "task id collision: {}",
                task.id
            )));
        }
        state.task_order.push(task.id);
        state.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<TaskRecord>, ForemanError> {
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, ForemanError> {
        let state = self.state.lock().await;
        Ok(state
            .task_order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect())
    }

    async fn list_tasks_in(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, ForemanError> {
        let state = self.state.lock().await;
        Ok(state
            .task_order
            .iter()
            .filter_map(|id| state.tasks.get(id))
            .filter(|task| task.status == status)
            .cloned()
            .collect())
    }

    async fn update_task(&self, mut task: TaskRecord) -> Result<bool, ForemanError> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.tasks.get_mut(&task.id) else {
            return Err(ForemanError::TaskNotFound(task.id));
        };
        if stored.version != task.version {
            // Caller read a stale record; nothing is written.
            return Ok(false);
        }
        task.version += 1;
        *stored = task;
        Ok(true)
    }

    async fn insert_submission(&self, submission: SubmissionRecord) -> Result<(), ForemanError> {
        let mut state = self.state.lock().await;
        let pair = (submission.task_id, submission.worker_id.clone());
        if state.submitted_pairs.contains(&pair) {
            return Err(ForemanError::DuplicateSubmission {
                task_id: submission.task_id,
                worker_id: submission.worker_id,
            });
        }
        state.submitted_pairs.insert(pair);
        state.submissions.push(submission);
        Ok(())
    }

    async fn list_submissions(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<SubmissionRecord>, ForemanError> {
        let state = self.state.lock().await;
        Ok(state
            .submissions
            .iter()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn submission_count(&self) -> Result<usize, ForemanError> {
        let state = self.state.lock().await;
        Ok(state.submissions.len())
    }

    async fn put_worker(&self, worker: WorkerRecord) -> Result<(), ForemanError> {
        let mut state = self.state.lock().await;
        state.workers.insert(worker.worker_id.clone(), worker);
        Ok(())
    }

    async fn get_worker(&self, id: &WorkerId) -> Result<Option<WorkerRecord>, ForemanError> {
        let state = self.state.lock().await;
        Ok(state.workers.get(id).cloned())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, ForemanError> {
        let state = self.state.lock().await;
        let mut workers: Vec<_> = state.workers.values().cloned().collect();
        workers.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        Ok(workers)
    }

    async fn add_point(&self, worker_id: &WorkerId) -> Result<u64, ForemanError> {
        let mut state = self.state.lock().await;
        let points = state.scores.entry(worker_id.clone()).or_insert(0);
        *points += 1;
        Ok(*points)
    }

    async fn leaderboard(&self) -> Result<Vec<ScoreRecord>, ForemanError> {
        let state = self.state.lock().await;
        let mut rows: Vec<ScoreRecord> = state
            .scores
            .iter()
            .map(|(worker_id, points)| ScoreRecord {
                worker_id: worker_id.clone(),
                points: *points,
            })
            .collect();
        // Highest first; worker_id as a stable tie-break.
        rows.sort_by(|a, b| b.points.cmp(&a.points).then(a.worker_id.cmp(&b.worker_id)));
        Ok(rows)
    }

    async fn counts(&self) -> Result<TaskCounts, ForemanError> {
        let state = self.state.lock().await;
        Ok(state.counts_by_status())
    }

    async fn reset(&self) -> Result<(), ForemanError> {
        let mut state = self.state.lock().await;
        *state = InMemoryState::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubmissionId;
    use chrono::Utc;
    use ulid::Ulid;

    fn new_task(payload: &str) -> TaskRecord {
        TaskRecord::new(
            TaskId::from_ulid(Ulid::new()),
            serde_json::json!({ "text": payload }),
            3,
            5,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_and_list_preserves_creation_order() {
        let store = InMemoryStore::new();
        let t1 = new_task("a");
        let t2 = new_task("b");
        let t3 = new_task("c");
        let expected = vec![t1.id, t2.id, t3.id];

        store.insert_task(t1).await.unwrap();
        store.insert_task(t2).await.unwrap();
        store.insert_task(t3).await.unwrap();

        let listed: Vec<_> = store
            .list_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn update_task_cas_rejects_stale_version() {
        let store = InMemoryStore::new();
        let task = new_task("a");
        let id = task.id;
        store.insert_task(task).await.unwrap();

        // Two readers pick up the same version.
        let mut first = store.get_task(id).await.unwrap().unwrap();
        let mut second = store.get_task(id).await.unwrap().unwrap();

        first.claim(WorkerId::new("w1"), Utc::now(), Utc::now());
        assert!(store.update_task(first).await.unwrap());

        // The second writer lost the race; nothing is written.
        second.claim(WorkerId::new("w2"), Utc::now(), Utc::now());
        assert!(!store.update_task(second).await.unwrap());

        let stored = store.get_task(id).await.unwrap().unwrap();
        assert!(stored.held_by(&WorkerId::new("w1")));
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn update_task_unknown_id_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.update_task(new_task("ghost")).await.unwrap_err();
        assert!(matches!(err, ForemanError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected_and_set_unchanged() {
        let store = InMemoryStore::new();
        let task = new_task("a");
        let task_id = task.id;
        store.insert_task(task).await.unwrap();

        let sub = SubmissionRecord::new(
            SubmissionId::from_ulid(Ulid::new()),
            task_id,
            WorkerId::new("w1"),
            "positive",
            0.9,
            Utc::now(),
        );
        store.insert_submission(sub).await.unwrap();

        let dup = SubmissionRecord::new(
            SubmissionId::from_ulid(Ulid::new()),
            task_id,
            WorkerId::new("w1"),
            "negative",
            0.5,
            Utc::now(),
        );
        let err = store.insert_submission(dup).await.unwrap_err();
        assert!(matches!(err, ForemanError::DuplicateSubmission { .. }));

        let subs = store.list_submissions(task_id).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].label, "positive");
    }

    #[tokio::test]
    async fn leaderboard_ranks_by_points_desc() {
        let store = InMemoryStore::new();
        let w1 = WorkerId::new("w1");
        let w2 = WorkerId::new("w2");

        store.add_point(&w1).await.unwrap();
        store.add_point(&w2).await.unwrap();
        let total = store.add_point(&w2).await.unwrap();
        assert_eq!(total, 2);

        let board = store.leaderboard().await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].worker_id, w2);
        assert_eq!(board[0].points, 2);
        assert_eq!(board[1].worker_id, w1);
        assert_eq!(board[1].points, 1);
    }

    #[tokio::test]
    async fn reset_wipes_everything() {
        let store = InMemoryStore::new();
        store.insert_task(new_task("a")).await.unwrap();
        store.add_point(&WorkerId::new("w1")).await.unwrap();
        store
            .put_worker(WorkerRecord::new(WorkerId::new("w1"), vec![], Utc::now()))
            .await
            .unwrap();

        store.reset().await.unwrap();

        assert!(store.list_tasks().await.unwrap().is_empty());
        assert!(store.list_workers().await.unwrap().is_empty());
        assert!(store.leaderboard().await.unwrap().is_empty());
        assert_eq!(store.counts().await.unwrap().pending, 0);
    }
}
