//! Store port - 耐久ストアの正本（source of truth）
//!
//! Store は以下の4コレクションを管理します：
//! - Task（lease 状態を含む）
//! - Submission（consensus の入力集合）
//! - Worker（heartbeat timestamp）
//! - Score（consensus の得点）
//!
//! # 設計原則
//! - 正本はここ: どのコンポーネントも操作のスコープを超えて状態を
//!   キャッシュしない。
//! - 並行制御のプリミティブは `update_task` の version CAS ひとつだけ。
//!   グローバルロックも分散ロックも使わない。
//! - プロセス再起動後も lease 情報は失われない契約（期限切れルールは
//!   通常どおり適用される）。InMemoryStore は開発・テスト用の実装で、
//!   永続エンジンはこの trait の後ろに差し込む。

use async_trait::async_trait;

use crate::app::status::TaskCounts;
use crate::domain::{
    ForemanError, ScoreRecord, SubmissionRecord, TaskId, TaskRecord, TaskStatus, WorkerId,
    WorkerRecord,
};

/// Durable store port. All entity state lives behind this trait.
///
/// Error contract: anything other than the explicitly documented outcomes is
/// `ForemanError::StoreUnavailable` — operations fail closed, and a caller
/// whose update outcome is unknown must re-read, never assume success.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- tasks ----

    /// Insert a freshly created task.
    async fn insert_task(&self, task: TaskRecord) -> Result<(), ForemanError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<TaskRecord>, ForemanError>;

    /// All tasks, oldest first by creation order.
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, ForemanError>;

    /// Tasks in `status`, oldest first by creation order. Requeued tasks keep
    /// their original position (FIFO is not re-stamped).
    async fn list_tasks_in(&self, status: TaskStatus) -> Result<Vec<TaskRecord>, ForemanError>;

    /// Conditional update (compare-and-set keyed on `task.version`).
    ///
    /// Applies `task` and bumps the stored version only if the stored record
    /// still carries the same version the caller read. `Ok(false)` means the
    /// caller lost the race; re-read and re-decide, nothing was written.
    async fn update_task(&self, task: TaskRecord) -> Result<bool, ForemanError>;

    // ---- submissions ----

    /// Record a submission. Rejects a second submission for the same
    /// (task, worker) pair with `DuplicateSubmission`; the original stands.
    async fn insert_submission(&self, submission: SubmissionRecord) -> Result<(), ForemanError>;

    /// Submissions for a task, in submission order.
    async fn list_submissions(&self, task_id: TaskId)
        -> Result<Vec<SubmissionRecord>, ForemanError>;

    /// Total submission count across all tasks (observability).
    async fn submission_count(&self) -> Result<usize, ForemanError>;

    // ---- workers ----

    /// Create or replace a worker record (last write wins; heartbeats are
    /// monotone so this needs no CAS).
    async fn put_worker(&self, worker: WorkerRecord) -> Result<(), ForemanError>;

    async fn get_worker(&self, id: &WorkerId) -> Result<Option<WorkerRecord>, ForemanError>;

    async fn list_workers(&self) -> Result<Vec<WorkerRecord>, ForemanError>;

    // ---- scores ----

    /// Award one point; returns the new total.
    async fn add_point(&self, worker_id: &WorkerId) -> Result<u64, ForemanError>;

    /// Scores ranked by points, highest first.
    async fn leaderboard(&self) -> Result<Vec<ScoreRecord>, ForemanError>;

    // ---- ops ----

    /// Task counts by status (observability).
    async fn counts(&self) -> Result<TaskCounts, ForemanError>;

    /// Wipe all entities. Non-production use only.
    async fn reset(&self) -> Result<(), ForemanError>;
}
