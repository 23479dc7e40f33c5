//! Errors - エラー型と運用分類
//!
//! 呼び出し元（ワーカー）がハンドリングを選べるよう、
//! エラーは [`ErrorKind`] で分類できます。
//! コーディネータ内部でのリトライは行いません（リトライは呼び出し元の責務）。

use thiserror::Error;

use super::TaskId;
use super::worker::WorkerId;

/// Boundary classification of a coordinator error.
///
/// - `NotFound`: referenced entity does not exist; no retry.
/// - `Conflict`: lease no longer held by the claimed owner; caller must stop
///   treating itself as the task owner.
/// - `Duplicate`: resubmission for an already-scored (task, worker) pair;
///   the original stands.
/// - `Exhausted`: the task already failed past `max_attempts`.
/// - `Unavailable`: the durable store could not be reached; fail closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Duplicate,
    Exhausted,
    Unavailable,
}

#[derive(Debug, Error)]
pub enum ForemanError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error("lease conflict for task {task_id}: {reason}")]
    LeaseConflict { task_id: TaskId, reason: String },

    #[error("duplicate submission for task {task_id} by worker {worker_id}")]
    DuplicateSubmission {
        task_id: TaskId,
        worker_id: WorkerId,
    },

    #[error("task {0} exhausted its attempts")]
    AttemptsExhausted(TaskId),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ForemanError {
    pub fn conflict(task_id: TaskId, reason: impl Into<String>) -> Self {
        Self::LeaseConflict {
            task_id,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ForemanError::TaskNotFound(_) | ForemanError::WorkerNotFound(_) => ErrorKind::NotFound,
            ForemanError::LeaseConflict { .. } => ErrorKind::Conflict,
            ForemanError::DuplicateSubmission { .. } => ErrorKind::Duplicate,
            ForemanError::AttemptsExhausted(_) => ErrorKind::Exhausted,
            ForemanError::StoreUnavailable(_) => ErrorKind::Unavailable,
        }
    }
}
