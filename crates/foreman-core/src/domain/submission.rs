//! Submission record: one worker's result for one task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SubmissionId, TaskId};
use super::worker::WorkerId;

/// One worker's labeled result for one task. Immutable once written.
///
/// A worker submits at most one result per task; the store rejects
/// duplicates for the same (task, worker) pair rather than overwriting,
/// preserving the consensus input set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub label: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(
        id: SubmissionId,
        task_id: TaskId,
        worker_id: WorkerId,
        label: impl Into<String>,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_id,
            worker_id,
            label: label.into(),
            confidence,
            created_at: now,
        }
    }
}
