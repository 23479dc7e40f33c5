//! Status views - 観測用の読み取りビュー
//!
//! ここにあるのは要約・集計の「形」だけで、状態の正本は Store にあります。

use serde::{Deserialize, Serialize};

use crate::domain::{SubmissionRecord, TaskRecord, WorkerRecord, WorkerStatus};

/// Task counts by status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.assigned + self.completed + self.failed
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Tasks returned to the pending pool.
    pub requeued: usize,

    /// Tasks that hit their attempt bound and were failed.
    pub failed: usize,

    /// Tasks whose stranded quorum was finalized during the sweep.
    pub finalized: usize,
}

/// Task detail: the record plus its consensus input set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task: TaskRecord,
    pub submissions: Vec<SubmissionRecord>,
}

/// Worker record with its liveness derived at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerView {
    pub worker: WorkerRecord,
    pub status: WorkerStatus,
}

/// Coordinator-wide stats snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub tasks_total: usize,
    pub tasks_by_status: TaskCounts,
    pub submissions: usize,
    pub workers: usize,
    pub workers_stale: usize,
}

/// Liveness of the coordinator process itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
}
