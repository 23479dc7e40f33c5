//! ConsensusEngine - 多数決による finalization
//!
//! submission が quorum（`required_submissions`）に達したら、
//! 多数決でラベルを確定し、一致したワーカーに得点を与えます。
//!
//! # Tie-break
//! 同数の場合は「同数集合の中で最初に提出されたラベル」が勝ちます。
//! 決定的で、後から監査できるルールです。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    ForemanError, SubmissionRecord, TaskId, TaskRecord, TaskStatus, WorkerId,
};
use crate::ports::{Clock, IdGenerator, Store};

/// What a submission did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Recorded; quorum not reached yet (or finalization deferred to a
    /// later submission after a concurrent lease transition).
    Recorded,

    /// This submission completed the quorum and the task finalized.
    Finalized { label: String },
}

/// Records submissions and finalizes tasks once quorum is reached.
#[derive(Clone)]
pub struct ConsensusEngine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl ConsensusEngine {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, clock, ids }
    }

    /// Record `worker`'s result for `task_id`, finalizing the task if this
    /// completes the quorum.
    ///
    /// The task must currently be assigned; a worker submits at most once
    /// per task and a duplicate leaves the consensus input set unchanged.
    pub async fn submit(
        &self,
        worker: &WorkerId,
        task_id: TaskId,
        label: &str,
        confidence: f64,
    ) -> Result<SubmitOutcome, ForemanError> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(ForemanError::TaskNotFound(task_id))?;

        match task.status {
            TaskStatus::Assigned => {}
            TaskStatus::Pending => {
                return Err(ForemanError::conflict(task_id, "task is not leased"));
            }
            TaskStatus::Completed => {
                return Err(ForemanError::conflict(task_id, "task already completed"));
            }
            TaskStatus::Failed => return Err(ForemanError::AttemptsExhausted(task_id)),
        }

        let submission = SubmissionRecord::new(
            self.ids.new_submission_id(),
            task_id,
            worker.clone(),
            label,
            confidence,
            self.clock.now(),
        );
        self.store.insert_submission(submission).await?;
        debug!(task = %task_id, worker = %worker, label, "submission recorded");

        self.try_finalize(task_id).await
    }

    /// Finalize if the quorum is met. Retries the conditional update until
    /// it lands or the task has left the assigned state; in the latter case
    /// the recorded submissions stand and either a later submission or the
    /// next sweep re-fires this check (the quorum test is `>=`, not `==`).
    async fn try_finalize(&self, task_id: TaskId) -> Result<SubmitOutcome, ForemanError> {
        loop {
            let Some(task) = self.store.get_task(task_id).await? else {
                return Ok(SubmitOutcome::Recorded);
            };
            match finalize_on_quorum(self.store.as_ref(), self.clock.as_ref(), task).await? {
                FinalizeAttempt::Finalized(label) => {
                    return Ok(SubmitOutcome::Finalized { label });
                }
                FinalizeAttempt::NotReady => return Ok(SubmitOutcome::Recorded),
                // Lost to a concurrent transition; re-read and re-decide.
                FinalizeAttempt::Lost => continue,
            }
        }
    }
}

/// Outcome of one finalization attempt.
pub(crate) enum FinalizeAttempt {
    /// Quorum not met, or the task is no longer assigned.
    NotReady,

    /// Quorum met but the conditional update lost a race; re-read to retry.
    Lost,

    /// This attempt completed the task with the contained label.
    Finalized(String),
}

/// Finalize `task` if its quorum is met: majority label, conditional update
/// to Completed, one point per agreeing worker. Shared by the submit path
/// and the sweeper, so a quorum stranded by a lost race still completes
/// instead of burning attempts.
pub(crate) async fn finalize_on_quorum(
    store: &dyn Store,
    clock: &dyn Clock,
    task: TaskRecord,
) -> Result<FinalizeAttempt, ForemanError> {
    if task.status != TaskStatus::Assigned {
        return Ok(FinalizeAttempt::NotReady);
    }
    let task_id = task.id;
    let submissions = store.list_submissions(task_id).await?;
    if (submissions.len() as u32) < task.required_submissions {
        return Ok(FinalizeAttempt::NotReady);
    }
    let Some(label) = majority_label(&submissions) else {
        return Ok(FinalizeAttempt::NotReady);
    };

    let mut finalized = task;
    finalized.finalize(label.clone(), clock.now());
    if !store.update_task(finalized).await? {
        return Ok(FinalizeAttempt::Lost);
    }

    // Score from a fresh read, not the pre-update list: a matching vote
    // that landed while the update was in flight still earns its point.
    // The store's uniqueness rule guarantees one submission per worker,
    // so no dedup is needed.
    let scored = store.list_submissions(task_id).await?;
    for sub in scored.iter().filter(|s| s.label == label) {
        store.add_point(&sub.worker_id).await?;
    }
    info!(task = %task_id, %label, votes = scored.len(), "task finalized by consensus");
    Ok(FinalizeAttempt::Finalized(label))
}

/// Majority label across submissions, ties broken by the earliest-submitted
/// label among the tied set. `None` only for an empty input.
fn majority_label(submissions: &[SubmissionRecord]) -> Option<String> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for sub in submissions {
        *counts.entry(sub.label.as_str()).or_insert(0) += 1;
    }
    let best = counts.values().copied().max()?;

    // First submission (in arrival order) whose label carries the top count
    // wins; deterministic and auditable.
    submissions
        .iter()
        .find(|sub| counts[sub.label.as_str()] == best)
        .map(|sub| sub.label.clone())
}
