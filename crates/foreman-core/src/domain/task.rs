//! Task record: the unit of coordinated work and its lease state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;
use super::worker::WorkerId;

/// Task status (lease lifecycle).
///
/// State transitions:
/// - Pending -> Assigned (claim)
/// - Assigned -> Completed (quorum reached)
/// - Assigned -> Pending (lease expired / holder stale; attempts += 1)
/// - Assigned | Pending -> Failed (attempts exhausted on sweep)
///
/// Design note: Completed and Failed are terminal; a task never re-enters
/// Pending from a terminal state. Using an enum ensures exhaustive matching
/// and prevents invalid states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the pool, eligible for claim.
    Pending,

    /// Leased to exactly one worker until `lease_expires_at`.
    Assigned,

    /// Finalized by consensus; `finalized_label` is set.
    Completed,

    /// Gave up after `max_attempts` claim cycles.
    Failed,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Is this task eligible for lease (claimable)?
    pub fn is_claimable(self) -> bool {
        matches!(self, TaskStatus::Pending)
    }
}

/// Metadata + payload for a task owned by the durable store.
///
/// Design:
/// - The store is the single source of truth; nothing caches this across calls.
/// - `version` is the optimistic-concurrency token: every successful
///   conditional update bumps it, so no two transitions succeed from the
///   same starting state.
/// - Invariant: `reserved_by` and `lease_expires_at` are both `Some` or both
///   `None`. The transition methods below are the only mutation points and
///   preserve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,

    /// Opaque content to be processed; the coordinator never interprets it.
    pub payload: serde_json::Value,

    pub status: TaskStatus,

    /// Worker holding the current lease, if any.
    pub reserved_by: Option<WorkerId>,

    /// Lease deadline, meaningful only while Assigned.
    pub lease_expires_at: Option<DateTime<Utc>>,

    /// Claim cycles that did not reach completion. Only ever increases.
    pub attempts: u32,

    /// Bound after which the task fails instead of being requeued.
    pub max_attempts: u32,

    /// Quorum size needed before consensus can finalize.
    pub required_submissions: u32,

    /// Set once, on transition to Completed.
    pub finalized_label: Option<String>,
    pub finalized_at: Option<DateTime<Utc>>,

    /// Terminal reason, set on transition to Failed.
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Store-owned CAS token; bumped by the store on every applied update.
    pub version: u64,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        payload: serde_json::Value,
        required_submissions: u32,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payload,
            status: TaskStatus::Pending,
            reserved_by: None,
            lease_expires_at: None,
            attempts: 0,
            max_attempts,
            required_submissions,
            finalized_label: None,
            finalized_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Has the current lease expired at `now`? False when not leased.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lease_expires_at, Some(deadline) if deadline <= now)
    }

    /// Is `worker` the current lease holder?
    pub fn held_by(&self, worker: &WorkerId) -> bool {
        self.reserved_by.as_ref() == Some(worker)
    }

    /// Pending -> Assigned: lease to `worker` until `lease_until`.
    pub fn claim(&mut self, worker: WorkerId, lease_until: DateTime<Utc>, now: DateTime<Utc>) {
        debug_assert!(self.status.is_claimable());
        self.status = TaskStatus::Assigned;
        self.reserved_by = Some(worker);
        self.lease_expires_at = Some(lease_until);
        self.updated_at = now;
    }

    /// Extend the lease deadline (status and holder unchanged).
    pub fn renew(&mut self, lease_until: DateTime<Utc>, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, TaskStatus::Assigned);
        self.lease_expires_at = Some(lease_until);
        self.updated_at = now;
    }

    /// Assigned -> Pending: lease lost, count the failed cycle.
    ///
    /// The task re-enters the pool at its original `created_at` position;
    /// FIFO order is not re-stamped.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Pending;
        self.reserved_by = None;
        self.lease_expires_at = None;
        self.attempts += 1;
        self.updated_at = now;
    }

    /// -> Failed: attempts exhausted.
    pub fn mark_failed(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.reserved_by = None;
        self.lease_expires_at = None;
        self.error_message = Some(reason.into());
        self.updated_at = now;
    }

    /// Assigned -> Completed: consensus reached on `label`.
    pub fn finalize(&mut self, label: impl Into<String>, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.reserved_by = None;
        self.lease_expires_at = None;
        self.finalized_label = Some(label.into());
        self.finalized_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ulid::Ulid;

    fn task(now: DateTime<Utc>) -> TaskRecord {
        TaskRecord::new(
            TaskId::from_ulid(Ulid::new()),
            serde_json::json!({"text": "hello"}),
            3,
            5,
            now,
        )
    }

    #[test]
    fn new_task_is_pending_and_unleased() {
        let now = Utc::now();
        let t = task(now);
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.reserved_by.is_none());
        assert!(t.lease_expires_at.is_none());
        assert_eq!(t.attempts, 0);
        assert!(!t.lease_expired(now));
    }

    #[test]
    fn claim_then_requeue_keeps_lease_fields_paired() {
        let now = Utc::now();
        let mut t = task(now);
        let w = WorkerId::new("w1");

        t.claim(w.clone(), now + Duration::seconds(75), now);
        assert_eq!(t.status, TaskStatus::Assigned);
        assert!(t.held_by(&w));
        assert!(t.lease_expires_at.is_some());

        t.requeue(now + Duration::seconds(80));
        assert_eq!(t.status, TaskStatus::Pending);
        // 片方だけ残らないこと
        assert!(t.reserved_by.is_none());
        assert!(t.lease_expires_at.is_none());
        assert_eq!(t.attempts, 1);
    }

    #[test]
    fn lease_expiry_is_deadline_inclusive() {
        let now = Utc::now();
        let mut t = task(now);
        let deadline = now + Duration::seconds(75);
        t.claim(WorkerId::new("w1"), deadline, now);

        assert!(!t.lease_expired(now));
        assert!(!t.lease_expired(deadline - Duration::seconds(1)));
        assert!(t.lease_expired(deadline));
        assert!(t.lease_expired(deadline + Duration::seconds(1)));
    }

    #[test]
    fn finalize_clears_lease_and_sets_label_once() {
        let now = Utc::now();
        let mut t = task(now);
        t.claim(WorkerId::new("w1"), now + Duration::seconds(75), now);

        let later = now + Duration::seconds(10);
        t.finalize("positive", later);

        assert_eq!(t.status, TaskStatus::Completed);
        assert!(t.status.is_terminal());
        assert_eq!(t.finalized_label.as_deref(), Some("positive"));
        assert_eq!(t.finalized_at, Some(later));
        assert!(t.reserved_by.is_none());
        assert!(t.lease_expires_at.is_none());
    }

    #[test]
    fn status_roundtrips_through_serde_as_snake_case() {
        let s = serde_json::to_string(&TaskStatus::Pending).unwrap();
        assert_eq!(s, "\"pending\"");
        let back: TaskStatus = serde_json::from_str("\"assigned\"").unwrap();
        assert_eq!(back, TaskStatus::Assigned);
    }
}
