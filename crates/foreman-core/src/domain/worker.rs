//! Worker identity, liveness, and score records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable worker identity, chosen by the worker itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Worker liveness, derived from `last_heartbeat_at` on every read.
///
/// 意図的に保存しない: timestamp とラベルの間にドリフトが生まれないように、
/// status は読み取り時に計算します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Heartbeat seen within one TTL.
    Active,

    /// Heartbeat missing for more than one TTL but not yet offline.
    Stale,

    /// Heartbeat missing past the offline window.
    Offline,
}

/// Worker record. Liveness status is NOT a field; see [`WorkerRecord::status_at`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    pub last_heartbeat_at: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,

    /// Opaque tag set, unused by the core logic but carried for future routing.
    pub capabilities: Vec<String>,
}

impl WorkerRecord {
    pub fn new(worker_id: WorkerId, capabilities: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            worker_id,
            last_heartbeat_at: now,
            registered_at: now,
            capabilities,
        }
    }

    /// Record a liveness signal.
    pub fn beat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat_at = now;
    }

    /// Derive liveness at `now`.
    ///
    /// - `Active` while `now - last_heartbeat_at < ttl`
    /// - `Stale` until `offline_after`
    /// - `Offline` beyond that
    pub fn status_at(&self, now: DateTime<Utc>, ttl: Duration, offline_after: Duration) -> WorkerStatus {
        let silence = now - self.last_heartbeat_at;
        if silence < ttl {
            WorkerStatus::Active
        } else if silence < offline_after {
            WorkerStatus::Stale
        } else {
            WorkerStatus::Offline
        }
    }
}

/// Consensus points for one worker. Monotonically incremented, never
/// decremented, updated only by the consensus engine at finalization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub worker_id: WorkerId,
    pub points: u64,
}
