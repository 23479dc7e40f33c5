//! Config - プロセス全体のチューニング値
//!
//! 環境変数で上書き可能、プロセスの寿命の間は固定です。
//! タスク個別の値（quorum, max_attempts）は作成時にここの既定値から
//! 焼き付けられ、以後この Config を参照しません。

use chrono::Duration;

/// Workers go Offline after this many heartbeat TTLs of silence
/// (Stale between one TTL and this bound).
const OFFLINE_TTL_MULTIPLIER: i64 = 4;

/// Process-wide tunables. Read once at startup; fixed for the process
/// lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    /// Heartbeat freshness window in seconds (`HEARTBEAT_TTL_SECONDS`).
    pub heartbeat_ttl_seconds: u64,

    /// How long a claim is honored without renewal (`LEASE_SECONDS`).
    pub lease_seconds: u64,

    /// Background sweep interval (`REQUEUE_SWEEP_SECONDS`).
    pub requeue_sweep_seconds: u64,

    /// Attempt bound for tasks that don't override it
    /// (`MAX_ATTEMPTS_DEFAULT`).
    pub max_attempts_default: u32,

    /// Quorum size for tasks that don't override it
    /// (`REQUIRED_SUBMISSIONS_DEFAULT`).
    pub required_submissions_default: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_ttl_seconds: 45,
            lease_seconds: 75,
            requeue_sweep_seconds: 15,
            max_attempts_default: 5,
            required_submissions_default: 3,
        }
    }
}

impl Config {
    /// Load from the environment, falling back to defaults for anything
    /// unset or unparsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            heartbeat_ttl_seconds: env_parse("HEARTBEAT_TTL_SECONDS", d.heartbeat_ttl_seconds),
            lease_seconds: env_parse("LEASE_SECONDS", d.lease_seconds),
            requeue_sweep_seconds: env_parse("REQUEUE_SWEEP_SECONDS", d.requeue_sweep_seconds),
            max_attempts_default: env_parse("MAX_ATTEMPTS_DEFAULT", d.max_attempts_default),
            required_submissions_default: env_parse(
                "REQUIRED_SUBMISSIONS_DEFAULT",
                d.required_submissions_default,
            ),
        }
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::seconds(self.lease_seconds as i64)
    }

    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::seconds(self.heartbeat_ttl_seconds as i64)
    }

    /// Silence bound past which a worker is Offline rather than Stale.
    pub fn offline_after(&self) -> Duration {
        Duration::seconds(self.heartbeat_ttl_seconds as i64 * OFFLINE_TTL_MULTIPLIER)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.requeue_sweep_seconds)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
