//! WorkerRegistry - ワーカーの liveness 管理
//!
//! タスク状態からは独立しています（sweeper が参照するだけ）。
//! status は `last_heartbeat_at` から読み取り時に導出するので、
//! timestamp とラベルがずれることはありません。

use std::sync::Arc;

use tracing::debug;

use crate::app::config::Config;
use crate::app::status::WorkerView;
use crate::domain::{ForemanError, WorkerId, WorkerRecord, WorkerStatus};
use crate::ports::{Clock, Store};

/// Tracks worker liveness from heartbeat timestamps.
#[derive(Clone)]
pub struct WorkerRegistry {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: Arc<Config>,
}

impl WorkerRegistry {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Create or refresh a worker record. Idempotent: re-registering simply
    /// refreshes liveness; capabilities are replaced only when provided.
    pub async fn register(
        &self,
        worker_id: &WorkerId,
        capabilities: Option<Vec<String>>,
    ) -> Result<WorkerRecord, ForemanError> {
        let now = self.clock.now();
        let record = match self.store.get_worker(worker_id).await? {
            Some(mut existing) => {
                existing.beat(now);
                if let Some(caps) = capabilities {
                    existing.capabilities = caps;
                }
                existing
            }
            None => {
                debug!(worker = %worker_id, "worker registered");
                WorkerRecord::new(worker_id.clone(), capabilities.unwrap_or_default(), now)
            }
        };
        self.store.put_worker(record.clone()).await?;
        Ok(record)
    }

    /// Record a liveness signal. Unknown workers are auto-registered on
    /// their first heartbeat.
    ///
    /// This only proves liveness; lease renewal is a separate, explicit
    /// request (see the coordinator facade) so abandoned claims are never
    /// silently renewed.
    pub async fn heartbeat(&self, worker_id: &WorkerId) -> Result<WorkerRecord, ForemanError> {
        let now = self.clock.now();
        let record = match self.store.get_worker(worker_id).await? {
            Some(mut existing) => {
                existing.beat(now);
                existing
            }
            None => WorkerRecord::new(worker_id.clone(), Vec::new(), now),
        };
        self.store.put_worker(record.clone()).await?;
        Ok(record)
    }

    /// Derive a worker's liveness at this instant.
    pub fn status_of(&self, worker: &WorkerRecord) -> WorkerStatus {
        worker.status_at(
            self.clock.now(),
            self.config.heartbeat_ttl(),
            self.config.offline_after(),
        )
    }

    /// All workers with their derived status.
    pub async fn list(&self) -> Result<Vec<WorkerView>, ForemanError> {
        let workers = self.store.list_workers().await?;
        Ok(workers
            .into_iter()
            .map(|worker| {
                let status = self.status_of(&worker);
                WorkerView { worker, status }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryStore;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    fn registry() -> (Arc<FixedClock>, WorkerRegistry) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let registry = WorkerRegistry::new(store, clock.clone(), Arc::new(Config::default()));
        (clock, registry)
    }

    #[tokio::test]
    async fn register_is_idempotent_and_refreshes_liveness() {
        let (clock, registry) = registry();
        let w = WorkerId::new("w1");

        let first = registry
            .register(&w, Some(vec!["gpu".into()]))
            .await
            .unwrap();
        assert_eq!(first.capabilities, vec!["gpu".to_string()]);

        clock.advance(Duration::seconds(100));
        let second = registry.register(&w, None).await.unwrap();

        // Same identity, refreshed heartbeat, capabilities kept.
        assert_eq!(second.registered_at, first.registered_at);
        assert_eq!(second.last_heartbeat_at, clock.now());
        assert_eq!(second.capabilities, vec!["gpu".to_string()]);
        assert_eq!(registry.status_of(&second), WorkerStatus::Active);
    }

    #[tokio::test]
    async fn heartbeat_auto_registers_unknown_workers() {
        let (_, registry) = registry();
        let w = WorkerId::new("fresh");
        let record = registry.heartbeat(&w).await.unwrap();
        assert_eq!(record.worker_id, w);
        assert_eq!(registry.status_of(&record), WorkerStatus::Active);
    }

    #[tokio::test]
    async fn status_degrades_with_silence() {
        let (clock, registry) = registry();
        let w = WorkerId::new("w1");
        let record = registry.register(&w, None).await.unwrap();

        assert_eq!(registry.status_of(&record), WorkerStatus::Active);

        // TTL 45s: stale after one TTL, offline after four.
        clock.advance(Duration::seconds(46));
        assert_eq!(registry.status_of(&record), WorkerStatus::Stale);

        clock.advance(Duration::seconds(200));
        assert_eq!(registry.status_of(&record), WorkerStatus::Offline);

        // A heartbeat brings it straight back.
        let refreshed = registry.heartbeat(&w).await.unwrap();
        assert_eq!(registry.status_of(&refreshed), WorkerStatus::Active);
    }

    #[tokio::test]
    async fn list_reports_derived_status_per_worker() {
        let (clock, registry) = registry();
        registry.register(&WorkerId::new("old"), None).await.unwrap();
        clock.advance(Duration::seconds(60));
        registry.register(&WorkerId::new("new"), None).await.unwrap();

        let views = registry.list().await.unwrap();
        assert_eq!(views.len(), 2);
        let by_id = |id: &str| {
            views
                .iter()
                .find(|v| v.worker.worker_id.as_str() == id)
                .unwrap()
        };
        assert_eq!(by_id("old").status, WorkerStatus::Stale);
        assert_eq!(by_id("new").status, WorkerStatus::Active);
    }
}
