//! SweeperLoop - 期限切れ lease の回収ループ
//!
//! 一定間隔で [`LeaseManager::requeue_expired`] を呼ぶだけの背景タスクです。
//! 特権は何も持ちません: 他の呼び出し元と同じ conditional update を
//! 発行するだけなので、claim/renew と完全に並行して走れます。

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::lease::LeaseManager;

/// Background sweeper handle.
/// - `request_shutdown()` で停止を要求
/// - `shutdown_and_join()` で終了を待てる
pub struct SweeperLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperLoop {
    /// Spawn the periodic sweep.
    pub fn spawn(lease: LeaseManager, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            sweep_loop(lease, interval, shutdown_rx).await;
        });

        Self { shutdown_tx, join }
    }

    /// Request shutdown. An in-flight sweep finishes; no new one starts.
    pub fn request_shutdown(&self) {
        // ignore send error: receiver may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for the loop to exit.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn sweep_loop(lease: LeaseManager, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender counts as shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("sweeper shutting down");
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {
                match lease.requeue_expired().await {
                    Ok(report) => {
                        if report.requeued > 0 || report.failed > 0 || report.finalized > 0 {
                            info!(
                                requeued = report.requeued,
                                failed = report.failed,
                                finalized = report.finalized,
                                "sweep reclaimed leases"
                            );
                        }
                    }
                    // Never fatal: log and retry on the next interval.
                    Err(err) => warn!(error = %err, "sweep failed"),
                }
            }
        }
    }
}
