//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてコーディネータのロジックを
//! 実装します。
//!
//! # 主要コンポーネント
//! - **Config**: プロセス全体のチューニング値（環境変数で上書き可能）
//! - **LeaseManager**: タスク状態機械（claim/renew/requeue/fail）
//! - **WorkerRegistry**: heartbeat からの liveness 導出
//! - **ConsensusEngine**: quorum 到達時の多数決 finalization と得点
//! - **SweeperLoop**: 期限切れ lease を回収する背景タスク
//! - **Coordinator**: 全操作を束ねる薄い facade

pub mod config;
pub mod consensus;
pub mod coordinator;
pub mod lease;
pub mod registry;
pub mod status;
pub mod sweeper;

pub use self::config::Config;
pub use self::consensus::{ConsensusEngine, SubmitOutcome};
pub use self::coordinator::{Coordinator, HeartbeatAck, RenewConflict};
pub use self::lease::LeaseManager;
pub use self::registry::WorkerRegistry;
pub use self::status::{
    CoordinatorStats, Health, SweepReport, TaskCounts, TaskDetail, WorkerView,
};
pub use self::sweeper::SweeperLoop;
