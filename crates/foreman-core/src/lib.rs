//! foreman-core
//!
//! Core building blocks for the Foreman task coordinator: distributed work
//! items are leased to an unbounded pool of unreliable workers, reclaimed on
//! lease expiry, and finalized by majority-vote consensus.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, submission, worker, errors）
//! - **ports**: 抽象化レイヤー（Store, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（config, lease, registry, consensus,
//!   sweeper, coordinator, status）
//! - **impls**: 実装（InMemoryStore など開発用）
//!
//! # 並行モデル
//! 共有可変状態は Store だけで、すべての変更は単一レコードの conditional
//! update（version CAS）です。グローバルロックなし、分散ロックなし、
//! 2相コミットなし。sweeper と claim/renew/submit は完全に並行して走れます。

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
