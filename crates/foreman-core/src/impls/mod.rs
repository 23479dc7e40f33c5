//! Implementations of the ports (開発・テスト用).
//!
//! - [`InMemoryStore`]: tokio mutex ベースの Store 実装。
//!   永続エンジンは同じ trait の後ろに差し込む。

mod memory;

pub use memory::InMemoryStore;
