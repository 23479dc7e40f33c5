//! Domain model (IDs, records, statuses, errors).
//!
//! ここにある型はアーキテクチャ非依存です: キューや永続化の都合を仮定せず、
//! ストアが所有する「記録の形」だけを定義します。

pub mod errors;
pub mod ids;
pub mod submission;
pub mod task;
pub mod worker;

pub use errors::{ErrorKind, ForemanError};
pub use ids::{SubmissionId, TaskId};
pub use submission::SubmissionRecord;
pub use task::{TaskRecord, TaskStatus};
pub use worker::{ScoreRecord, WorkerId, WorkerRecord, WorkerStatus};
