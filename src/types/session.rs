use serde::{Deserialize, Serialize};

use super::stats::Statistics;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    UserRequested,
    EngineStop,
    WorkerError,
    Deleted,
}

/// Append-only record of one `Start`→`Stop` interval for a worker
/// (`spec.md` §3). Retained indefinitely once written; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub worker_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub stopped_at: chrono::DateTime<chrono::Utc>,
    pub stop_reason: StopReason,
    /// Snapshot of the worker's `Statistics` at the moment the session closed.
    pub final_stats: Statistics,
}
