//! Off-chain data model: the records the orchestrator persists about the
//! pools it manages and the workers driving them. See `spec.md` §3.
//!
//! These are distinct from the on-chain account layouts the contract itself
//! defines — the orchestrator only ever needs the fields it derived or
//! observed at creation time, recorded here as plain `serde` types.

mod pool;
mod session;
mod stats;
mod wallet;
mod worker;

pub use pool::Pool;
pub use session::{Session, StopReason};
pub use stats::Statistics;
pub use wallet::CoreWallet;
pub use worker::{TokenSide, Worker, WorkerKind, WorkerStatus, WorkerWallet};
