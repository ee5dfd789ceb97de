//! Concurrent stress-test orchestrator for the Fixed Ratio Trading program.
//!
//! Drives the on-chain contract with adversarial mixes of deposits,
//! withdrawals and swaps across many pools, using independently funded
//! worker tasks that exchange tokens with each other to keep activity
//! alive indefinitely. See `SPEC_FULL.md` for the full component design.

pub mod config;
pub mod constants;
pub mod error;
pub mod error_handler;
pub mod ratio;
pub mod compute_budget;
pub mod tx_builder;
pub mod rpc_gateway;
pub mod store;
pub mod token_economy;
pub mod types;
pub mod version;
pub mod worker;
pub mod engine;

pub use config::Config;
pub use engine::Engine;
pub use error::{ContractError, ContractErrorKind};
pub use store::Store;
