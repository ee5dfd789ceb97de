//! Process configuration: command-line flags with environment-variable
//! fallback, in the style of the pack's other services
//! (`crates/alerter/src/lib.rs`'s `Arguments`).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use solana_sdk::commitment_config::CommitmentLevel;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Clone, Parser)]
#[command(name = "frt-stress-test", about = "Concurrent stress-test orchestrator for the Fixed Ratio Trading program")]
pub struct Config {
    /// Solana RPC endpoint to drive every operation against.
    #[arg(long, env, default_value = "http://127.0.0.1:8899")]
    pub rpc_url: String,

    /// Program id of the deployed Fixed Ratio Trading contract.
    #[arg(long, env)]
    pub program_id: Pubkey,

    /// Commitment level used for reads and send-confirmation polling.
    #[arg(long, env, default_value = "processed", value_parser = parse_commitment)]
    pub commitment: CommitmentLevel,

    /// Allow falling back to `skipPreflight=true` sends after a preflight failure.
    #[arg(long, env, default_value_t = false)]
    pub skip_preflight: bool,

    /// Directory under which `workers.json`, `statistics.json`, etc. are persisted.
    #[arg(long, env, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Number of pools the engine keeps active at all times, creating new ones on `Start`
    /// if the saved count falls short.
    #[arg(long, env, default_value_t = 1)]
    pub target_active_pools: usize,

    /// SOL balance floor (in lamports) below which a worker requests an airdrop top-up.
    #[arg(long, env, default_value_t = crate::constants::DEFAULT_MIN_SOL_BALANCE_LAMPORTS)]
    pub min_sol_balance_lamports: u64,

    /// Target balance (in lamports) an airdrop top-up brings a worker wallet to.
    #[arg(long, env, default_value_t = crate::constants::DEFAULT_SOL_TOPUP_LAMPORTS)]
    pub sol_topup_lamports: u64,

    /// Lower bound of a worker's uniform random inter-operation delay, in milliseconds.
    #[arg(long, env, default_value_t = crate::constants::DEFAULT_MIN_DELAY_MS)]
    pub min_delay_ms: u64,

    /// Upper bound of a worker's uniform random inter-operation delay, in milliseconds.
    #[arg(long, env, default_value_t = crate::constants::DEFAULT_MAX_DELAY_MS)]
    pub max_delay_ms: u64,

    /// How many times a transport error is retried (with exponential backoff) before
    /// the worker gives up on the current cycle.
    #[arg(long, env, default_value_t = crate::constants::DEFAULT_TRANSPORT_RETRY_ATTEMPTS)]
    pub transport_retry_attempts: u32,

    /// Fraction of `initialAmount` below which an auto-refill deposit worker tops
    /// back up to the full `initialAmount`.
    #[arg(long, env, default_value_t = crate::constants::AUTO_REFILL_THRESHOLD_PERCENT)]
    pub auto_refill_threshold: f64,

    /// Swap amounts are capped at this fraction of the input-side balance.
    #[arg(long, env, default_value_t = crate::constants::MAX_SWAP_PERCENT)]
    pub max_swap_percent: f64,

    /// Deposit and withdraw amounts are capped at this fraction of the relevant balance.
    #[arg(long, env, default_value_t = crate::constants::MAX_DEPOSIT_WITHDRAW_PERCENT)]
    pub max_deposit_percent: f64,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    pub fn inter_operation_delay_bounds(&self) -> (Duration, Duration) {
        (Duration::from_millis(self.min_delay_ms), Duration::from_millis(self.max_delay_ms))
    }
}

fn parse_commitment(s: &str) -> Result<CommitmentLevel, String> {
    match s {
        "processed" => Ok(CommitmentLevel::Processed),
        "confirmed" => Ok(CommitmentLevel::Confirmed),
        "finalized" => Ok(CommitmentLevel::Finalized),
        other => Err(format!("unknown commitment level: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_required_args() {
        let program_id = Pubkey::new_unique().to_string();
        let config = Config::parse_from(["frt-stress-test", "--program-id", &program_id]);
        assert_eq!(config.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.target_active_pools, 1);
        assert!(!config.skip_preflight);
    }

    #[test]
    fn commitment_level_is_parsed_from_flag() {
        let program_id = Pubkey::new_unique().to_string();
        let config = Config::parse_from([
            "frt-stress-test",
            "--program-id",
            &program_id,
            "--commitment",
            "finalized",
        ]);
        assert_eq!(config.commitment, CommitmentLevel::Finalized);
    }
}
