//! Shared constants: PDA seed prefixes, fee schedule, and tunable defaults.

/// Seed prefix for the pool-state PDA: `("pool_state", token_a, token_b, ratio_a_le, ratio_b_le)`.
pub const POOL_STATE_SEED_PREFIX: &[u8] = b"pool_state";

/// Seed prefix for the system-state PDA: `("system_state")`.
pub const SYSTEM_STATE_SEED_PREFIX: &[u8] = b"system_state";

/// Seed prefix for the main-treasury PDA: `("main_treasury")`.
pub const MAIN_TREASURY_SEED_PREFIX: &[u8] = b"main_treasury";

/// Seed prefixes for a pool's token vault PDAs: `(<side>_vault, pool_state)`.
pub const TOKEN_A_VAULT_SEED_PREFIX: &[u8] = b"token_a_vault";
pub const TOKEN_B_VAULT_SEED_PREFIX: &[u8] = b"token_b_vault";

/// Seed prefixes for a pool's LP mint PDAs: `(lp_<side>_mint, pool_state)`.
pub const LP_TOKEN_A_MINT_SEED_PREFIX: &[u8] = b"lp_token_a_mint";
pub const LP_TOKEN_B_MINT_SEED_PREFIX: &[u8] = b"lp_token_b_mint";

/// Seed prefix for the per-pool treasury PDA that swap/deposit/withdraw fees accrue into
/// before a consolidation sweep moves them into the main treasury.
pub const POOL_TREASURY_SEED_PREFIX: &[u8] = b"pool_treasury";

/// Registration fee for pool creation, in lamports.
pub const REGISTRATION_FEE: u64 = 1_150_000_000; // 1.15 SOL

/// Fee charged for deposit and withdrawal operations, in lamports.
pub const DEPOSIT_WITHDRAWAL_FEE: u64 = 1_300_000; // 0.0013 SOL

/// Fee charged for swap operations, in lamports.
pub const SWAP_FEE: u64 = 12_500; // 0.0000125 SOL

/// Bounded error history retained per worker (`spec.md` §4.1).
pub const MAX_WORKER_ERRORS: usize = 10;

/// Default worker-cycle inter-operation delay bounds, in milliseconds.
pub const DEFAULT_MIN_DELAY_MS: u64 = 750;
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;

/// Swap amounts are capped at this fraction of the input-side balance; deposit/withdraw
/// amounts use the larger fraction below. Canonical values per `spec.md` §9 Open Questions.
pub const MAX_SWAP_PERCENT: f64 = 0.02;
pub const MAX_DEPOSIT_WITHDRAW_PERCENT: f64 = 0.05;

/// Fraction of `initialAmount` below which an auto-refill deposit worker tops back up to
/// the full `initialAmount` (not just the deficit).
pub const AUTO_REFILL_THRESHOLD_PERCENT: f64 = 0.05;

/// SOL balance floor that triggers a top-up airdrop, and the top-up target, in lamports.
pub const DEFAULT_MIN_SOL_BALANCE_LAMPORTS: u64 = 100_000_000; // 0.1 SOL
pub const DEFAULT_SOL_TOPUP_LAMPORTS: u64 = 1_500_000_000; // 1.5 SOL

/// Localnet airdrop staircase amounts, tried in order, each for a few attempts.
pub const AIRDROP_STAIRCASE_LAMPORTS: &[u64] = &[10_000_000_000, 1_000_000_000];
pub const AIRDROP_STAIRCASE_ATTEMPTS_PER_STEP: u32 = 3;

/// Default recoverable-error retry/backoff tuning.
pub const DEFAULT_TRANSPORT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_START_MS: u64 = 800;
pub const PAUSE_POLL_INTERVAL_SECS: u64 = 30;

/// Hard bound on how long `StopWorker` waits for a worker task to quiesce.
pub const WORKER_STOP_TIMEOUT_SECS: u64 = 30;

/// Contract error code for a swap whose realized output does not match the client-supplied
/// expected output (`spec.md` §4.4).
pub const AMOUNT_MISMATCH_ERROR_CODE: u32 = 0x417;

/// Engine-level error codes surfaced to API callers (`spec.md` §6).
pub const ENGINE_ERROR_DUPLICATE_SWAP_DIRECTION: i32 = -1001;
pub const ENGINE_ERROR_POOL_NOT_FOUND: i32 = -1002;
pub const ENGINE_ERROR_INVALID_WORKER_STATE: i32 = -1003;
