//! Error taxonomy for the stress-test orchestrator.
//!
//! Mirrors the contract's own `PoolError` (`error.rs` in the on-chain
//! program): a flat `thiserror` enum plus a stable `error_code()` mapping,
//! so codes surfaced by this client line up with the codes the contract
//! itself returns via `ProgramError::Custom`.

use solana_program::pubkey::Pubkey;
use thiserror::Error;

use crate::constants::AMOUNT_MISMATCH_ERROR_CODE;

/// One contract-side error as decoded from a transaction's logs or a
/// simulation's `ProgramError::Custom(code)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("invalid token pair: {token_a} / {token_b}")]
    InvalidTokenPair { token_a: Pubkey, token_b: Pubkey },

    #[error("invalid ratio")]
    InvalidRatio,

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("invalid token account")]
    InvalidTokenAccount,

    #[error("pool is paused")]
    PoolPaused,

    #[error("system is paused")]
    SystemPaused,

    #[error("insufficient liquidity for this operation")]
    InsufficientLiquidity,

    #[error("realized output did not match expected output (slippage)")]
    SlippageExceeded,

    #[error("unauthorized")]
    Unauthorized,

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("contract returned an unrecognized custom error code {0}")]
    Unrecognized(u32),
}

impl ContractError {
    /// Decodes a `ProgramError::Custom` code into a typed error. Codes follow the
    /// 1001..1030 range the contract assigns, plus the out-of-band amount-mismatch
    /// code the swap instruction raises on slippage.
    pub fn from_code(code: u32, token_a: Option<Pubkey>, token_b: Option<Pubkey>) -> Self {
        match code {
            1001 => ContractError::InvalidTokenPair {
                token_a: token_a.unwrap_or_default(),
                token_b: token_b.unwrap_or_default(),
            },
            1002 => ContractError::InvalidRatio,
            1003 => ContractError::InsufficientFunds {
                required: 0,
                available: 0,
            },
            1004 => ContractError::InvalidTokenAccount,
            1007 => ContractError::PoolPaused,
            1012 | 1013 | 1026 => ContractError::Unauthorized,
            1019 => ContractError::ArithmeticOverflow,
            1023 => ContractError::SystemPaused,
            1027 => ContractError::PoolPaused,
            code if code == AMOUNT_MISMATCH_ERROR_CODE => ContractError::SlippageExceeded,
            other => ContractError::Unrecognized(other),
        }
    }

    pub fn error_code(&self) -> u32 {
        match self {
            ContractError::InvalidTokenPair { .. } => 1001,
            ContractError::InvalidRatio => 1002,
            ContractError::InsufficientFunds { .. } => 1003,
            ContractError::InvalidTokenAccount => 1004,
            ContractError::PoolPaused => 1007,
            ContractError::Unauthorized => 1012,
            ContractError::ArithmeticOverflow => 1019,
            ContractError::SystemPaused => 1023,
            ContractError::SlippageExceeded => AMOUNT_MISMATCH_ERROR_CODE,
            ContractError::InsufficientLiquidity => 1031,
            ContractError::Unrecognized(code) => *code,
        }
    }

    /// How the orchestrator classifies this error for retry/skip/stop purposes
    /// (`spec.md` §4.6).
    pub fn kind(&self) -> ContractErrorKind {
        match self {
            ContractError::InsufficientFunds { .. }
            | ContractError::PoolPaused
            | ContractError::SystemPaused
            | ContractError::InsufficientLiquidity
            | ContractError::SlippageExceeded
            | ContractError::InvalidTokenAccount => ContractErrorKind::Recoverable,
            ContractError::InvalidRatio
            | ContractError::Unauthorized
            | ContractError::ArithmeticOverflow
            | ContractError::InvalidTokenPair { .. }
            | ContractError::Unrecognized(_) => ContractErrorKind::Fatal,
        }
    }
}

/// The two buckets `ContractError` variants fall into for orchestration purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    Recoverable,
    Fatal,
}

/// Top-level error type threaded through the orchestrator's own operations —
/// distinct from [`ContractError`], which models what the on-chain program reports.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("engine error {code}: {message}")]
    Engine { code: i32, message: String },
}

/// Errors from the RPC transport layer, independent of what the contract itself says.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("RPC request timed out")]
    Timeout,

    #[error("no route to RPC endpoint: {0}")]
    NoRoute(String),

    #[error("failed to serialize or deserialize a transaction: {0}")]
    Serialization(String),

    #[error("RPC client error: {0}")]
    Client(#[from] solana_client::client_error::ClientError),
}

/// Errors from [`crate::store::Store`]'s durable persistence layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error persisting {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what} as JSON: {source}")]
    Serde {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_codes_round_trip() {
        for code in [1001u32, 1002, 1003, 1004, 1007, 1012, 1019, 1023] {
            let err = ContractError::from_code(code, None, None);
            assert_eq!(err.error_code(), code);
        }
    }

    #[test]
    fn amount_mismatch_maps_to_slippage() {
        let err = ContractError::from_code(AMOUNT_MISMATCH_ERROR_CODE, None, None);
        assert_eq!(err, ContractError::SlippageExceeded);
        assert_eq!(err.kind(), ContractErrorKind::Recoverable);
    }

    #[test]
    fn unrecognized_code_is_fatal() {
        let err = ContractError::from_code(9999, None, None);
        assert_eq!(err.kind(), ContractErrorKind::Fatal);
    }

    #[test]
    fn fatal_set_matches_spec() {
        assert_eq!(ContractError::InvalidRatio.kind(), ContractErrorKind::Fatal);
        assert_eq!(ContractError::Unauthorized.kind(), ContractErrorKind::Fatal);
        assert_eq!(ContractError::ArithmeticOverflow.kind(), ContractErrorKind::Fatal);
    }
}
