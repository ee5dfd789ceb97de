//! Classifies transport and contract errors into a recovery action a worker
//! should take (component C6, `spec.md` §4.6, §7).

use std::time::Duration;

use crate::constants::{DEFAULT_BACKOFF_START_MS, DEFAULT_TRANSPORT_RETRY_ATTEMPTS, PAUSE_POLL_INTERVAL_SECS};
use crate::error::{ContractError, ContractErrorKind};

/// What a worker should do next after hitting a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// What a worker should do next after hitting a contract error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Airdrop SOL to the worker wallet, then retry the operation.
    AirdropAndRetry,
    /// Mint/refund tokens back to `initialAmount`, then retry (requires `autoRefill`).
    RefillAndRetry,
    /// Poll pause status every [`PAUSE_POLL_INTERVAL_SECS`] until cleared, then retry.
    WaitForUnpause,
    /// Not an error: log and move on to the next cycle.
    SkipCycle,
    /// Recompute the expected output and retry exactly once more.
    RecomputeAndRetryOnce,
    /// Recomputing already failed once; give up on this cycle without erroring the worker.
    SkipAfterSlippageRetry,
    /// Transition the worker to `Error` and stop its task.
    StopWorker,
}

/// Stateless classifier; every call is a pure function of its inputs so it can be
/// unit-tested without a live RPC connection or worker state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandler;

impl ErrorHandler {
    pub fn new() -> Self {
        Self
    }

    /// Exponential backoff decision for a transport error. `attempt` is 1-based.
    pub fn classify_transport(&self, attempt: u32) -> TransportDecision {
        if attempt > DEFAULT_TRANSPORT_RETRY_ATTEMPTS {
            return TransportDecision::GiveUp;
        }
        let backoff_ms = DEFAULT_BACKOFF_START_MS.saturating_mul(1u64 << (attempt - 1).min(10));
        TransportDecision::RetryAfter(Duration::from_millis(backoff_ms))
    }

    /// Decides the recovery action for a contract error, given whether the worker
    /// is eligible for auto-refill and whether a slippage retry has already happened
    /// once this cycle.
    pub fn classify_contract(
        &self,
        error: &ContractError,
        auto_refill: bool,
        slippage_already_retried: bool,
    ) -> RecoveryAction {
        match error {
            ContractError::InsufficientFunds { .. } => {
                if auto_refill {
                    RecoveryAction::RefillAndRetry
                } else {
                    RecoveryAction::AirdropAndRetry
                }
            }
            ContractError::PoolPaused | ContractError::SystemPaused => RecoveryAction::WaitForUnpause,
            ContractError::InsufficientLiquidity => RecoveryAction::SkipCycle,
            ContractError::InvalidTokenAccount => RecoveryAction::SkipCycle,
            ContractError::SlippageExceeded => {
                if slippage_already_retried {
                    RecoveryAction::SkipAfterSlippageRetry
                } else {
                    RecoveryAction::RecomputeAndRetryOnce
                }
            }
            ContractError::InvalidRatio
            | ContractError::Unauthorized
            | ContractError::ArithmeticOverflow
            | ContractError::InvalidTokenPair { .. }
            | ContractError::Unrecognized(_) => {
                debug_assert_eq!(error.kind(), ContractErrorKind::Fatal);
                RecoveryAction::StopWorker
            }
        }
    }

    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_secs(PAUSE_POLL_INTERVAL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_backoff_grows_exponentially_then_gives_up() {
        let handler = ErrorHandler::new();
        let first = handler.classify_transport(1);
        let second = handler.classify_transport(2);
        match (first, second) {
            (TransportDecision::RetryAfter(a), TransportDecision::RetryAfter(b)) => assert!(b > a),
            _ => panic!("expected retries within the attempt budget"),
        }
        assert_eq!(
            handler.classify_transport(DEFAULT_TRANSPORT_RETRY_ATTEMPTS + 1),
            TransportDecision::GiveUp
        );
    }

    #[test]
    fn insufficient_funds_prefers_refill_when_auto_refill_is_set() {
        let handler = ErrorHandler::new();
        let err = ContractError::InsufficientFunds {
            required: 100,
            available: 10,
        };
        assert_eq!(handler.classify_contract(&err, true, false), RecoveryAction::RefillAndRetry);
        assert_eq!(handler.classify_contract(&err, false, false), RecoveryAction::AirdropAndRetry);
    }

    #[test]
    fn slippage_retries_exactly_once() {
        let handler = ErrorHandler::new();
        let err = ContractError::SlippageExceeded;
        assert_eq!(
            handler.classify_contract(&err, false, false),
            RecoveryAction::RecomputeAndRetryOnce
        );
        assert_eq!(
            handler.classify_contract(&err, false, true),
            RecoveryAction::SkipAfterSlippageRetry
        );
    }

    #[test]
    fn fatal_errors_stop_the_worker() {
        let handler = ErrorHandler::new();
        for err in [
            ContractError::InvalidRatio,
            ContractError::Unauthorized,
            ContractError::ArithmeticOverflow,
            ContractError::Unrecognized(4242),
        ] {
            assert_eq!(handler.classify_contract(&err, false, false), RecoveryAction::StopWorker);
        }
    }

    #[test]
    fn paused_errors_wait_for_unpause() {
        let handler = ErrorHandler::new();
        assert_eq!(
            handler.classify_contract(&ContractError::PoolPaused, false, false),
            RecoveryAction::WaitForUnpause
        );
        assert_eq!(
            handler.classify_contract(&ContractError::SystemPaused, false, false),
            RecoveryAction::WaitForUnpause
        );
    }
}
