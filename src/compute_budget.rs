//! Per-instruction compute-unit budgeting (component C3, `spec.md` §4.3).
//!
//! Every transaction this orchestrator sends is prefixed with an explicit
//! `ComputeBudgetInstruction::set_compute_unit_limit`, the same pattern the
//! teacher's own CU-measurement test harness uses to pin a transaction to a
//! known limit rather than trusting the cluster default.

use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;

/// The contract operation a transaction is being budgeted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    PoolCreate,
    Deposit,
    Withdraw,
    Swap,
    TreasuryInit,
    Pause,
    Unpause,
    /// `sol_lamports` distinguishes the cheap donate path from the compute-heavier one.
    Donate { sol_lamports: u64 },
    Consolidate { pool_count: u32 },
}

/// Production-tested upper bounds for each operation, in compute units.
pub fn compute_unit_limit(op: OperationKind) -> u32 {
    const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

    match op {
        OperationKind::PoolCreate => 150_000,
        OperationKind::Deposit => 310_000,
        OperationKind::Withdraw => 290_000,
        OperationKind::Swap => 250_000,
        OperationKind::TreasuryInit => 200_000,
        OperationKind::Pause | OperationKind::Unpause => 150_000,
        OperationKind::Donate { sol_lamports } => {
            if sol_lamports <= 1000 * LAMPORTS_PER_SOL {
                25_000
            } else {
                120_000
            }
        }
        OperationKind::Consolidate { pool_count } => {
            let scaled = 4_000u32.saturating_add(5_000u32.saturating_mul(pool_count));
            scaled.min(150_000)
        }
    }
}

/// Builds the `set_compute_unit_limit` instruction to prepend to a transaction.
/// The orchestrator never retries on out-of-compute; a transaction that exhausts
/// this limit fails as a plain operation failure, not a recoverable error.
pub fn compute_budget_instruction(op: OperationKind) -> Instruction {
    ComputeBudgetInstruction::set_compute_unit_limit(compute_unit_limit(op))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_documented_upper_bounds() {
        assert_eq!(compute_unit_limit(OperationKind::PoolCreate), 150_000);
        assert_eq!(compute_unit_limit(OperationKind::Deposit), 310_000);
        assert_eq!(compute_unit_limit(OperationKind::Withdraw), 290_000);
        assert_eq!(compute_unit_limit(OperationKind::Swap), 250_000);
        assert_eq!(compute_unit_limit(OperationKind::TreasuryInit), 200_000);
    }

    #[test]
    fn donate_scales_with_amount() {
        assert_eq!(compute_unit_limit(OperationKind::Donate { sol_lamports: 1_000_000_000 }), 25_000);
        assert_eq!(
            compute_unit_limit(OperationKind::Donate {
                sol_lamports: 2000 * 1_000_000_000
            }),
            120_000
        );
    }

    #[test]
    fn consolidate_scales_with_pool_count_and_caps() {
        assert_eq!(compute_unit_limit(OperationKind::Consolidate { pool_count: 0 }), 4_000);
        assert_eq!(compute_unit_limit(OperationKind::Consolidate { pool_count: 10 }), 54_000);
        assert_eq!(compute_unit_limit(OperationKind::Consolidate { pool_count: 1000 }), 150_000);
    }
}
