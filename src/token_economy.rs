//! Stateless cross-worker token routing policy (component C7, `spec.md` §4.7).
//!
//! Every function here is a pure allocation calculator: given the amount a
//! worker just received and the set of other active workers it could share
//! with, it returns the transfers to make. The caller is responsible for
//! actually executing each transfer via [`crate::tx_builder::transfer_instruction`]
//! and the `RpcGateway` — this module never touches the network.

use solana_program::pubkey::Pubkey;

use crate::types::{TokenSide, Worker, WorkerKind, WorkerStatus};

/// One on-chain token transfer to execute as part of routing a worker's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransfer {
    pub to_worker_id: String,
    pub to_wallet: Pubkey,
    pub amount: u64,
}

/// Result of routing one worker's received amount: the transfers to make plus
/// whatever is retained rather than shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPlan {
    pub transfers: Vec<PlannedTransfer>,
    pub retained: u64,
}

fn is_active(worker: &Worker) -> bool {
    matches!(worker.status, WorkerStatus::Running)
}

/// Deposit worker received `lp_received` LP tokens. If `share_tokens` is set,
/// splits `floor(lp_received / k)` evenly across every other active Withdraw
/// worker on `(pool_id, token_side)`; the remainder is retained.
pub fn route_deposit_output(
    pool_id: Pubkey,
    token_side: TokenSide,
    lp_received: u64,
    share_tokens: bool,
    other_workers: &[&Worker],
) -> RoutingPlan {
    if !share_tokens {
        return RoutingPlan {
            transfers: Vec::new(),
            retained: lp_received,
        };
    }
    route_evenly(
        pool_id,
        token_side,
        WorkerKind::Withdraw,
        lp_received,
        other_workers,
    )
}

/// Withdraw worker received `underlying_received` underlying tokens. Always
/// redistributes `floor(underlying_received / k)` to every other active
/// Deposit worker on `(pool_id, token_side)`, regardless of `shareTokens`.
pub fn route_withdraw_output(
    pool_id: Pubkey,
    token_side: TokenSide,
    underlying_received: u64,
    other_workers: &[&Worker],
) -> RoutingPlan {
    route_evenly(
        pool_id,
        token_side,
        WorkerKind::Deposit,
        underlying_received,
        other_workers,
    )
}

/// Swap worker received `output_received` output tokens. The entire amount goes
/// to the single opposite-direction swap worker for `pool_id`, if one is active;
/// otherwise it is retained.
pub fn route_swap_output(
    pool_id: Pubkey,
    own_kind: WorkerKind,
    output_received: u64,
    other_workers: &[&Worker],
) -> RoutingPlan {
    let opposite_kind = match own_kind {
        WorkerKind::SwapAB => WorkerKind::SwapBA,
        WorkerKind::SwapBA => WorkerKind::SwapAB,
        _ => return RoutingPlan {
            transfers: Vec::new(),
            retained: output_received,
        },
    };

    let opposite = other_workers
        .iter()
        .find(|w| w.pool_id == pool_id && w.kind == opposite_kind && is_active(w));

    match opposite {
        Some(worker) => RoutingPlan {
            transfers: vec![PlannedTransfer {
                to_worker_id: worker.worker_id.clone(),
                to_wallet: worker.wallet.pubkey(),
                amount: output_received,
            }],
            retained: 0,
        },
        None => RoutingPlan {
            transfers: Vec::new(),
            retained: output_received,
        },
    }
}

fn route_evenly(
    pool_id: Pubkey,
    token_side: TokenSide,
    target_kind: WorkerKind,
    amount: u64,
    other_workers: &[&Worker],
) -> RoutingPlan {
    let targets: Vec<&&Worker> = other_workers
        .iter()
        .filter(|w| w.pool_id == pool_id && w.kind == target_kind && w.token_side == Some(token_side) && is_active(w))
        .collect();

    if targets.is_empty() {
        return RoutingPlan {
            transfers: Vec::new(),
            retained: amount,
        };
    }

    let share = amount / targets.len() as u64;
    let remainder = amount - share * targets.len() as u64;

    if share == 0 {
        return RoutingPlan {
            transfers: Vec::new(),
            retained: amount,
        };
    }

    let transfers = targets
        .iter()
        .map(|w| PlannedTransfer {
            to_worker_id: w.worker_id.clone(),
            to_wallet: w.wallet.pubkey(),
            amount: share,
        })
        .collect();

    RoutingPlan {
        transfers,
        retained: remainder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkerWallet;

    fn sample_worker(id: &str, kind: WorkerKind, pool_id: Pubkey, token_side: Option<TokenSide>, status: WorkerStatus) -> Worker {
        Worker {
            worker_id: id.to_string(),
            kind,
            pool_id,
            token_side,
            initial_amount: 1_000,
            auto_refill: false,
            share_tokens: true,
            wallet: WorkerWallet::generate(),
            status,
            created_at: chrono::Utc::now(),
            last_operation_at: None,
        }
    }

    #[test]
    fn deposit_does_not_share_when_share_tokens_is_false() {
        let pool_id = Pubkey::new_unique();
        let other = sample_worker("wd-1", WorkerKind::Withdraw, pool_id, Some(TokenSide::A), WorkerStatus::Running);
        let plan = route_deposit_output(pool_id, TokenSide::A, 900, false, &[&other]);
        assert!(plan.transfers.is_empty());
        assert_eq!(plan.retained, 900);
    }

    #[test]
    fn deposit_shares_evenly_across_active_withdraw_workers() {
        let pool_id = Pubkey::new_unique();
        let w1 = sample_worker("wd-1", WorkerKind::Withdraw, pool_id, Some(TokenSide::A), WorkerStatus::Running);
        let w2 = sample_worker("wd-2", WorkerKind::Withdraw, pool_id, Some(TokenSide::A), WorkerStatus::Running);
        let paused = sample_worker("wd-3", WorkerKind::Withdraw, pool_id, Some(TokenSide::A), WorkerStatus::Paused);
        let plan = route_deposit_output(pool_id, TokenSide::A, 100, true, &[&w1, &w2, &paused]);
        assert_eq!(plan.transfers.len(), 2);
        assert_eq!(plan.transfers[0].amount, 50);
        assert_eq!(plan.retained, 0);
    }

    #[test]
    fn withdraw_always_redistributes_regardless_of_share_flag() {
        let pool_id = Pubkey::new_unique();
        let mut dep = sample_worker("dep-1", WorkerKind::Deposit, pool_id, Some(TokenSide::B), WorkerStatus::Running);
        dep.share_tokens = false;
        let plan = route_withdraw_output(pool_id, TokenSide::B, 101, &[&dep]);
        assert_eq!(plan.transfers.len(), 1);
        assert_eq!(plan.transfers[0].amount, 101);
        assert_eq!(plan.retained, 0);
    }

    #[test]
    fn withdraw_keeps_remainder_when_split_is_uneven() {
        let pool_id = Pubkey::new_unique();
        let d1 = sample_worker("dep-1", WorkerKind::Deposit, pool_id, Some(TokenSide::A), WorkerStatus::Running);
        let d2 = sample_worker("dep-2", WorkerKind::Deposit, pool_id, Some(TokenSide::A), WorkerStatus::Running);
        let plan = route_withdraw_output(pool_id, TokenSide::A, 101, &[&d1, &d2]);
        assert_eq!(plan.transfers[0].amount, 50);
        assert_eq!(plan.transfers[1].amount, 50);
        assert_eq!(plan.retained, 1);
    }

    #[test]
    fn swap_sends_entire_output_to_opposite_direction_worker() {
        let pool_id = Pubkey::new_unique();
        let opposite = sample_worker("swba-1", WorkerKind::SwapBA, pool_id, None, WorkerStatus::Running);
        let plan = route_swap_output(pool_id, WorkerKind::SwapAB, 500, &[&opposite]);
        assert_eq!(plan.transfers.len(), 1);
        assert_eq!(plan.transfers[0].amount, 500);
        assert_eq!(plan.retained, 0);
    }

    #[test]
    fn swap_retains_output_when_no_opposite_worker_exists() {
        let pool_id = Pubkey::new_unique();
        let plan = route_swap_output(pool_id, WorkerKind::SwapAB, 500, &[]);
        assert!(plan.transfers.is_empty());
        assert_eq!(plan.retained, 500);
    }
}
