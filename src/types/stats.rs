use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::worker::WorkerKind;
use crate::constants::MAX_WORKER_ERRORS;

/// One recorded failure, kept in a bounded FIFO per worker (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedError {
    pub at: chrono::DateTime<chrono::Utc>,
    pub message: String,
    pub contract_error_code: Option<u32>,
}

/// Per-kind success/failure counters, reset to zero at each `Start` (the prior
/// value rolls into a [`super::Session`] record).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpCounters {
    pub succeeded: u64,
    pub failed: u64,
}

/// Live statistics for one worker (`spec.md` §3). Reset at `Start`; persisted
/// periodically by the worker's own task through [`crate::store::Store`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub deposit: OpCounters,
    pub withdraw: OpCounters,
    pub swap_ab: OpCounters,
    pub swap_ba: OpCounters,
    pub volume_processed: u128,
    pub pool_fees_paid: u64,
    pub network_fees_paid: u64,
    pub amount_shared_to_others: u128,
    pub amount_received_from_others: u128,
    pub empties_performed: u64,
    /// Outcome of the pool op attempted as step 3 of the most recent `Empty`
    /// (`None` until the first `Empty` with a non-zero balance to act on).
    pub last_empty_operation_successful: Option<bool>,
    pub last_errors: VecDeque<RecordedError>,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            deposit: OpCounters::default(),
            withdraw: OpCounters::default(),
            swap_ab: OpCounters::default(),
            swap_ba: OpCounters::default(),
            volume_processed: 0,
            pool_fees_paid: 0,
            network_fees_paid: 0,
            amount_shared_to_others: 0,
            amount_received_from_others: 0,
            empties_performed: 0,
            last_empty_operation_successful: None,
            last_errors: VecDeque::with_capacity(MAX_WORKER_ERRORS),
        }
    }
}

impl Statistics {
    pub fn counters_for_mut(&mut self, kind: WorkerKind) -> &mut OpCounters {
        match kind {
            WorkerKind::Deposit => &mut self.deposit,
            WorkerKind::Withdraw => &mut self.withdraw,
            WorkerKind::SwapAB => &mut self.swap_ab,
            WorkerKind::SwapBA => &mut self.swap_ba,
        }
    }

    /// Appends an error, evicting the oldest once the FIFO exceeds
    /// [`MAX_WORKER_ERRORS`] entries.
    pub fn push_error(&mut self, message: impl Into<String>, contract_error_code: Option<u32>) {
        if self.last_errors.len() >= MAX_WORKER_ERRORS {
            self.last_errors.pop_front();
        }
        self.last_errors.push_back(RecordedError {
            at: chrono::Utc::now(),
            message: message.into(),
            contract_error_code,
        });
    }
}
