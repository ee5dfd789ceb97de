//! Owns the worker registry and the top-level lifecycle state machine
//! (component C9, `spec.md` §4.9). Also owns the background pool-management
//! task that keeps the active pool set at `target_active_pools` for the
//! lifetime of a `Started` engine, not just at `Start` itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tokio::sync::{watch, Mutex};

use crate::compute_budget::OperationKind;
use crate::config::Config;
use crate::constants::{
    ENGINE_ERROR_DUPLICATE_SWAP_DIRECTION, ENGINE_ERROR_INVALID_WORKER_STATE, ENGINE_ERROR_POOL_NOT_FOUND,
    WORKER_STOP_TIMEOUT_SECS,
};
use crate::ratio::{self, NormalizedRatio, RatioDirection, RatioRequest};
use crate::rpc_gateway::{GatewayError, RpcGateway};
use crate::store::Store;
use crate::tx_builder;
use crate::types::{CoreWallet, Pool, Session, StopReason, TokenSide, Worker, WorkerKind, WorkerStatus};
use crate::version;
use crate::worker::{self, PeerLookup, WorkerContext, WorkerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Started,
    Pausing,
    Paused,
    Resuming,
    Stopping,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine error {code}: {message}")]
    Structured { code: i32, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] crate::error::StorageError),
}

impl EngineError {
    fn duplicate_swap_direction(pool_id: Pubkey, kind: WorkerKind) -> Self {
        EngineError::Structured {
            code: ENGINE_ERROR_DUPLICATE_SWAP_DIRECTION,
            message: format!("a {kind:?} worker already exists for pool {pool_id}"),
        }
    }

    fn pool_not_found(pool_id: Pubkey) -> Self {
        EngineError::Structured {
            code: ENGINE_ERROR_POOL_NOT_FOUND,
            message: format!("no pool registered with id {pool_id}"),
        }
    }

    fn invalid_worker_state(worker_id: &str, reason: &str) -> Self {
        EngineError::Structured {
            code: ENGINE_ERROR_INVALID_WORKER_STATE,
            message: format!("worker {worker_id} is in an invalid state: {reason}"),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Health {
    pub state: String,
    pub total_workers: usize,
    pub running: usize,
    pub failed: usize,
    pub process_id: u32,
    pub mem_mb: u64,
}

impl Health {
    pub fn is_healthy(&self) -> bool {
        self.state == "Started" && self.failed == 0
    }
}

/// Reads the running worker registry through the Store rather than through
/// live shared state: Store is the single source of truth, and every worker
/// persists at least every five operations, which is fresh enough for
/// `TokenEconomy` routing decisions.
struct StorePeerLookup {
    store: Arc<Store>,
}

impl PeerLookup for StorePeerLookup {
    fn peers(&self, pool_id: Pubkey, exclude_worker_id: &str) -> Vec<Worker> {
        match self.store.load_workers() {
            Ok(workers) => workers
                .into_values()
                .filter(|w| w.pool_id == pool_id && w.worker_id != exclude_worker_id)
                .collect(),
            Err(e) => {
                warn!("peer lookup could not read workers.json: {e}");
                Vec::new()
            }
        }
    }
}

/// Interval between background re-validations of the active pool set while `Started`.
const POOL_MANAGEMENT_INTERVAL_SECS: u64 = 60;

pub struct Engine {
    state: Mutex<EngineState>,
    registry: Mutex<HashMap<String, WorkerHandle>>,
    store: Arc<Store>,
    gateway: Arc<RpcGateway>,
    config: Arc<Config>,
    program_id: Pubkey,
    core_wallet_keypair: Arc<Keypair>,
    paused_tx: watch::Sender<bool>,
    paused_rx: watch::Receiver<bool>,
    pool_management: Mutex<Option<BackgroundHandle>>,
}

struct BackgroundHandle {
    cancel: tokio_util::sync::CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl Engine {
    pub fn new(config: Arc<Config>, store: Arc<Store>, gateway: Arc<RpcGateway>, program_id: Pubkey, core_wallet: &CoreWallet) -> Self {
        let (paused_tx, paused_rx) = watch::channel(false);
        Self {
            state: Mutex::new(EngineState::Stopped),
            registry: Mutex::new(HashMap::new()),
            store,
            gateway,
            config,
            program_id,
            core_wallet_keypair: Arc::new(core_wallet.keypair()),
            paused_tx,
            paused_rx,
            pool_management: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> EngineState {
        *self.state.lock().await
    }

    /// Idempotent from `Stopped`: validates saved pools against the chain, imports
    /// the valid ones, tops up to `target_active_pools` by creating new ones, probes
    /// `GetVersion`, starts the background pool-management task, and transitions to
    /// `Started`.
    pub async fn start(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().await;
            if *state == EngineState::Started {
                return Ok(());
            }
            *state = EngineState::Starting;
        }

        let cancel = tokio_util::sync::CancellationToken::new();
        let active = reconcile_active_pools(
            &self.store,
            &self.gateway,
            &self.program_id,
            &self.core_wallet_keypair,
            self.config.target_active_pools,
            &cancel,
        )
        .await;
        let _ = self.store.save_active_pools(&active);

        let version_probe = version::probe_version(&self.gateway, &cancel, &self.program_id, &self.core_wallet_keypair.pubkey()).await;
        info!("GetVersion probe succeeded={}", version_probe.succeeded);

        self.start_pool_management().await;

        *self.state.lock().await = EngineState::Started;
        Ok(())
    }

    /// Spawns the periodic background task that re-validates and tops up the
    /// active pool set every `POOL_MANAGEMENT_INTERVAL_SECS` while the engine runs.
    /// A no-op if the task is already running.
    async fn start_pool_management(&self) {
        let mut slot = self.pool_management.lock().await;
        if slot.is_some() {
            return;
        }

        let store = self.store.clone();
        let gateway = self.gateway.clone();
        let program_id = self.program_id;
        let payer = self.core_wallet_keypair.clone();
        let target = self.config.target_active_pools;
        let cancel = tokio_util::sync::CancellationToken::new();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            let period = Duration::from_secs(POOL_MANAGEMENT_INTERVAL_SECS);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let active = reconcile_active_pools(&store, &gateway, &program_id, &payer, target, &task_cancel).await;
                        let _ = store.save_active_pools(&active);
                    }
                }
            }
        });

        *slot = Some(BackgroundHandle { cancel, join });
    }

    /// Cancels every worker's token, waits up to `WORKER_STOP_TIMEOUT_SECS` each,
    /// persists a `Session` per worker, stops the background pool-management task,
    /// and transitions to `Stopped`.
    pub async fn stop(&self) -> Result<(), EngineError> {
        *self.state.lock().await = EngineState::Stopping;

        let handles: Vec<(String, WorkerHandle)> = {
            let mut registry = self.registry.lock().await;
            registry.drain().collect()
        };

        for (worker_id, handle) in handles {
            let started_at = handle.started_at;
            let quiesced = handle.stop_and_wait(Duration::from_secs(WORKER_STOP_TIMEOUT_SECS)).await;
            if !quiesced {
                warn!("worker {worker_id} did not quiesce within the stop timeout");
            }
            self.record_session(&worker_id, started_at, StopReason::EngineStop)?;
        }

        if let Some(background) = self.pool_management.lock().await.take() {
            background.cancel.cancel();
            let _ = tokio::time::timeout(Duration::from_secs(WORKER_STOP_TIMEOUT_SECS), background.join).await;
        }

        *self.state.lock().await = EngineState::Stopped;
        Ok(())
    }

    /// Cancels worker loops cooperatively without tearing down wallets or stats.
    pub async fn pause(&self) {
        *self.state.lock().await = EngineState::Pausing;
        let _ = self.paused_tx.send(true);
        *self.state.lock().await = EngineState::Paused;
    }

    pub async fn resume(&self) {
        *self.state.lock().await = EngineState::Resuming;
        let _ = self.paused_tx.send(false);
        *self.state.lock().await = EngineState::Started;
    }

    /// Validates singleton constraints, generates a wallet, and persists a
    /// `Created` worker with zeroed statistics. Does not start it.
    pub fn create_worker(
        &self,
        kind: WorkerKind,
        pool_id: Pubkey,
        token_side: Option<TokenSide>,
        initial_amount: u64,
        auto_refill: bool,
        share_tokens: bool,
    ) -> Result<Worker, EngineError> {
        if kind.is_swap() {
            let existing = self.store.load_workers()?;
            if existing.values().any(|w| w.pool_id == pool_id && w.kind == kind) {
                return Err(EngineError::duplicate_swap_direction(pool_id, kind));
            }
        }

        let worker = Worker {
            worker_id: Worker::new_id(kind),
            kind,
            pool_id,
            token_side,
            initial_amount,
            auto_refill,
            share_tokens,
            wallet: crate::types::WorkerWallet::generate(),
            status: WorkerStatus::Created,
            created_at: chrono::Utc::now(),
            last_operation_at: None,
        };
        worker
            .validate_invariants()
            .map_err(|reason| EngineError::invalid_worker_state(&worker.worker_id, reason))?;

        self.store.upsert_worker(&worker)?;
        self.store.save_stats(&worker.worker_id, &crate::types::Statistics::default())?;
        Ok(worker)
    }

    pub async fn start_worker(&self, worker_id: &str) -> Result<(), EngineError> {
        let workers = self.store.load_workers()?;
        let worker = workers
            .get(worker_id)
            .cloned()
            .ok_or_else(|| EngineError::invalid_worker_state(worker_id, "not found"))?;
        if worker.status == WorkerStatus::Error {
            return Err(EngineError::invalid_worker_state(worker_id, "worker is in Error status"));
        }

        let pools = self.store.load_pools()?;
        let pool = pools
            .get(&worker.pool_id.to_string())
            .cloned()
            .ok_or_else(|| EngineError::pool_not_found(worker.pool_id))?;
        let stats = self.store.load_stats(worker_id)?;

        let ctx = WorkerContext {
            store: self.store.clone(),
            gateway: self.gateway.clone(),
            config: self.config.clone(),
            program_id: self.program_id,
            core_wallet_keypair: self.core_wallet_keypair.clone(),
            pool,
            peer_lookup: Arc::new(StorePeerLookup { store: self.store.clone() }),
            paused: self.paused_rx.clone(),
        };

        let handle = worker::spawn(ctx, worker, stats);
        self.registry.lock().await.insert(worker_id.to_string(), handle);
        Ok(())
    }

    pub async fn stop_worker(&self, worker_id: &str) -> Result<(), EngineError> {
        let handle = self.registry.lock().await.remove(worker_id);
        let started_at = match handle {
            Some(handle) => {
                let started_at = handle.started_at;
                let quiesced = handle.stop_and_wait(Duration::from_secs(WORKER_STOP_TIMEOUT_SECS)).await;
                if !quiesced {
                    warn!("worker {worker_id} did not quiesce within the stop timeout");
                }
                started_at
            }
            None => self
                .store
                .load_workers()?
                .get(worker_id)
                .map(|w| w.created_at)
                .unwrap_or_else(chrono::Utc::now),
        };
        self.record_session(worker_id, started_at, StopReason::UserRequested)?;
        Ok(())
    }

    pub async fn delete_worker(&self, worker_id: &str) -> Result<(), EngineError> {
        self.empty_worker(worker_id).await?;
        self.stop_worker(worker_id).await?;
        self.store.delete_worker(worker_id)?;
        Ok(())
    }

    /// Burns the worker's entire relevant balance immediately, then attempts the
    /// matching pool operation for that amount and burns any output it receives,
    /// per the `Empty` protocol in `spec.md` §4.8. Works in any status except `Error`.
    pub async fn empty_worker(&self, worker_id: &str) -> Result<(), EngineError> {
        let workers = self.store.load_workers()?;
        let worker = workers
            .get(worker_id)
            .cloned()
            .ok_or_else(|| EngineError::invalid_worker_state(worker_id, "not found"))?;
        if worker.status == WorkerStatus::Error {
            return Err(EngineError::invalid_worker_state(worker_id, "Error workers refuse Empty"));
        }

        let pools = self.store.load_pools()?;
        let pool = pools
            .get(&worker.pool_id.to_string())
            .cloned()
            .ok_or_else(|| EngineError::pool_not_found(worker.pool_id))?;

        let cancel = tokio_util::sync::CancellationToken::new();
        let keypair = worker.wallet.keypair();
        let normalized = pool_ratio(&pool);
        let addresses = ratio::derive_pool_addresses(&self.program_id, &normalized);

        let relevant_mint = match (worker.kind, worker.token_side) {
            (WorkerKind::Deposit, Some(TokenSide::A)) | (WorkerKind::SwapAB, _) => pool.token_a_mint,
            (WorkerKind::Deposit, Some(TokenSide::B)) | (WorkerKind::SwapBA, _) => pool.token_b_mint,
            (WorkerKind::Withdraw, Some(TokenSide::A)) => addresses.lp_mint_a,
            (WorkerKind::Withdraw, Some(TokenSide::B)) => addresses.lp_mint_b,
            _ => return Err(EngineError::invalid_worker_state(worker_id, "missing token_side")),
        };
        let source_account = spl_associated_token_account::get_associated_token_address(&keypair.pubkey(), &relevant_mint);

        let balance = self
            .gateway
            .get_token_balance(&cancel, &source_account)
            .await
            .unwrap_or(0);

        let mut stats = self.store.load_stats(worker_id)?;
        stats.empties_performed += 1;

        if balance == 0 {
            self.store.save_stats(worker_id, &stats)?;
            return Ok(());
        }

        let sink_account = self.core_wallet_keypair.pubkey();
        let sink_ata = spl_associated_token_account::get_associated_token_address(&sink_account, &relevant_mint);
        let burn_ix = tx_builder::burn_to_sink_instruction(&source_account, &sink_ata, &keypair.pubkey(), balance);
        if let Err(e) = self.send_one(&cancel, OperationKind::Withdraw, &[burn_ix], &keypair, &[]).await {
            warn!("empty-command burn failed for {worker_id}: {e}");
            stats.push_error(format!("empty burn failed: {e}"), None);
        }

        match self
            .attempt_empty_pool_op(&cancel, &worker, &pool, &normalized, &addresses, &keypair, &source_account, balance)
            .await
        {
            Ok(Some((output_account, output_mint, output_amount))) if output_amount > 0 => {
                stats.last_empty_operation_successful = Some(true);
                let output_sink_ata = spl_associated_token_account::get_associated_token_address(&sink_account, &output_mint);
                let burn_output_ix =
                    tx_builder::burn_to_sink_instruction(&output_account, &output_sink_ata, &keypair.pubkey(), output_amount);
                if let Err(e) = self.send_one(&cancel, OperationKind::Withdraw, &[burn_output_ix], &keypair, &[]).await {
                    warn!("empty-command output burn failed for {worker_id}: {e}");
                    stats.push_error(format!("empty output burn failed: {e}"), None);
                }
            }
            Ok(_) => stats.last_empty_operation_successful = Some(true),
            Err(e) => {
                warn!("empty-command pool op failed for {worker_id}: {e}");
                stats.last_empty_operation_successful = Some(false);
                stats.push_error(format!("empty pool op failed: {e}"), None);
            }
        }

        self.store.save_stats(worker_id, &stats)?;
        Ok(())
    }

    /// Attempts the pool op matching `worker.kind` for the amount just burned (step 3
    /// of the `Empty` protocol) and reports the account/mint/amount of whatever output
    /// it produced, so the caller can burn that too.
    #[allow(clippy::too_many_arguments)]
    async fn attempt_empty_pool_op(
        &self,
        cancel: &tokio_util::sync::CancellationToken,
        worker: &Worker,
        pool: &Pool,
        normalized: &NormalizedRatio,
        addresses: &ratio::PoolAddresses,
        keypair: &Keypair,
        input_account: &Pubkey,
        x: u64,
    ) -> Result<Option<(Pubkey, Pubkey, u64)>, GatewayError> {
        let system_state = ratio::derive_system_state(&self.program_id).0;
        let main_treasury = ratio::derive_main_treasury(&self.program_id).0;

        match worker.kind {
            WorkerKind::Deposit => {
                let side = worker.token_side.expect("deposit workers always carry a token_side");
                let lp_mint = match side {
                    TokenSide::A => addresses.lp_mint_a,
                    TokenSide::B => addresses.lp_mint_b,
                };
                let user_lp_account = spl_associated_token_account::get_associated_token_address(&keypair.pubkey(), &lp_mint);
                let ix = tx_builder::deposit_instruction(
                    &self.program_id,
                    &keypair.pubkey(),
                    &system_state,
                    normalized,
                    addresses,
                    side,
                    input_account,
                    &user_lp_account,
                    &main_treasury,
                    x,
                );
                self.send_one(cancel, OperationKind::Deposit, &[ix], keypair, &[]).await?;
                let received = self.gateway.get_token_balance(cancel, &user_lp_account).await.unwrap_or(0);
                Ok(Some((user_lp_account, lp_mint, received)))
            }
            WorkerKind::Withdraw => {
                let side = worker.token_side.expect("withdraw workers always carry a token_side");
                let underlying_mint = match side {
                    TokenSide::A => pool.token_a_mint,
                    TokenSide::B => pool.token_b_mint,
                };
                let user_destination_account =
                    spl_associated_token_account::get_associated_token_address(&keypair.pubkey(), &underlying_mint);
                let ix = tx_builder::withdraw_instruction(
                    &self.program_id,
                    &keypair.pubkey(),
                    &system_state,
                    normalized,
                    addresses,
                    side,
                    input_account,
                    &user_destination_account,
                    &main_treasury,
                    x,
                );
                self.send_one(cancel, OperationKind::Withdraw, &[ix], keypair, &[]).await?;
                let received = self.gateway.get_token_balance(cancel, &user_destination_account).await.unwrap_or(0);
                Ok(Some((user_destination_account, underlying_mint, received)))
            }
            WorkerKind::SwapAB | WorkerKind::SwapBA => {
                let input_side = if worker.kind == WorkerKind::SwapAB { TokenSide::A } else { TokenSide::B };
                let output_mint = match input_side {
                    TokenSide::A => pool.token_b_mint,
                    TokenSide::B => pool.token_a_mint,
                };
                let expected_output = match input_side {
                    TokenSide::A => ratio::expected_output_a_to_b(x, normalized.ratio_a_numerator, normalized.ratio_b_denominator),
                    TokenSide::B => ratio::expected_output_b_to_a(x, normalized.ratio_a_numerator, normalized.ratio_b_denominator),
                }
                .unwrap_or(0);
                let user_output_account = spl_associated_token_account::get_associated_token_address(&keypair.pubkey(), &output_mint);
                let ix = tx_builder::swap_instruction(
                    &self.program_id,
                    &keypair.pubkey(),
                    &system_state,
                    normalized,
                    addresses,
                    input_side,
                    input_account,
                    &user_output_account,
                    x,
                    expected_output,
                );
                self.send_one(cancel, OperationKind::Swap, &[ix], keypair, &[]).await?;
                let received = self.gateway.get_token_balance(cancel, &user_output_account).await.unwrap_or(0);
                Ok(Some((user_output_account, output_mint, received)))
            }
        }
    }

    fn record_session(
        &self,
        worker_id: &str,
        started_at: chrono::DateTime<chrono::Utc>,
        reason: StopReason,
    ) -> Result<(), EngineError> {
        let stats = self.store.load_stats(worker_id)?;
        let session = Session {
            worker_id: worker_id.to_string(),
            started_at,
            stopped_at: chrono::Utc::now(),
            stop_reason: reason,
            final_stats: stats,
        };
        self.store.save_session(&session)?;
        Ok(())
    }

    pub async fn health(&self) -> Health {
        let state = *self.state.lock().await;
        let workers = self.store.load_workers().unwrap_or_default();
        let running = workers.values().filter(|w| w.status == WorkerStatus::Running).count();
        let failed = workers.values().filter(|w| w.status == WorkerStatus::Error).count();

        Health {
            state: format!("{state:?}"),
            total_workers: workers.len(),
            running,
            failed,
            process_id: std::process::id(),
            mem_mb: read_resident_memory_mb(),
        }
    }

    async fn send_one(
        &self,
        cancel: &tokio_util::sync::CancellationToken,
        op: OperationKind,
        instructions: &[solana_sdk::instruction::Instruction],
        payer: &Keypair,
        extra_signers: &[&Keypair],
    ) -> Result<(), GatewayError> {
        send_one(&self.gateway, cancel, op, instructions, payer, extra_signers).await
    }
}

async fn send_one(
    gateway: &RpcGateway,
    cancel: &tokio_util::sync::CancellationToken,
    op: OperationKind,
    instructions: &[solana_sdk::instruction::Instruction],
    payer: &Keypair,
    extra_signers: &[&Keypair],
) -> Result<(), GatewayError> {
    let blockhash = gateway.get_latest_blockhash(cancel).await?;
    let tx = tx_builder::build_signed_transaction(op, instructions, payer, extra_signers, blockhash);
    gateway.send(cancel, &tx).await.map(|_| ())
}

/// Mints a fresh pair of SPL token mints and creates a pool over them at a random
/// anchored-to-one ratio. Used both to top up `target_active_pools` at `Start` and
/// by the periodic pool-management background task.
async fn create_random_pool(
    store: &Store,
    gateway: &RpcGateway,
    program_id: &Pubkey,
    payer: &Keypair,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<Pool, EngineError> {
    let mut rng = rand::thread_rng();
    let mint_a = Keypair::new();
    let mint_b = Keypair::new();
    let decimals_a: u8 = *[6u8, 9u8].get(rng.gen_range(0..2)).unwrap();
    let decimals_b: u8 = *[6u8, 9u8].get(rng.gen_range(0..2)).unwrap();
    let ratio_whole: u64 = rng.gen_range(1..=1000);

    let rent = gateway
        .get_minimum_balance_for_rent_exemption(cancel, spl_token::state::Mint::LEN)
        .await
        .map_err(|e| EngineError::Structured {
            code: ENGINE_ERROR_INVALID_WORKER_STATE,
            message: format!("could not fetch mint rent exemption: {e}"),
        })?;

    let mut mint_ixs = tx_builder::create_mint_instructions(&payer.pubkey(), &mint_a.pubkey(), &payer.pubkey(), decimals_a, rent);
    mint_ixs.extend(tx_builder::create_mint_instructions(
        &payer.pubkey(),
        &mint_b.pubkey(),
        &payer.pubkey(),
        decimals_b,
        rent,
    ));
    send_one(gateway, cancel, OperationKind::TreasuryInit, &mint_ixs, payer, &[&mint_a, &mint_b])
        .await
        .map_err(|e| EngineError::Structured {
            code: ENGINE_ERROR_INVALID_WORKER_STATE,
            message: format!("mint-creation transaction failed: {e}"),
        })?;

    let request = RatioRequest {
        multiple_mint: mint_a.pubkey(),
        multiple_decimals: decimals_a,
        base_mint: mint_b.pubkey(),
        base_decimals: decimals_b,
        ratio_whole_number: ratio_whole,
        direction: RatioDirection::MultiplePerBase,
    };
    let normalized = ratio::normalize(&request).map_err(|e| EngineError::Structured {
        code: ENGINE_ERROR_INVALID_WORKER_STATE,
        message: format!("could not normalize a random pool ratio: {e}"),
    })?;
    let addresses = ratio::derive_pool_addresses(program_id, &normalized);

    let ix = tx_builder::pool_create_instruction(program_id, &payer.pubkey(), &normalized, &addresses);
    send_one(gateway, cancel, OperationKind::PoolCreate, &[ix], payer, &[])
        .await
        .map_err(|e| EngineError::Structured {
            code: ENGINE_ERROR_INVALID_WORKER_STATE,
            message: format!("pool-create transaction failed: {e}"),
        })?;

    let pool = Pool {
        pool_id: addresses.pool_state,
        token_a_mint: normalized.token_a_mint,
        token_b_mint: normalized.token_b_mint,
        token_a_decimals: normalized.token_a_decimals,
        token_b_decimals: normalized.token_b_decimals,
        ratio_a_numerator: normalized.ratio_a_numerator,
        ratio_b_denominator: normalized.ratio_b_denominator,
        lp_mint_a: addresses.lp_mint_a,
        lp_mint_b: addresses.lp_mint_b,
        vault_a: addresses.vault_a,
        vault_b: addresses.vault_b,
        ratio_display: format!("{}:{}", normalized.ratio_a_numerator, normalized.ratio_b_denominator),
        created_at: chrono::Utc::now(),
    };
    store.save_pool(&pool)?;
    Ok(pool)
}

/// Drops saved pools no longer present on chain, then creates new ones until
/// `target` active pools are reached. Shared by `Engine::start` and the periodic
/// background pool-management task.
async fn reconcile_active_pools(
    store: &Store,
    gateway: &RpcGateway,
    program_id: &Pubkey,
    payer: &Keypair,
    target: usize,
    cancel: &tokio_util::sync::CancellationToken,
) -> Vec<Pubkey> {
    let saved_pools = store.load_pools().unwrap_or_default();
    let mut active: Vec<Pubkey> = Vec::new();

    for pool in saved_pools.values() {
        match gateway.get_account_info(cancel, &pool.pool_id).await {
            Ok(Some(_)) => active.push(pool.pool_id),
            Ok(None) => warn!("dropping stale pool {} (no longer on chain)", pool.pool_id),
            Err(e) => warn!("could not validate pool {}: {e}", pool.pool_id),
        }
    }

    while active.len() < target {
        match create_random_pool(store, gateway, program_id, payer, cancel).await {
            Ok(pool) => active.push(pool.pool_id),
            Err(e) => {
                warn!("failed to create a new pool while topping up active pools: {e}");
                break;
            }
        }
    }

    active
}

fn pool_ratio(pool: &Pool) -> NormalizedRatio {
    NormalizedRatio {
        token_a_mint: pool.token_a_mint,
        token_a_decimals: pool.token_a_decimals,
        token_b_mint: pool.token_b_mint,
        token_b_decimals: pool.token_b_decimals,
        ratio_a_numerator: pool.ratio_a_numerator,
        ratio_b_denominator: pool.ratio_b_denominator,
    }
}

/// Resident set size, in megabytes, read from `/proc/self/status`. Returns 0
/// on platforms without procfs rather than failing `Health`.
fn read_resident_memory_mb() -> u64 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0;
    };
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches(" kB").trim().parse().unwrap_or(0);
            return kb / 1024;
        }
    }
    0
}
