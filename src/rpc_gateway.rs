//! Thin async wrapper over `solana_client`'s nonblocking RPC client
//! (component C5, `spec.md` §4.5). Every call here is a single suspension
//! point a worker's cancellation token must be able to interrupt.

use std::sync::Arc;
use std::time::Duration;

use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::constants::{AIRDROP_STAIRCASE_ATTEMPTS_PER_STEP, AIRDROP_STAIRCASE_LAMPORTS};

/// Diagnostics captured from the mandatory pre-send simulation.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
    pub error: Option<String>,
}

/// Whether the gateway is allowed to fall back to `skipPreflight=true` after a
/// preflight failure, and how long individual requests may take.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub allow_skip_preflight: bool,
    pub request_timeout: Duration,
    pub confirm_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            allow_skip_preflight: false,
            request_timeout: Duration::from_secs(30),
            confirm_timeout: Duration::from_secs(30),
        }
    }
}

/// Wraps one `solana_client::nonblocking::rpc_client::RpcClient` with the
/// orchestrator's send policy (`spec.md` §4.5): always simulate first, send
/// with preflight by default, and only skip preflight on request.
pub struct RpcGateway {
    client: Arc<RpcClient>,
    config: GatewayConfig,
}

impl RpcGateway {
    pub fn new(rpc_url: String, config: GatewayConfig) -> Self {
        let client = RpcClient::new_with_commitment(rpc_url, CommitmentConfig::processed());
        Self {
            client: Arc::new(client),
            config,
        }
    }

    async fn with_timeout<T>(
        &self,
        cancel: &CancellationToken,
        fut: impl std::future::Future<Output = Result<T, ClientError>>,
    ) -> Result<T, GatewayError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = timeout(self.config.request_timeout, fut) => {
                match result {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(GatewayError::Client(e)),
                    Err(_) => Err(GatewayError::Timeout),
                }
            }
        }
    }

    pub async fn get_balance(&self, cancel: &CancellationToken, pubkey: &Pubkey) -> Result<u64, GatewayError> {
        self.with_timeout(cancel, self.client.get_balance(pubkey)).await
    }

    pub async fn get_token_balance(
        &self,
        cancel: &CancellationToken,
        account: &Pubkey,
    ) -> Result<u64, GatewayError> {
        let response = self
            .with_timeout(cancel, self.client.get_token_account_balance(account))
            .await?;
        response
            .amount
            .parse::<u64>()
            .map_err(|_| GatewayError::MalformedResponse("token balance was not a u64".into()))
    }

    pub async fn get_account_info(
        &self,
        cancel: &CancellationToken,
        pubkey: &Pubkey,
    ) -> Result<Option<solana_sdk::account::Account>, GatewayError> {
        let response = self
            .with_timeout(
                cancel,
                self.client
                    .get_account_with_commitment(pubkey, CommitmentConfig::processed()),
            )
            .await?;
        Ok(response.value)
    }

    pub async fn get_latest_blockhash(&self, cancel: &CancellationToken) -> Result<Hash, GatewayError> {
        self.with_timeout(cancel, self.client.get_latest_blockhash()).await
    }

    pub async fn get_minimum_balance_for_rent_exemption(
        &self,
        cancel: &CancellationToken,
        data_len: usize,
    ) -> Result<u64, GatewayError> {
        self.with_timeout(cancel, self.client.get_minimum_balance_for_rent_exemption(data_len))
            .await
    }

    /// Requests an airdrop, retrying down the staircase of amounts defined in
    /// `AIRDROP_STAIRCASE_LAMPORTS` if the balance doesn't move (localnet only).
    /// Stops as soon as the balance reaches `target_lamports`.
    pub async fn request_airdrop_staircase(
        &self,
        cancel: &CancellationToken,
        pubkey: &Pubkey,
        target_lamports: u64,
    ) -> Result<u64, GatewayError> {
        let starting_balance = self.get_balance(cancel, pubkey).await.unwrap_or(0);

        for &lamports in AIRDROP_STAIRCASE_LAMPORTS {
            for _ in 0..AIRDROP_STAIRCASE_ATTEMPTS_PER_STEP {
                if cancel.is_cancelled() {
                    return Err(GatewayError::Cancelled);
                }
                match self.with_timeout(cancel, self.client.request_airdrop(pubkey, lamports)).await {
                    Ok(sig) => {
                        if self.confirm_signature(cancel, &sig).await.is_ok() {
                            let new_balance = self.get_balance(cancel, pubkey).await.unwrap_or(starting_balance);
                            if new_balance >= target_lamports || new_balance > starting_balance {
                                return Ok(new_balance);
                            }
                        }
                    }
                    Err(_) => continue,
                }
            }
        }
        Err(GatewayError::AirdropExhausted)
    }

    /// Mandatory pre-send simulation with `sigVerify=false, replaceRecentBlockhash=true`.
    pub async fn simulate(
        &self,
        cancel: &CancellationToken,
        tx: &Transaction,
    ) -> Result<SimulationReport, GatewayError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            commitment: Some(CommitmentConfig {
                commitment: CommitmentLevel::Processed,
            }),
            ..RpcSimulateTransactionConfig::default()
        };
        let response = self
            .with_timeout(cancel, self.client.simulate_transaction_with_config(tx, config))
            .await?;
        let value = response.value;
        Ok(SimulationReport {
            logs: value.logs.unwrap_or_default(),
            units_consumed: value.units_consumed,
            error: value.err.map(|e| e.to_string()),
        })
    }

    /// A preflight-mimic simulation, used only for diagnostics after a preflight
    /// failure: `sigVerify=true, replaceRecentBlockhash=false`.
    pub async fn simulate_preflight_mimic(
        &self,
        cancel: &CancellationToken,
        tx: &Transaction,
    ) -> Result<SimulationReport, GatewayError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: true,
            replace_recent_blockhash: false,
            commitment: Some(CommitmentConfig {
                commitment: CommitmentLevel::Processed,
            }),
            ..RpcSimulateTransactionConfig::default()
        };
        let response = self
            .with_timeout(cancel, self.client.simulate_transaction_with_config(tx, config))
            .await?;
        let value = response.value;
        Ok(SimulationReport {
            logs: value.logs.unwrap_or_default(),
            units_consumed: value.units_consumed,
            error: value.err.map(|e| e.to_string()),
        })
    }

    /// Sends a transaction following the send policy: simulate first, then send
    /// with `skipPreflight=false` by default; on preflight failure, run a
    /// diagnostic preflight-mimic simulation and, only if configured, retry with
    /// `skipPreflight=true`.
    pub async fn send(&self, cancel: &CancellationToken, tx: &Transaction) -> Result<Signature, GatewayError> {
        let simulation = self.simulate(cancel, tx).await?;
        if let Some(err) = &simulation.error {
            return Err(GatewayError::SimulationFailed {
                error: err.clone(),
                logs: simulation.logs,
            });
        }

        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Processed),
            ..RpcSendTransactionConfig::default()
        };
        match self
            .with_timeout(cancel, self.client.send_transaction_with_config(tx, config))
            .await
        {
            Ok(sig) => Ok(sig),
            Err(preflight_err) => {
                let _diagnostics = self.simulate_preflight_mimic(cancel, tx).await;
                if self.config.allow_skip_preflight {
                    let skip_config = RpcSendTransactionConfig {
                        skip_preflight: true,
                        ..RpcSendTransactionConfig::default()
                    };
                    self.with_timeout(cancel, self.client.send_transaction_with_config(tx, skip_config))
                        .await
                } else {
                    Err(preflight_err)
                }
            }
        }
    }

    pub async fn confirm_signature(
        &self,
        cancel: &CancellationToken,
        signature: &Signature,
    ) -> Result<bool, GatewayError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = timeout(self.config.confirm_timeout, self.client.confirm_transaction(signature)) => {
                match result {
                    Ok(Ok(confirmed)) => Ok(confirmed),
                    Ok(Err(e)) => Err(GatewayError::Client(e)),
                    Err(_) => Err(GatewayError::Timeout),
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("RPC client error: {0}")]
    Client(#[from] ClientError),

    #[error("simulation failed: {error}")]
    SimulationFailed { error: String, logs: Vec<String> },

    #[error("airdrop staircase exhausted without increasing balance")]
    AirdropExhausted,

    #[error("malformed RPC response: {0}")]
    MalformedResponse(String),
}
