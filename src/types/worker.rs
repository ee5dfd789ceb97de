use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

/// Which side of the pool a deposit/withdraw worker is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenSide {
    A,
    B,
}

/// The four worker archetypes (`spec.md` §3). `SwapAB`/`SwapBA` workers are
/// singleton per pool; `Deposit`/`Withdraw` workers are unbounded per pool+side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerKind {
    Deposit,
    Withdraw,
    SwapAB,
    SwapBA,
}

impl WorkerKind {
    pub fn is_swap(&self) -> bool {
        matches!(self, WorkerKind::SwapAB | WorkerKind::SwapBA)
    }

    /// Deposit/Withdraw workers carry a `TokenSide`; swap workers don't (their direction
    /// is implied by `SwapAB`/`SwapBA` itself).
    pub fn requires_token_side(&self) -> bool {
        matches!(self, WorkerKind::Deposit | WorkerKind::Withdraw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Error,
}

/// A worker's durable wallet: the 32-byte secret is the only thing persisted,
/// the public key is re-derived from it on load rather than stored twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerWallet {
    secret_key: [u8; 32],
}

impl WorkerWallet {
    pub fn generate() -> Self {
        let keypair = Keypair::new();
        Self::from_keypair(&keypair)
    }

    pub fn from_keypair(keypair: &Keypair) -> Self {
        let bytes = keypair.to_bytes();
        let mut secret_key = [0u8; 32];
        secret_key.copy_from_slice(&bytes[..32]);
        Self { secret_key }
    }

    /// Re-derives the full signing keypair by expanding the stored seed, the same way
    /// `solana_sdk::signer::keypair::keypair_from_seed_phrase_and_passphrase` does for
    /// BIP39-derived wallets.
    pub fn keypair(&self) -> Keypair {
        solana_sdk::signer::keypair::keypair_from_seed(&self.secret_key)
            .expect("worker wallet secret is always a valid 32-byte ed25519 seed")
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair().pubkey()
    }
}

/// Mutable lifecycle object driving operations against one pool/side/direction
/// (`spec.md` §3, §4.8). Mutated only by its own task; the Engine only reads it
/// for routing/registry purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub kind: WorkerKind,
    pub pool_id: Pubkey,
    pub token_side: Option<TokenSide>,
    pub initial_amount: u64,
    pub auto_refill: bool,
    pub share_tokens: bool,
    pub wallet: WorkerWallet,
    pub status: WorkerStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_operation_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Worker {
    /// Generates a new worker id: a kind-typed prefix plus a unique suffix.
    pub fn new_id(kind: WorkerKind) -> String {
        let prefix = match kind {
            WorkerKind::Deposit => "dep",
            WorkerKind::Withdraw => "wd",
            WorkerKind::SwapAB => "swab",
            WorkerKind::SwapBA => "swba",
        };
        format!("{prefix}-{}", uuid::Uuid::new_v4())
    }

    /// `autoRefill ⇒ initialAmount>0` (`spec.md` §3 Worker invariants).
    pub fn validate_invariants(&self) -> Result<(), &'static str> {
        if self.auto_refill && self.initial_amount == 0 {
            return Err("autoRefill requires a non-zero initialAmount");
        }
        if self.kind.requires_token_side() && self.token_side.is_none() {
            return Err("deposit/withdraw workers require a token_side");
        }
        if !self.kind.requires_token_side() && self.token_side.is_some() {
            return Err("swap workers must not carry a token_side");
        }
        Ok(())
    }
}
