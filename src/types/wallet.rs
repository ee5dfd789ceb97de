use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

/// The single process-wide wallet used to airdrop SOL, mint tokens to worker
/// wallets, and receive reclaimed SOL on `Empty` (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreWallet {
    secret_key: [u8; 32],
}

impl CoreWallet {
    pub fn generate() -> Self {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();
        let mut secret_key = [0u8; 32];
        secret_key.copy_from_slice(&bytes[..32]);
        Self { secret_key }
    }

    pub fn keypair(&self) -> Keypair {
        solana_sdk::signer::keypair::keypair_from_seed(&self.secret_key)
            .expect("core wallet secret is always a valid 32-byte ed25519 seed")
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair().pubkey()
    }
}
