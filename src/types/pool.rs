use serde::{Deserialize, Serialize};
use solana_program::pubkey::Pubkey;

/// Immutable record of a managed trading pool, created once and never
/// mutated afterward (`spec.md` §3).
///
/// Invariants enforced at construction time by [`crate::ratio::derive_pool`]:
/// - `token_a_mint` is lexicographically `<=` `token_b_mint`.
/// - exactly one of `ratio_a_numerator == 10^token_a_decimals` or
///   `ratio_b_denominator == 10^token_b_decimals` holds (anchored-to-one).
/// - `pool_id` is the program-derived address seeded by
///   `("pool_state", token_a_mint, token_b_mint, ratio_a_numerator_le, ratio_b_denominator_le)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub pool_id: Pubkey,
    pub token_a_mint: Pubkey,
    pub token_b_mint: Pubkey,
    pub token_a_decimals: u8,
    pub token_b_decimals: u8,
    pub ratio_a_numerator: u64,
    pub ratio_b_denominator: u64,
    pub lp_mint_a: Pubkey,
    pub lp_mint_b: Pubkey,
    pub vault_a: Pubkey,
    pub vault_b: Pubkey,
    pub ratio_display: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Pool {
    /// `true` if Token A is the side anchored to one whole unit (`ratio_a_numerator == 10^decimals_a`).
    pub fn token_a_is_anchor(&self) -> bool {
        self.ratio_a_numerator == 10u64.pow(self.token_a_decimals as u32)
    }
}
