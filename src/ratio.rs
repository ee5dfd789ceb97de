//! Basis-point ratio math, pool normalization, and PDA derivation (component C2).
//!
//! Mirrors the on-chain contract's own arithmetic: every multiplication runs
//! through a `u128` intermediate before truncating back to `u64`, matching
//! `processors/swap.rs`'s `checked_mul`/`checked_div` pattern so that a
//! client-computed expected output always agrees with what the contract will
//! compute, byte-for-byte.

use solana_program::pubkey::Pubkey;

use crate::constants::{
    LP_TOKEN_A_MINT_SEED_PREFIX, LP_TOKEN_B_MINT_SEED_PREFIX, MAIN_TREASURY_SEED_PREFIX,
    POOL_STATE_SEED_PREFIX, POOL_TREASURY_SEED_PREFIX, SYSTEM_STATE_SEED_PREFIX,
    TOKEN_A_VAULT_SEED_PREFIX, TOKEN_B_VAULT_SEED_PREFIX,
};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RatioError {
    #[error("ratio is not anchored to one: neither side equals 10^decimals for its token")]
    InvalidRatio,
    #[error("arithmetic overflow computing expected output")]
    ArithmeticOverflow,
    #[error("input amount too small to produce a non-zero output at this ratio")]
    InsufficientInput,
}

/// Which side of the user-supplied `ratio_whole_number` is anchored to one
/// whole unit. `spec.md` §4.2: "Direction flag picks which side is anchored."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioDirection {
    /// `ratio_whole_number` multiple-tokens equal 1 base-token; the base side is anchored.
    MultiplePerBase,
    /// `ratio_whole_number` base-tokens equal 1 multiple-token; the multiple side is anchored.
    BasePerMultiple,
}

/// User-facing pool-creation request, before canonical ordering.
#[derive(Debug, Clone)]
pub struct RatioRequest {
    pub multiple_mint: Pubkey,
    pub multiple_decimals: u8,
    pub base_mint: Pubkey,
    pub base_decimals: u8,
    pub ratio_whole_number: u64,
    pub direction: RatioDirection,
}

/// A fully normalized, contract-ready ratio: canonical token order, basis
/// points on both sides, anchored-to-one validated.
#[derive(Debug, Clone)]
pub struct NormalizedRatio {
    pub token_a_mint: Pubkey,
    pub token_a_decimals: u8,
    pub token_b_mint: Pubkey,
    pub token_b_decimals: u8,
    pub ratio_a_numerator: u64,
    pub ratio_b_denominator: u64,
}

/// Converts a display whole-number ratio into basis points on both sides and
/// orders tokens canonically (A's key bytes `<=` B's), swapping the ratio
/// sides along with the tokens so the exchange rate is preserved.
pub fn normalize(req: &RatioRequest) -> Result<NormalizedRatio, RatioError> {
    let multiple_basis = to_basis_points(req.ratio_whole_number, req.multiple_decimals);
    let base_basis = 10u64
        .checked_pow(req.base_decimals as u32)
        .ok_or(RatioError::ArithmeticOverflow)?;

    let (multiple_basis, base_basis) = match req.direction {
        RatioDirection::MultiplePerBase => (multiple_basis, base_basis),
        RatioDirection::BasePerMultiple => {
            let multiple_anchor = 10u64
                .checked_pow(req.multiple_decimals as u32)
                .ok_or(RatioError::ArithmeticOverflow)?;
            let base_scaled = to_basis_points(req.ratio_whole_number, req.base_decimals);
            (multiple_anchor, base_scaled)
        }
    };

    let (token_a_mint, token_a_decimals, ratio_a_numerator, token_b_mint, token_b_decimals, ratio_b_denominator) =
        if req.multiple_mint <= req.base_mint {
            (
                req.multiple_mint,
                req.multiple_decimals,
                multiple_basis,
                req.base_mint,
                req.base_decimals,
                base_basis,
            )
        } else {
            (
                req.base_mint,
                req.base_decimals,
                base_basis,
                req.multiple_mint,
                req.multiple_decimals,
                multiple_basis,
            )
        };

    let normalized = NormalizedRatio {
        token_a_mint,
        token_a_decimals,
        token_b_mint,
        token_b_decimals,
        ratio_a_numerator,
        ratio_b_denominator,
    };
    validate_anchored_to_one(&normalized)?;
    Ok(normalized)
}

/// `N · 10^decimals`, the basis-point value of a whole-number display amount.
pub fn to_basis_points(whole_number: u64, decimals: u8) -> u64 {
    whole_number.saturating_mul(10u64.saturating_pow(decimals as u32))
}

/// Validates the "one equals 1" rule the contract enforces: exactly one side
/// must equal `10^decimals` for its own token.
pub fn validate_anchored_to_one(ratio: &NormalizedRatio) -> Result<(), RatioError> {
    let a_is_one = ratio.ratio_a_numerator == 10u64.pow(ratio.token_a_decimals as u32);
    let b_is_one = ratio.ratio_b_denominator == 10u64.pow(ratio.token_b_decimals as u32);
    if a_is_one ^ b_is_one {
        Ok(())
    } else {
        Err(RatioError::InvalidRatio)
    }
}

/// Expected output for an A→B swap: `out = floor(amount_in * ratio_b / ratio_a)`.
pub fn expected_output_a_to_b(
    amount_in: u64,
    ratio_a_numerator: u64,
    ratio_b_denominator: u64,
) -> Result<u64, RatioError> {
    checked_expected_output(amount_in, ratio_b_denominator, ratio_a_numerator)
}

/// Expected output for a B→A swap: `out = floor(amount_in * ratio_a / ratio_b)`.
pub fn expected_output_b_to_a(
    amount_in: u64,
    ratio_a_numerator: u64,
    ratio_b_denominator: u64,
) -> Result<u64, RatioError> {
    checked_expected_output(amount_in, ratio_a_numerator, ratio_b_denominator)
}

fn checked_expected_output(amount_in: u64, multiplier: u64, divisor: u64) -> Result<u64, RatioError> {
    let amount_in = amount_in as u128;
    let multiplier = multiplier as u128;
    let divisor = divisor as u128;

    let numerator = amount_in
        .checked_mul(multiplier)
        .ok_or(RatioError::ArithmeticOverflow)?;
    let result = numerator.checked_div(divisor).ok_or(RatioError::ArithmeticOverflow)?;

    if result > u64::MAX as u128 {
        return Err(RatioError::ArithmeticOverflow);
    }
    if result == 0 {
        return Err(RatioError::InsufficientInput);
    }
    Ok(result as u64)
}

/// All the program-derived addresses for a normalized pool.
#[derive(Debug, Clone)]
pub struct PoolAddresses {
    pub pool_state: Pubkey,
    pub pool_state_bump: u8,
    pub vault_a: Pubkey,
    pub vault_b: Pubkey,
    pub lp_mint_a: Pubkey,
    pub lp_mint_b: Pubkey,
    pub pool_treasury: Pubkey,
}

pub fn derive_pool_state(program_id: &Pubkey, ratio: &NormalizedRatio) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[
            POOL_STATE_SEED_PREFIX,
            ratio.token_a_mint.as_ref(),
            ratio.token_b_mint.as_ref(),
            &ratio.ratio_a_numerator.to_le_bytes(),
            &ratio.ratio_b_denominator.to_le_bytes(),
        ],
        program_id,
    )
}

pub fn derive_system_state(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SYSTEM_STATE_SEED_PREFIX], program_id)
}

pub fn derive_main_treasury(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[MAIN_TREASURY_SEED_PREFIX], program_id)
}

/// Derives every PDA for a normalized pool in one call.
pub fn derive_pool_addresses(program_id: &Pubkey, ratio: &NormalizedRatio) -> PoolAddresses {
    let (pool_state, pool_state_bump) = derive_pool_state(program_id, ratio);
    let (vault_a, _) =
        Pubkey::find_program_address(&[TOKEN_A_VAULT_SEED_PREFIX, pool_state.as_ref()], program_id);
    let (vault_b, _) =
        Pubkey::find_program_address(&[TOKEN_B_VAULT_SEED_PREFIX, pool_state.as_ref()], program_id);
    let (lp_mint_a, _) = Pubkey::find_program_address(
        &[LP_TOKEN_A_MINT_SEED_PREFIX, pool_state.as_ref()],
        program_id,
    );
    let (lp_mint_b, _) = Pubkey::find_program_address(
        &[LP_TOKEN_B_MINT_SEED_PREFIX, pool_state.as_ref()],
        program_id,
    );
    let (pool_treasury, _) =
        Pubkey::find_program_address(&[POOL_TREASURY_SEED_PREFIX, pool_state.as_ref()], program_id);

    PoolAddresses {
        pool_state,
        pool_state_bump,
        vault_a,
        vault_b,
        lp_mint_a,
        lp_mint_b,
        pool_treasury,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_id() -> Pubkey {
        Pubkey::new_unique()
    }

    #[test]
    fn swap_exact_a_to_b() {
        // 1 A = 160 B, A has 9 decimals, B has 6 decimals.
        let ratio_a = 1_000_000_000u64; // 10^9, anchors A
        let ratio_b = 160_000_000u64; // 160 * 10^6
        let out = expected_output_a_to_b(500_000_000, ratio_a, ratio_b).unwrap();
        assert_eq!(out, 80_000_000);
    }

    #[test]
    fn swap_exact_b_to_a() {
        let ratio_a = 1_000_000_000u64;
        let ratio_b = 160_000_000u64;
        let out = expected_output_b_to_a(80_000_000, ratio_a, ratio_b).unwrap();
        assert_eq!(out, 500_000_000);
    }

    #[test]
    fn swap_dust_yields_insufficient_input() {
        // 1:1 ratio, A has 9 decimals, B has 0 decimals.
        let ratio_a = 1_000_000_000u64;
        let ratio_b = 1u64;
        let err = expected_output_a_to_b(999_999, ratio_a, ratio_b).unwrap_err();
        assert_eq!(err, RatioError::InsufficientInput);
    }

    #[test]
    fn round_trip_is_monotone_non_increasing() {
        let ratio_a = 1_000_000_000u64;
        let ratio_b = 160_000_000u64;
        let x = 123_456_789u64;
        let to_b = expected_output_a_to_b(x, ratio_a, ratio_b).unwrap();
        let back_to_a = expected_output_b_to_a(to_b, ratio_a, ratio_b).unwrap();
        assert!(back_to_a <= x);
    }

    #[test]
    fn round_trip_is_exact_when_x_is_a_multiple_of_the_denominator() {
        let ratio_a = 1_000_000_000u64;
        let ratio_b = 160_000_000u64;
        // A multiple of ratio_a / gcd(ratio_a, ratio_b) round-trips exactly; 160 * ratio_a
        // lands on a clean multiple of ratio_b after the forward conversion.
        let x = ratio_a * 160;
        let to_b = expected_output_a_to_b(x, ratio_a, ratio_b).unwrap();
        let back_to_a = expected_output_b_to_a(to_b, ratio_a, ratio_b).unwrap();
        assert_eq!(back_to_a, x);
    }

    #[test]
    fn overflow_is_rejected() {
        let err = expected_output_a_to_b(u64::MAX, u64::MAX, 1).unwrap_err();
        assert_eq!(err, RatioError::ArithmeticOverflow);
    }

    #[test]
    fn pool_create_normalization_orders_tokens_canonically() {
        let mint_x = Pubkey::new_unique();
        let mint_y = Pubkey::new_unique();
        let (multiple_mint, multiple_decimals, base_mint, base_decimals) = if mint_x < mint_y {
            (mint_y, 9u8, mint_x, 6u8)
        } else {
            (mint_x, 9u8, mint_y, 6u8)
        };

        let req = RatioRequest {
            multiple_mint,
            multiple_decimals,
            base_mint,
            base_decimals,
            ratio_whole_number: 160,
            direction: RatioDirection::MultiplePerBase,
        };
        let normalized = normalize(&req).unwrap();
        assert!(normalized.token_a_mint <= normalized.token_b_mint);

        let a_is_one = normalized.ratio_a_numerator == 10u64.pow(normalized.token_a_decimals as u32);
        let b_is_one = normalized.ratio_b_denominator == 10u64.pow(normalized.token_b_decimals as u32);
        assert!(a_is_one ^ b_is_one);
    }

    #[test]
    fn pda_derivation_is_deterministic() {
        let req = RatioRequest {
            multiple_mint: Pubkey::new_unique(),
            multiple_decimals: 6,
            base_mint: Pubkey::new_unique(),
            base_decimals: 9,
            ratio_whole_number: 160,
            direction: RatioDirection::MultiplePerBase,
        };
        let normalized = normalize(&req).unwrap();
        let program_id = program_id();
        let a = derive_pool_addresses(&program_id, &normalized);
        let b = derive_pool_addresses(&program_id, &normalized);
        assert_eq!(a.pool_state, b.pool_state);
        assert_eq!(a.vault_a, b.vault_a);
    }
}
