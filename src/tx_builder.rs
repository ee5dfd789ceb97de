//! Builds signed, ready-to-send transactions for every contract instruction
//! this orchestrator drives (component C4, `spec.md` §4.4).
//!
//! Account orderings below are lifted from the contract's own
//! `client_sdk.rs` helpers (`create_pool_instruction`, `deposit_instruction`,
//! `withdraw_instruction`, `swap_instruction`); instruction payloads are
//! packed by hand (discriminator byte followed by LE-encoded fields) rather
//! than through a Borsh enum, since the target discriminators are pinned
//! values rather than enum-variant ordinals.

use solana_program::{system_program, sysvar};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::compute_budget::{compute_budget_instruction, OperationKind};
use crate::ratio::{NormalizedRatio, PoolAddresses};
use crate::types::TokenSide;

const DISCRIMINANT_TREASURY_INIT: u8 = 0;
const DISCRIMINANT_POOL_CREATE: u8 = 1;
const DISCRIMINANT_DEPOSIT: u8 = 6;
/// Not given an explicit number in the instruction catalogue; assigned the next
/// free slot after `Deposit`.
const DISCRIMINANT_WITHDRAW: u8 = 7;
/// Likewise unassigned upstream; placed after `Withdraw`.
const DISCRIMINANT_SWAP: u8 = 8;

/// Builds a fully-signed [`Transaction`], with the compute-budget instruction
/// prepended, ready to hand to the `RpcGateway`.
pub fn build_signed_transaction(
    op: OperationKind,
    instructions: &[Instruction],
    payer: &Keypair,
    extra_signers: &[&Keypair],
    recent_blockhash: Hash,
) -> Transaction {
    let mut all_ixs = Vec::with_capacity(instructions.len() + 1);
    all_ixs.push(compute_budget_instruction(op));
    all_ixs.extend_from_slice(instructions);

    let mut signers: Vec<&Keypair> = vec![payer];
    signers.extend_from_slice(extra_signers);

    Transaction::new_signed_with_payer(&all_ixs, Some(&payer.pubkey()), &signers, recent_blockhash)
}

/// `TreasuryInit` (discriminator 0): idempotent, one-time system bootstrap.
pub fn treasury_init_instruction(
    program_id: &Pubkey,
    authority: &Pubkey,
    system_state: &Pubkey,
    main_treasury: &Pubkey,
    program_data_account: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new(*system_state, false),
            AccountMeta::new(*main_treasury, false),
            AccountMeta::new_readonly(*program_data_account, false),
        ],
        data: vec![DISCRIMINANT_TREASURY_INIT],
    }
}

/// `PoolCreate` (discriminator 1): 17-byte payload — discriminator, then the
/// two LE `u64` ratio sides in canonical A/B order (the anchored side is
/// implicit in which of the two equals `10^decimals`, so no separate
/// direction byte is needed).
pub fn pool_create_instruction(
    program_id: &Pubkey,
    payer: &Pubkey,
    ratio: &NormalizedRatio,
    addresses: &PoolAddresses,
) -> Instruction {
    let mut data = Vec::with_capacity(17);
    data.push(DISCRIMINANT_POOL_CREATE);
    data.extend_from_slice(&ratio.ratio_a_numerator.to_le_bytes());
    data.extend_from_slice(&ratio.ratio_b_denominator.to_le_bytes());
    debug_assert_eq!(data.len(), 17);

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(addresses.pool_state, false),
            AccountMeta::new_readonly(ratio.token_a_mint, false),
            AccountMeta::new_readonly(ratio.token_b_mint, false),
            AccountMeta::new(addresses.lp_mint_a, false),
            AccountMeta::new(addresses.lp_mint_b, false),
            AccountMeta::new(addresses.vault_a, false),
            AccountMeta::new(addresses.vault_b, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data,
    }
}

/// `Deposit` (discriminator 6): 12-account layout, data is the `u64` basis-point amount.
#[allow(clippy::too_many_arguments)]
pub fn deposit_instruction(
    program_id: &Pubkey,
    payer: &Pubkey,
    system_state: &Pubkey,
    ratio: &NormalizedRatio,
    addresses: &PoolAddresses,
    token_side: TokenSide,
    user_token_account: &Pubkey,
    user_lp_account: &Pubkey,
    main_treasury: &Pubkey,
    amount: u64,
) -> Instruction {
    let (deposit_mint, vault, lp_mint) = match token_side {
        TokenSide::A => (ratio.token_a_mint, addresses.vault_a, addresses.lp_mint_a),
        TokenSide::B => (ratio.token_b_mint, addresses.vault_b, addresses.lp_mint_b),
    };

    let mut data = Vec::with_capacity(9);
    data.push(DISCRIMINANT_DEPOSIT);
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(*system_state, false),
            AccountMeta::new_readonly(addresses.pool_state, false),
            AccountMeta::new_readonly(deposit_mint, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*user_token_account, false),
            AccountMeta::new(lp_mint, false),
            AccountMeta::new(*user_lp_account, false),
            AccountMeta::new(*main_treasury, false),
            AccountMeta::new(addresses.pool_treasury, false),
        ],
        data,
    }
}

/// `Withdraw` (discriminator 7): analogous 12-account layout; data is the
/// `u64` amount of LP tokens to burn.
#[allow(clippy::too_many_arguments)]
pub fn withdraw_instruction(
    program_id: &Pubkey,
    payer: &Pubkey,
    system_state: &Pubkey,
    ratio: &NormalizedRatio,
    addresses: &PoolAddresses,
    token_side: TokenSide,
    user_lp_account: &Pubkey,
    user_destination_account: &Pubkey,
    main_treasury: &Pubkey,
    lp_tokens_to_burn: u64,
) -> Instruction {
    let (withdraw_mint, vault, lp_mint) = match token_side {
        TokenSide::A => (ratio.token_a_mint, addresses.vault_a, addresses.lp_mint_a),
        TokenSide::B => (ratio.token_b_mint, addresses.vault_b, addresses.lp_mint_b),
    };

    let mut data = Vec::with_capacity(9);
    data.push(DISCRIMINANT_WITHDRAW);
    data.extend_from_slice(&lp_tokens_to_burn.to_le_bytes());

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(*system_state, false),
            AccountMeta::new_readonly(addresses.pool_state, false),
            AccountMeta::new_readonly(withdraw_mint, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*user_destination_account, false),
            AccountMeta::new(lp_mint, false),
            AccountMeta::new(*user_lp_account, false),
            AccountMeta::new(*main_treasury, false),
            AccountMeta::new(addresses.pool_treasury, false),
        ],
        data,
    }
}

/// `Swap` (discriminator 8): 11 accounts, data = `(u64 input, u64 expectedMinimumOutput)`.
/// The caller must have computed `expected_output` via [`crate::ratio`] and pass it
/// exactly; the contract rejects any deviation with `AMOUNT_MISMATCH` (0x417).
#[allow(clippy::too_many_arguments)]
pub fn swap_instruction(
    program_id: &Pubkey,
    payer: &Pubkey,
    system_state: &Pubkey,
    ratio: &NormalizedRatio,
    addresses: &PoolAddresses,
    input_side: TokenSide,
    user_input_account: &Pubkey,
    user_output_account: &Pubkey,
    amount_in: u64,
    expected_output: u64,
) -> Instruction {
    let mut data = Vec::with_capacity(17);
    data.push(DISCRIMINANT_SWAP);
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&expected_output.to_le_bytes());

    let _ = input_side; // vault/mint ordering is fixed; direction is implied by which token account is "input"

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*user_input_account, false),
            AccountMeta::new(*user_output_account, false),
            AccountMeta::new_readonly(*system_state, false),
            AccountMeta::new(addresses.pool_state, false),
            AccountMeta::new_readonly(ratio.token_a_mint, false),
            AccountMeta::new_readonly(ratio.token_b_mint, false),
            AccountMeta::new(addresses.vault_a, false),
            AccountMeta::new(addresses.vault_b, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data,
    }
}

/// Creates a brand-new SPL mint, funding rent from `payer`.
pub fn create_mint_instructions(
    payer: &Pubkey,
    mint: &Pubkey,
    mint_authority: &Pubkey,
    decimals: u8,
    rent_lamports: u64,
) -> Vec<Instruction> {
    vec![
        solana_sdk::system_instruction::create_account(
            payer,
            mint,
            rent_lamports,
            spl_token::state::Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint(&spl_token::id(), mint, mint_authority, None, decimals)
            .expect("initialize_mint args are always well-formed"),
    ]
}

/// Creates the associated token account for `owner` on `mint`, idempotently.
pub fn create_associated_token_account_instruction(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        payer,
        owner,
        mint,
        &spl_token::id(),
    )
}

pub fn mint_to_instruction(
    mint: &Pubkey,
    destination: &Pubkey,
    mint_authority: &Pubkey,
    amount: u64,
) -> Instruction {
    spl_token::instruction::mint_to(&spl_token::id(), mint, destination, mint_authority, &[], amount)
        .expect("mint_to args are always well-formed")
}

pub fn transfer_instruction(
    source: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Instruction {
    spl_token::instruction::transfer(&spl_token::id(), source, destination, authority, &[], amount)
        .expect("transfer args are always well-formed")
}

/// Simulated burn for the `Empty` command: rather than calling `burn` (which
/// would shrink total supply and complicate accounting across a stress run),
/// sink the tokens into `sink_account`, a dedicated account this process owns
/// that is never read from again.
pub fn burn_to_sink_instruction(
    source: &Pubkey,
    sink_account: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Instruction {
    transfer_instruction(source, sink_account, authority, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::pubkey::Pubkey;

    fn dummy_ratio() -> NormalizedRatio {
        let (a, b) = {
            let x = Pubkey::new_unique();
            let y = Pubkey::new_unique();
            if x <= y { (x, y) } else { (y, x) }
        };
        NormalizedRatio {
            token_a_mint: a,
            token_a_decimals: 9,
            token_b_mint: b,
            token_b_decimals: 6,
            ratio_a_numerator: 1_000_000_000,
            ratio_b_denominator: 160_000_000,
        }
    }

    fn dummy_addresses(ratio: &NormalizedRatio) -> PoolAddresses {
        crate::ratio::derive_pool_addresses(&Pubkey::new_unique(), ratio)
    }

    #[test]
    fn pool_create_payload_is_seventeen_bytes_with_correct_discriminator() {
        let program_id = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let ratio = dummy_ratio();
        let addresses = dummy_addresses(&ratio);
        let ix = pool_create_instruction(&program_id, &payer, &ratio, &addresses);
        assert_eq!(ix.data.len(), 17);
        assert_eq!(ix.data[0], DISCRIMINANT_POOL_CREATE);
    }

    #[test]
    fn deposit_payload_carries_the_discriminator_and_amount() {
        let program_id = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let system_state = Pubkey::new_unique();
        let ratio = dummy_ratio();
        let addresses = dummy_addresses(&ratio);
        let user_token = Pubkey::new_unique();
        let user_lp = Pubkey::new_unique();
        let main_treasury = Pubkey::new_unique();

        let ix = deposit_instruction(
            &program_id,
            &payer,
            &system_state,
            &ratio,
            &addresses,
            TokenSide::A,
            &user_token,
            &user_lp,
            &main_treasury,
            42_000,
        );
        assert_eq!(ix.data[0], DISCRIMINANT_DEPOSIT);
        assert_eq!(&ix.data[1..9], &42_000u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 12);
    }

    #[test]
    fn swap_payload_carries_input_and_expected_output() {
        let program_id = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let system_state = Pubkey::new_unique();
        let ratio = dummy_ratio();
        let addresses = dummy_addresses(&ratio);
        let user_in = Pubkey::new_unique();
        let user_out = Pubkey::new_unique();

        let ix = swap_instruction(
            &program_id,
            &payer,
            &system_state,
            &ratio,
            &addresses,
            TokenSide::A,
            &user_in,
            &user_out,
            1_000,
            160,
        );
        assert_eq!(ix.data[0], DISCRIMINANT_SWAP);
        assert_eq!(&ix.data[1..9], &1_000u64.to_le_bytes());
        assert_eq!(&ix.data[9..17], &160u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 11);
    }
}
