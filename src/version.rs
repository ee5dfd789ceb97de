//! `GetVersion` bootstrap check (component C10, `spec.md` §4.10).
//!
//! Issued once on `Start`. A failure here is logged at `Warning` and
//! recorded, but never stops the engine from starting — the stress run
//! doesn't depend on knowing the contract's version, only on using it
//! consistently.

use log::warn;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;

use crate::rpc_gateway::{GatewayError, RpcGateway};

const GET_VERSION_DISCRIMINANT: u8 = 14;

pub fn get_version_instruction(program_id: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![],
        data: vec![GET_VERSION_DISCRIMINANT],
    }
}

/// The outcome of the version probe, kept for `Health`/log inspection.
#[derive(Debug, Clone)]
pub struct VersionProbe {
    pub succeeded: bool,
    pub logs: Vec<String>,
}

/// Simulates the `GetVersion` instruction and returns what the logs say.
/// Never returns `Err` to the caller — a probe failure degrades to a
/// `VersionProbe { succeeded: false, .. }` so `Start` can continue.
pub async fn probe_version(
    gateway: &RpcGateway,
    cancel: &CancellationToken,
    program_id: &Pubkey,
    payer: &Pubkey,
) -> VersionProbe {
    let instruction = get_version_instruction(program_id);
    let blockhash = match gateway.get_latest_blockhash(cancel).await {
        Ok(hash) => hash,
        Err(e) => {
            warn!("GetVersion probe could not fetch a blockhash: {e}");
            return VersionProbe {
                succeeded: false,
                logs: Vec::new(),
            };
        }
    };

    let tx = solana_sdk::transaction::Transaction::new_with_payer(&[instruction], Some(payer));
    let mut tx = tx;
    tx.message.recent_blockhash = blockhash;

    match gateway.simulate(cancel, &tx).await {
        Ok(report) if report.error.is_none() => VersionProbe {
            succeeded: true,
            logs: report.logs,
        },
        Ok(report) => {
            warn!("GetVersion probe failed: {:?}", report.error);
            VersionProbe {
                succeeded: false,
                logs: report.logs,
            }
        }
        Err(GatewayError::Cancelled) => VersionProbe {
            succeeded: false,
            logs: Vec::new(),
        },
        Err(e) => {
            warn!("GetVersion probe errored: {e}");
            VersionProbe {
                succeeded: false,
                logs: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_instruction_has_no_accounts_and_the_right_discriminant() {
        let program_id = Pubkey::new_unique();
        let ix = get_version_instruction(&program_id);
        assert!(ix.accounts.is_empty());
        assert_eq!(ix.data, vec![GET_VERSION_DISCRIMINANT]);
    }
}
