//! Fast-fail checks run against the latest published snapshot before signing.
//!
//! Amount floors and argument shapes are checked outright. Of the checks that read ledger state,
//! only the table buy-in cap and a full table are applied, plus the treasury authority, which
//! never changes once the house exists. Everything else (seating, balances, emptiness, tokens
//! held) may have moved since the snapshot was taken and is left to the program.

use crate::{snapshot::Snapshot, Error, Result};
use serde::Serialize;
use tableside_types::{
    tokens_to_native, Address, Operation, ProgramError, MAX_REDISTRIBUTION_ENTRIES,
    MIN_TABLE_BUY_IN, MIN_VAULT_DEPOSIT,
};

/// Why an operation was refused locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    AuthorityRequired,
    /// The buy-in cap rules the deposit out.
    InsufficientFunds,
    /// Any other program rule.
    Rule,
}

fn reject(rejection: Rejection, error: ProgramError) -> Error {
    Error::Precheck {
        rejection,
        message: error.message().to_string(),
    }
}

fn reject_zero(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(Error::Precheck {
            rejection: Rejection::Rule,
            message: "Amount must be greater than zero".to_string(),
        });
    }
    Ok(())
}

/// Check `operation` from `identity` against `snapshot`.
pub fn check(operation: &Operation, identity: &Address, snapshot: &Snapshot) -> Result<()> {
    if operation.requires_authority() && snapshot.is_authority(identity) == Some(false) {
        return Err(reject(Rejection::AuthorityRequired, ProgramError::Unauthorized));
    }

    match operation {
        Operation::InitializeTreasury
        | Operation::InitializeTemplate
        | Operation::OpenTable
        | Operation::LeaveTable { .. }
        | Operation::CollectRent { .. }
        | Operation::KickOccupant { .. } => {}
        Operation::FundVault { amount } => {
            if *amount == 0 {
                return Err(reject(Rejection::Rule, ProgramError::InvalidDepositAmount));
            }
            if *amount < MIN_VAULT_DEPOSIT {
                return Err(reject(Rejection::Rule, ProgramError::MinimumDepositNotMet));
            }
        }
        Operation::WithdrawVault { amount } | Operation::WithdrawTreasury { amount, .. } => {
            reject_zero(*amount)?;
        }
        Operation::JoinTable { table_id } => {
            if snapshot.table(*table_id).is_some_and(|table| table.is_full()) {
                return Err(reject(Rejection::Rule, ProgramError::TableFull));
            }
        }
        Operation::DepositToTable { table_id, amount } => {
            reject_zero(*amount)?;
            if *amount < MIN_TABLE_BUY_IN {
                return Err(reject(Rejection::Rule, ProgramError::InvalidBuyInAmount));
            }
            if let (Some(table), Some(dealer)) =
                (snapshot.table(*table_id), snapshot.dealer(*table_id))
            {
                // A snapshot taken for someone else says nothing about this caller's tokens.
                let own_snapshot =
                    snapshot.is_loaded() && snapshot.identity.as_ref() == Some(identity);
                // A seat without a dealer entry has bought in nothing yet.
                let tokens = snapshot
                    .vault_address
                    .filter(|_| own_snapshot)
                    .and_then(|vault| dealer.tokens_of(&vault))
                    .unwrap_or(0);
                let committed = tokens_to_native(tokens);
                if committed.saturating_add(*amount) > table.max_buy_in {
                    return Err(reject(
                        Rejection::InsufficientFunds,
                        ProgramError::ExceedsMaxBuyIn,
                    ));
                }
            }
        }
        Operation::RedistributeTokens { balances, .. } => {
            if balances.is_empty() {
                return Err(reject(Rejection::Rule, ProgramError::InvalidTokenAmount));
            }
            if balances.len() > MAX_REDISTRIBUTION_ENTRIES {
                return Err(reject(Rejection::Rule, ProgramError::TooManyPlayers));
            }
        }
    }
    Ok(())
}
