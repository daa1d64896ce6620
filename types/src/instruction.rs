//! Instructions accepted by the table program.

use crate::{
    address::{Address, AddressError},
    constants::{DEFAULT_TEMPLATE, SYSTEM_PROGRAM_ID},
    derive::Deriver,
};
use bytes::BufMut;
use commonware_codec::Write;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A target token balance for one player vault in a redistribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub player_vault: Address,
    pub tokens: u64,
}

/// A mutating action the console can submit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    InitializeTreasury,
    InitializeTemplate,
    FundVault {
        amount: u64,
    },
    WithdrawVault {
        amount: u64,
    },
    OpenTable,
    JoinTable {
        table_id: u64,
    },
    DepositToTable {
        table_id: u64,
        amount: u64,
    },
    LeaveTable {
        table_id: u64,
    },
    CollectRent {
        table_id: u64,
    },
    RedistributeTokens {
        table_id: u64,
        balances: Vec<TokenBalance>,
    },
    KickOccupant {
        table_id: u64,
        player_vault: Address,
    },
    WithdrawTreasury {
        amount: u64,
        destination: Address,
    },
}

impl Operation {
    /// Program instruction name.
    pub const fn name(&self) -> &'static str {
        match self {
            Operation::InitializeTreasury => "initialize_house",
            Operation::InitializeTemplate => "initialize_challenger_template",
            Operation::FundVault { .. } => "deposit_sol",
            Operation::WithdrawVault { .. } => "withdraw_sol",
            Operation::OpenTable => "open_challenger_table",
            Operation::JoinTable { .. } => "join_game",
            Operation::DepositToTable { .. } => "deposit_to_game",
            Operation::LeaveTable { .. } => "leave_table",
            Operation::CollectRent { .. } => "collect_rent",
            Operation::RedistributeTokens { .. } => "redistribute_tokens",
            Operation::KickOccupant { .. } => "kick_out_player",
            Operation::WithdrawTreasury { .. } => "withdraw_from_house",
        }
    }

    pub const fn discriminator(&self) -> [u8; 8] {
        match self {
            Operation::InitializeTreasury => [180, 46, 86, 125, 135, 107, 214, 28],
            Operation::InitializeTemplate => [158, 156, 53, 156, 21, 111, 141, 196],
            Operation::FundVault { .. } => [108, 81, 78, 117, 125, 155, 56, 200],
            Operation::WithdrawVault { .. } => [145, 131, 74, 136, 65, 137, 42, 38],
            Operation::OpenTable => [116, 219, 229, 244, 123, 65, 94, 105],
            Operation::JoinTable { .. } => [107, 112, 18, 38, 56, 173, 60, 128],
            Operation::DepositToTable { .. } => [250, 164, 120, 131, 56, 191, 133, 137],
            Operation::LeaveTable { .. } => [163, 153, 94, 194, 19, 106, 113, 32],
            Operation::CollectRent { .. } => [52, 165, 96, 165, 131, 15, 160, 36],
            Operation::RedistributeTokens { .. } => [198, 34, 62, 25, 253, 46, 197, 223],
            Operation::KickOccupant { .. } => [126, 145, 6, 66, 86, 89, 44, 169],
            Operation::WithdrawTreasury { .. } => [166, 199, 13, 102, 212, 193, 155, 28],
        }
    }

    /// Operations only the treasury authority may submit.
    pub const fn requires_authority(&self) -> bool {
        matches!(
            self,
            Operation::CollectRent { .. }
                | Operation::RedistributeTokens { .. }
                | Operation::KickOccupant { .. }
                | Operation::WithdrawTreasury { .. }
        )
    }

    /// Table the operation targets, if any. Opening a table targets the id assigned at submit time.
    pub const fn table_id(&self) -> Option<u64> {
        match self {
            Operation::JoinTable { table_id }
            | Operation::DepositToTable { table_id, .. }
            | Operation::LeaveTable { table_id }
            | Operation::CollectRent { table_id }
            | Operation::RedistributeTokens { table_id, .. }
            | Operation::KickOccupant { table_id, .. } => Some(*table_id),
            _ => None,
        }
    }

    /// Instruction data: discriminator followed by little-endian arguments.
    pub fn data(&self) -> Vec<u8> {
        let mut data = self.discriminator().to_vec();
        match self {
            Operation::InitializeTreasury
            | Operation::InitializeTemplate
            | Operation::OpenTable
            | Operation::LeaveTable { .. }
            | Operation::CollectRent { .. } => {}
            Operation::FundVault { amount }
            | Operation::WithdrawVault { amount }
            | Operation::DepositToTable { amount, .. }
            | Operation::WithdrawTreasury { amount, .. } => data.put_u64_le(*amount),
            Operation::JoinTable { table_id } => data.put_u64_le(*table_id),
            Operation::RedistributeTokens { balances, .. } => {
                data.put_u32_le(balances.len() as u32);
                for balance in balances {
                    balance.player_vault.write(&mut data);
                    data.put_u64_le(balance.tokens);
                }
            }
            Operation::KickOccupant { player_vault, .. } => player_vault.write(&mut data),
        }
        data
    }

    /// Build the instruction with its ordered account list.
    pub fn instruction(
        &self,
        deriver: &Deriver,
        context: &AccountContext,
    ) -> Result<Instruction, AddressError> {
        let signer = context.signer;
        let treasury = deriver.treasury()?;
        let accounts = match self {
            Operation::InitializeTreasury => vec![
                AccountMeta::writable(treasury),
                AccountMeta::signer(signer),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            ],
            Operation::InitializeTemplate => vec![
                AccountMeta::writable(deriver.template(DEFAULT_TEMPLATE)?),
                AccountMeta::signer(signer),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            ],
            Operation::FundVault { .. } | Operation::WithdrawVault { .. } => vec![
                AccountMeta::writable(deriver.player_vault(&signer)?),
                AccountMeta::signer(signer),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            ],
            Operation::OpenTable => {
                let table_id = context.next_table_id;
                vec![
                    AccountMeta::writable(deriver.table_counter()?),
                    AccountMeta::readonly(deriver.template(DEFAULT_TEMPLATE)?),
                    AccountMeta::writable(deriver.table_vault(table_id)?),
                    AccountMeta::writable(deriver.dealer(table_id)?),
                    AccountMeta::writable(deriver.player_vault(&signer)?),
                    AccountMeta::writable(treasury),
                    AccountMeta::signer(signer),
                    AccountMeta::readonly(SYSTEM_PROGRAM_ID),
                ]
            }
            Operation::JoinTable { table_id } => vec![
                AccountMeta::writable(deriver.table_vault(*table_id)?),
                AccountMeta::writable(deriver.player_vault(&signer)?),
                AccountMeta::readonly(treasury),
                AccountMeta::signer(signer),
            ],
            Operation::DepositToTable { table_id, .. } | Operation::LeaveTable { table_id } => {
                vec![
                    AccountMeta::writable(deriver.table_vault(*table_id)?),
                    AccountMeta::writable(deriver.dealer(*table_id)?),
                    AccountMeta::writable(deriver.player_vault(&signer)?),
                    AccountMeta::writable(treasury),
                    AccountMeta::signer(signer),
                    AccountMeta::readonly(SYSTEM_PROGRAM_ID),
                ]
            }
            Operation::CollectRent { table_id } => vec![
                AccountMeta::writable(deriver.table_vault(*table_id)?),
                AccountMeta::writable(deriver.dealer(*table_id)?),
                AccountMeta::writable(treasury),
                AccountMeta::signer(signer),
            ],
            Operation::RedistributeTokens { table_id, .. } => vec![
                AccountMeta::writable(deriver.dealer(*table_id)?),
                AccountMeta::readonly(deriver.table_vault(*table_id)?),
                AccountMeta::readonly(treasury),
                AccountMeta::readonly_signer(signer),
            ],
            Operation::KickOccupant {
                table_id,
                player_vault,
            } => vec![
                AccountMeta::writable(deriver.dealer(*table_id)?),
                AccountMeta::writable(deriver.table_vault(*table_id)?),
                AccountMeta::writable(*player_vault),
                AccountMeta::readonly(treasury),
                AccountMeta::readonly_signer(signer),
            ],
            Operation::WithdrawTreasury { destination, .. } => vec![
                AccountMeta::writable(treasury),
                AccountMeta::signer(signer),
                AccountMeta::writable(*destination),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            ],
        };
        Ok(Instruction {
            program_id: *deriver.program_id(),
            name: self.name(),
            accounts,
            data: self.data(),
        })
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::InitializeTreasury => write!(f, "initialize treasury"),
            Operation::InitializeTemplate => write!(f, "initialize {DEFAULT_TEMPLATE} template"),
            Operation::FundVault { amount } => write!(f, "fund vault with {amount}"),
            Operation::WithdrawVault { amount } => write!(f, "withdraw {amount} from vault"),
            Operation::OpenTable => write!(f, "open table"),
            Operation::JoinTable { table_id } => write!(f, "join table {table_id}"),
            Operation::DepositToTable { table_id, amount } => {
                write!(f, "deposit {amount} to table {table_id}")
            }
            Operation::LeaveTable { table_id } => write!(f, "leave table {table_id}"),
            Operation::CollectRent { table_id } => write!(f, "collect rent from table {table_id}"),
            Operation::RedistributeTokens { table_id, balances } => write!(
                f,
                "redistribute tokens at table {table_id} ({} entries)",
                balances.len()
            ),
            Operation::KickOccupant {
                table_id,
                player_vault,
            } => write!(f, "kick {player_vault} from table {table_id}"),
            Operation::WithdrawTreasury {
                amount,
                destination,
            } => write!(f, "withdraw {amount} from treasury to {destination}"),
        }
    }
}

/// Submit-time inputs that are not part of the operation itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountContext {
    /// Connected identity signing the instruction.
    pub signer: Address,
    /// Current table counter value (0 when the counter does not exist yet).
    pub next_table_id: u64,
}

impl AccountContext {
    pub const fn new(signer: Address) -> Self {
        Self {
            signer,
            next_table_id: 0,
        }
    }

    pub const fn with_next_table_id(mut self, next_table_id: u64) -> Self {
        self.next_table_id = next_table_id;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub const fn writable(address: Address) -> Self {
        Self {
            address,
            is_signer: false,
            is_writable: true,
        }
    }

    pub const fn readonly(address: Address) -> Self {
        Self {
            address,
            is_signer: false,
            is_writable: false,
        }
    }

    /// Writable signer (pays fees or rent).
    pub const fn signer(address: Address) -> Self {
        Self {
            address,
            is_signer: true,
            is_writable: true,
        }
    }

    pub const fn readonly_signer(address: Address) -> Self {
        Self {
            address,
            is_signer: true,
            is_writable: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Address,
    pub name: &'static str,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Address {
        Address::new([8u8; 32])
    }

    #[test]
    fn test_open_table_uses_counter_value() {
        let deriver = Deriver::default();
        let context = AccountContext::new(signer()).with_next_table_id(1);
        let ix = Operation::OpenTable.instruction(&deriver, &context).unwrap();
        assert_eq!(ix.name, "open_challenger_table");
        assert_eq!(ix.data, vec![116, 219, 229, 244, 123, 65, 94, 105]);
        assert_eq!(ix.accounts.len(), 8);
        assert_eq!(
            ix.accounts[2].address.to_string(),
            "HtBCxAjerF6t8S9xPtz1zJnSFgPCVmtRd4MRqeGrcrxG"
        );
        assert_eq!(ix.accounts[3].address, deriver.dealer(1).unwrap());
        assert!(!ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[6], AccountMeta::signer(signer()));
        assert_eq!(ix.accounts[7].address, SYSTEM_PROGRAM_ID);
    }

    #[test]
    fn test_amount_arguments_are_little_endian() {
        let data = Operation::FundVault {
            amount: 120_000_000,
        }
        .data();
        assert_eq!(&data[..8], &[108, 81, 78, 117, 125, 155, 56, 200]);
        assert_eq!(&data[8..], &120_000_000u64.to_le_bytes());

        let data = Operation::JoinTable { table_id: 3 }.data();
        assert_eq!(data.len(), 16);
        assert_eq!(&data[8..], &3u64.to_le_bytes());

        assert_eq!(Operation::LeaveTable { table_id: 3 }.data().len(), 8);
    }

    #[test]
    fn test_redistribute_encoding() {
        let balances = vec![
            TokenBalance {
                player_vault: Address::new([1u8; 32]),
                tokens: 500,
            },
            TokenBalance {
                player_vault: Address::new([2u8; 32]),
                tokens: 1_500,
            },
        ];
        let op = Operation::RedistributeTokens {
            table_id: 0,
            balances,
        };
        let data = op.data();
        assert_eq!(data.len(), 8 + 4 + 2 * 40);
        assert_eq!(&data[8..12], &2u32.to_le_bytes());
        assert_eq!(&data[12..44], &[1u8; 32]);
        assert_eq!(&data[44..52], &500u64.to_le_bytes());

        let ix = op
            .instruction(&Deriver::default(), &AccountContext::new(signer()))
            .unwrap();
        assert_eq!(ix.accounts.len(), 4);
        assert_eq!(ix.accounts[3], AccountMeta::readonly_signer(signer()));
    }

    #[test]
    fn test_kick_passes_seat_vault() {
        let occupant = Address::new([5u8; 32]);
        let op = Operation::KickOccupant {
            table_id: 2,
            player_vault: occupant,
        };
        assert_eq!(&op.data()[8..], occupant.as_ref());
        let ix = op
            .instruction(&Deriver::default(), &AccountContext::new(signer()))
            .unwrap();
        assert_eq!(ix.accounts[2], AccountMeta::writable(occupant));
    }

    #[test]
    fn test_player_operations_use_signer_vault() {
        let deriver = Deriver::default();
        let vault = deriver.player_vault(&signer()).unwrap();
        for op in [
            Operation::WithdrawVault { amount: 1 },
            Operation::DepositToTable {
                table_id: 0,
                amount: 1,
            },
            Operation::JoinTable { table_id: 0 },
        ] {
            let ix = op
                .instruction(&deriver, &AccountContext::new(signer()))
                .unwrap();
            assert!(
                ix.accounts
                    .iter()
                    .any(|meta| meta.address == vault && meta.is_writable),
                "{op} should write the signer's vault"
            );
        }
    }

    #[test]
    fn test_authority_operations() {
        assert!(Operation::CollectRent { table_id: 0 }.requires_authority());
        assert!(Operation::WithdrawTreasury {
            amount: 1,
            destination: signer()
        }
        .requires_authority());
        assert!(!Operation::OpenTable.requires_authority());
        assert!(!Operation::JoinTable { table_id: 0 }.requires_authority());
        assert_eq!(Operation::OpenTable.table_id(), None);
        assert_eq!(Operation::LeaveTable { table_id: 9 }.table_id(), Some(9));
    }
}
