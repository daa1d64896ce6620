//! Ledger-side domain for the tableside console.
//!
//! Everything here is pure: the [Address] type and program-derived address math, the
//! [Deriver] that maps a [RecordKey] to its canonical address, the fixed-layout record codecs,
//! the instruction builder for every console [Operation], and the program's error table.

pub mod address;
pub mod constants;
pub mod derive;
pub mod instruction;
pub mod program_error;
pub mod records;

pub use address::{Address, AddressError};
pub use constants::*;
pub use derive::{Deriver, RecordKey, RecordKind};
pub use instruction::{AccountContext, AccountMeta, Instruction, Operation, TokenBalance};
pub use program_error::ProgramError;
pub use records::{
    decode_record, encode_record, Dealer, PlayerVault, Record, RecordError, TableCounter,
    TableVault, Template, TokenEntry, Treasury,
};
