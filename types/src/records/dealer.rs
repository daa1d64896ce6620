use super::{codec::*, Record};
use crate::{address::Address, constants::MAX_SEATS, derive::RecordKind};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

/// Game tokens held by one player vault at a table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenEntry {
    pub player_vault: Option<Address>,
    pub tokens: u64,
}

impl Write for TokenEntry {
    fn write(&self, writer: &mut impl BufMut) {
        write_option(&self.player_vault, writer, |address, w| address.write(w));
        writer.put_u64_le(self.tokens);
    }
}

impl Read for TokenEntry {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            player_vault: read_option(reader, |r| Address::read(r))?,
            tokens: read_u64_le(reader)?,
        })
    }
}

impl EncodeSize for TokenEntry {
    fn encode_size(&self) -> usize {
        option_encode_size(&self.player_vault, Address::encode_size) + 8
    }
}

/// Per-table ledger of game tokens, one entry per seat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dealer {
    pub table_id: u64,
    pub authority: Address,
    pub players_tokens: [TokenEntry; MAX_SEATS],
    pub total_tokens_issued: u64,
    pub bump: u8,
}

impl Dealer {
    /// Entries naming a player vault, with their slot index.
    pub fn entries(&self) -> impl Iterator<Item = (usize, Address, u64)> + '_ {
        self.players_tokens
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.player_vault.map(|vault| (slot, vault, entry.tokens)))
    }

    pub fn tokens_of(&self, player_vault: &Address) -> Option<u64> {
        self.entries()
            .find(|(_, vault, _)| vault == player_vault)
            .map(|(_, _, tokens)| tokens)
    }

    /// Sum of all entry balances (widened so a corrupt record cannot overflow).
    pub fn token_sum(&self) -> u128 {
        self.players_tokens
            .iter()
            .map(|entry| u128::from(entry.tokens))
            .sum()
    }

    /// Whether the entries account for exactly the tokens issued.
    pub fn is_balanced(&self) -> bool {
        self.token_sum() == u128::from(self.total_tokens_issued)
    }
}

impl Record for Dealer {
    const KIND: RecordKind = RecordKind::Dealer;
}

impl Write for Dealer {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_u64_le(self.table_id);
        self.authority.write(writer);
        for entry in &self.players_tokens {
            entry.write(writer);
        }
        writer.put_u64_le(self.total_tokens_issued);
        writer.put_u8(self.bump);
    }
}

impl Read for Dealer {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let table_id = read_u64_le(reader)?;
        let authority = Address::read(reader)?;
        let mut players_tokens = [TokenEntry::default(); MAX_SEATS];
        for entry in players_tokens.iter_mut() {
            *entry = TokenEntry::read(reader)?;
        }
        Ok(Self {
            table_id,
            authority,
            players_tokens,
            total_tokens_issued: read_u64_le(reader)?,
            bump: read_u8(reader)?,
        })
    }
}

impl EncodeSize for Dealer {
    fn encode_size(&self) -> usize {
        8 + self.authority.encode_size()
            + self
                .players_tokens
                .iter()
                .map(|entry| entry.encode_size())
                .sum::<usize>()
            + 8
            + 1
    }
}
