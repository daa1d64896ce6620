use super::{codec::*, Record};
use crate::{
    address::Address,
    constants::{MAX_SEATS, MAX_TEMPLATE_NAME_LENGTH},
    derive::RecordKind,
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

/// Monotonic source of table ids. The next table opened receives `count`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableCounter {
    pub count: u64,
    pub bump: u8,
}

impl Record for TableCounter {
    const KIND: RecordKind = RecordKind::TableCounter;
}

impl Write for TableCounter {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_u64_le(self.count);
        writer.put_u8(self.bump);
    }
}

impl Read for TableCounter {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            count: read_u64_le(reader)?,
            bump: read_u8(reader)?,
        })
    }
}

impl EncodeSize for TableCounter {
    fn encode_size(&self) -> usize {
        8 + 1
    }
}

/// An open table: parameters copied from its template plus seven seats holding player vault
/// addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableVault {
    pub table_id: u64,
    pub owner: Address,
    pub template_name: String,
    pub max_players: u8,
    pub min_buy_in: u64,
    pub max_buy_in: u64,
    pub creation_fee: u64,
    pub start_fee: u64,
    pub players: [Option<Address>; MAX_SEATS],
    pub bump: u8,
}

impl TableVault {
    /// Occupied seats with their index.
    pub fn occupants(&self) -> impl Iterator<Item = (usize, Address)> + '_ {
        self.players
            .iter()
            .enumerate()
            .filter_map(|(seat, player)| player.map(|address| (seat, address)))
    }

    pub fn occupied(&self) -> usize {
        self.players.iter().filter(|player| player.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// Seat capacity, bounded by the physical seat count.
    pub fn capacity(&self) -> usize {
        usize::from(self.max_players).min(MAX_SEATS)
    }

    pub fn is_full(&self) -> bool {
        self.occupied() >= self.capacity()
    }

    pub fn seat_of(&self, player_vault: &Address) -> Option<usize> {
        self.players
            .iter()
            .position(|player| player.as_ref() == Some(player_vault))
    }
}

impl Record for TableVault {
    const KIND: RecordKind = RecordKind::TableVault;
}

impl Write for TableVault {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_u64_le(self.table_id);
        self.owner.write(writer);
        write_string(&self.template_name, writer);
        writer.put_u8(self.max_players);
        writer.put_u64_le(self.min_buy_in);
        writer.put_u64_le(self.max_buy_in);
        writer.put_u64_le(self.creation_fee);
        writer.put_u64_le(self.start_fee);
        for player in &self.players {
            write_option(player, writer, |address, w| address.write(w));
        }
        writer.put_u8(self.bump);
    }
}

impl Read for TableVault {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let table_id = read_u64_le(reader)?;
        let owner = Address::read(reader)?;
        let template_name = read_string(reader, MAX_TEMPLATE_NAME_LENGTH)?;
        let max_players = read_u8(reader)?;
        let min_buy_in = read_u64_le(reader)?;
        let max_buy_in = read_u64_le(reader)?;
        let creation_fee = read_u64_le(reader)?;
        let start_fee = read_u64_le(reader)?;
        let mut players = [None; MAX_SEATS];
        for player in players.iter_mut() {
            *player = read_option(reader, |r| Address::read(r))?;
        }
        let bump = read_u8(reader)?;
        Ok(Self {
            table_id,
            owner,
            template_name,
            max_players,
            min_buy_in,
            max_buy_in,
            creation_fee,
            start_fee,
            players,
            bump,
        })
    }
}

impl EncodeSize for TableVault {
    fn encode_size(&self) -> usize {
        8 + self.owner.encode_size()
            + string_encode_size(&self.template_name)
            + 1
            + 8 * 4
            + self
                .players
                .iter()
                .map(|player| option_encode_size(player, Address::encode_size))
                .sum::<usize>()
            + 1
    }
}
