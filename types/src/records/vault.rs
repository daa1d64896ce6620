use super::{codec::*, Record};
use crate::{address::Address, derive::RecordKind};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

/// A participant's personal deposit record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerVault {
    pub owner: Address,
    pub is_seated: bool,
    pub is_ready: bool,
    pub current_table_id: Option<u64>,
    /// Native units committed to the current table.
    pub buy_in_amount: u64,
    pub bump: u8,
}

impl PlayerVault {
    /// Whether the vault is seated at `table_id`.
    pub fn is_seated_at(&self, table_id: u64) -> bool {
        self.is_seated && self.current_table_id == Some(table_id)
    }

    /// Balance not committed to a table, given the vault's total native balance.
    pub fn available_balance(&self, total: u64) -> u64 {
        total.saturating_sub(self.buy_in_amount)
    }
}

impl Record for PlayerVault {
    const KIND: RecordKind = RecordKind::PlayerVault;
}

impl Write for PlayerVault {
    fn write(&self, writer: &mut impl BufMut) {
        self.owner.write(writer);
        write_bool(self.is_seated, writer);
        write_bool(self.is_ready, writer);
        write_option(&self.current_table_id, writer, |id, w| w.put_u64_le(*id));
        writer.put_u64_le(self.buy_in_amount);
        writer.put_u8(self.bump);
    }
}

impl Read for PlayerVault {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            owner: Address::read(reader)?,
            is_seated: read_bool(reader)?,
            is_ready: read_bool(reader)?,
            current_table_id: read_option(reader, read_u64_le)?,
            buy_in_amount: read_u64_le(reader)?,
            bump: read_u8(reader)?,
        })
    }
}

impl EncodeSize for PlayerVault {
    fn encode_size(&self) -> usize {
        self.owner.encode_size()
            + 1
            + 1
            + option_encode_size(&self.current_table_id, |_| 8)
            + 8
            + 1
    }
}
