use super::{codec::*, Record};
use crate::{constants::MAX_TEMPLATE_NAME_LENGTH, derive::RecordKind};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, Write};

/// Named buy-in limits and seat count that tables are opened from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub min_buy_in: u64,
    pub max_buy_in: u64,
    pub max_players: u8,
    pub bump: u8,
}

impl Record for Template {
    const KIND: RecordKind = RecordKind::Template;
}

impl Write for Template {
    fn write(&self, writer: &mut impl BufMut) {
        write_string(&self.name, writer);
        writer.put_u64_le(self.min_buy_in);
        writer.put_u64_le(self.max_buy_in);
        writer.put_u8(self.max_players);
        writer.put_u8(self.bump);
    }
}

impl Read for Template {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            name: read_string(reader, MAX_TEMPLATE_NAME_LENGTH)?,
            min_buy_in: read_u64_le(reader)?,
            max_buy_in: read_u64_le(reader)?,
            max_players: read_u8(reader)?,
            bump: read_u8(reader)?,
        })
    }
}

impl EncodeSize for Template {
    fn encode_size(&self) -> usize {
        string_encode_size(&self.name) + 8 + 8 + 1 + 1
    }
}
