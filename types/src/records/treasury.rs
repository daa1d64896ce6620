use super::{codec::*, Record};
use crate::{address::Address, derive::RecordKind};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};

/// The singleton treasury ("house") that collects table fees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Treasury {
    pub authority: Address,
    pub total_collected: u64,
    pub bump: u8,
}

impl Record for Treasury {
    const KIND: RecordKind = RecordKind::Treasury;
}

impl Write for Treasury {
    fn write(&self, writer: &mut impl BufMut) {
        self.authority.write(writer);
        writer.put_u64_le(self.total_collected);
        writer.put_u8(self.bump);
    }
}

impl Read for Treasury {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            authority: Address::read(reader)?,
            total_collected: read_u64_le(reader)?,
            bump: read_u8(reader)?,
        })
    }
}

impl EncodeSize for Treasury {
    fn encode_size(&self) -> usize {
        self.authority.encode_size() + 8 + 1
    }
}
