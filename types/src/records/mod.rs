//! Program record layouts.
//!
//! Every record starts with the 8-byte discriminator of its [RecordKind], followed by its
//! fields in declaration order. Records may be allocated larger than their encoding; trailing
//! bytes are ignored on decode.

use crate::derive::RecordKind;
use commonware_codec::{EncodeSize, Error as CodecError, Read, Write};
use thiserror::Error;

pub mod codec;
mod dealer;
mod table;
mod template;
mod treasury;
mod vault;

pub use dealer::{Dealer, TokenEntry};
pub use table::{TableCounter, TableVault};
pub use template::Template;
pub use treasury::Treasury;
pub use vault::PlayerVault;

/// Length of the record discriminator prefix.
pub const DISCRIMINATOR_LENGTH: usize = 8;

/// A record layout owned by the table program.
pub trait Record: Read<Cfg = ()> + Write + EncodeSize + Sized {
    const KIND: RecordKind;
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{kind} record too short (len={len})")]
    TooShort { kind: RecordKind, len: usize },
    #[error("{kind} discriminator mismatch (got={got})")]
    DiscriminatorMismatch { kind: RecordKind, got: String },
    #[error("invalid {kind} record: {source}")]
    Codec {
        kind: RecordKind,
        #[source]
        source: CodecError,
    },
}

/// Decode a record, checking its discriminator.
pub fn decode_record<R: Record>(data: &[u8]) -> Result<R, RecordError> {
    if data.len() < DISCRIMINATOR_LENGTH {
        return Err(RecordError::TooShort {
            kind: R::KIND,
            len: data.len(),
        });
    }
    let (prefix, mut body) = data.split_at(DISCRIMINATOR_LENGTH);
    if prefix != R::KIND.discriminator() {
        return Err(RecordError::DiscriminatorMismatch {
            kind: R::KIND,
            got: commonware_utils::hex(prefix),
        });
    }
    R::read_cfg(&mut body, &()).map_err(|source| RecordError::Codec {
        kind: R::KIND,
        source,
    })
}

/// Encode a record with its discriminator prefix.
pub fn encode_record<R: Record>(record: &R) -> Vec<u8> {
    let mut out = Vec::with_capacity(DISCRIMINATOR_LENGTH + record.encode_size());
    out.extend_from_slice(&R::KIND.discriminator());
    record.write(&mut out);
    out
}

#[cfg(test)]
mod tests;
