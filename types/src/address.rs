use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, Write};
use commonware_cryptography::{sha256::Sha256, Hasher};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

/// Length of an address (and of an identity public key) in bytes.
pub const ADDRESS_LENGTH: usize = 32;

/// Maximum length of a single seed accepted by the ledger.
pub const MAX_SEED_LENGTH: usize = 32;

/// Maximum number of seeds (including the bump) accepted by the ledger.
pub const MAX_SEEDS: usize = 16;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),
    #[error("invalid address length (len={len}, expected={expected})")]
    InvalidLength { len: usize, expected: usize },
    #[error("seed too long (len={len}, max={max})")]
    SeedTooLong { len: usize, max: usize },
    #[error("too many seeds (got={got}, max={max})")]
    TooManySeeds { got: usize, max: usize },
    #[error("no viable bump seed")]
    NoViableBump,
}

/// A 32-byte ledger address. Identities (wallet public keys) share the same representation.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; ADDRESS_LENGTH] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Whether the bytes decompress to an ed25519 point. Derived addresses never do.
    pub fn is_on_curve(&self) -> bool {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0).is_ok()
    }

    /// Leading characters of the base58 form, for log lines.
    pub fn short(&self) -> String {
        let mut encoded = self.to_string();
        encoded.truncate(8);
        encoded
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = AddressError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; ADDRESS_LENGTH] =
            value.try_into().map_err(|_| AddressError::InvalidLength {
                len: value.len(),
                expected: ADDRESS_LENGTH,
            })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|err| AddressError::InvalidBase58(err.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl Write for Address {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_slice(&self.0);
    }
}

impl Read for Address {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        if reader.remaining() < ADDRESS_LENGTH {
            return Err(Error::EndOfBuffer);
        }
        let mut bytes = [0u8; ADDRESS_LENGTH];
        reader.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

impl EncodeSize for Address {
    fn encode_size(&self) -> usize {
        ADDRESS_LENGTH
    }
}

/// Hash `seeds` (the bump already appended) into a program address.
///
/// Returns `None` when the digest lands on the ed25519 curve, i.e. when it could have a
/// private key and is therefore unusable as a program-owned address.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<Option<Address>, AddressError> {
    if seeds.len() > MAX_SEEDS {
        return Err(AddressError::TooManySeeds {
            got: seeds.len(),
            max: MAX_SEEDS,
        });
    }
    let mut hasher = Sha256::new();
    for seed in seeds {
        if seed.len() > MAX_SEED_LENGTH {
            return Err(AddressError::SeedTooLong {
                len: seed.len(),
                max: MAX_SEED_LENGTH,
            });
        }
        hasher.update(seed);
    }
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);
    let candidate = Address::try_from(hasher.finalize().as_ref())?;
    if candidate.is_on_curve() {
        return Ok(None);
    }
    Ok(Some(candidate))
}

/// Search bumps from 255 down to 0 and return the first off-curve address with its bump.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), AddressError> {
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);
        if let Some(address) = create_program_address(&with_bump, program_id)? {
            return Ok((address, bump));
        }
    }
    Err(AddressError::NoViableBump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROGRAM_ID;
    use commonware_codec::{Encode, ReadExt};

    #[test]
    fn test_program_id_base58() {
        assert_eq!(
            PROGRAM_ID.to_string(),
            "3VWxtZ5CCjG2eKH1FNQxDkCKU57QMk5SZ61Gx6pcsHne"
        );
        let parsed: Address = "3VWxtZ5CCjG2eKH1FNQxDkCKU57QMk5SZ61Gx6pcsHne".parse().unwrap();
        assert_eq!(parsed, PROGRAM_ID);
    }

    #[test]
    fn test_system_program_is_all_ones() {
        assert_eq!(Address::default().to_string(), "11111111111111111111111111111111");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            "0OIl".parse::<Address>(),
            Err(AddressError::InvalidBase58(_))
        ));
        let short = bs58::encode([1u8; 31]).into_string();
        assert_eq!(
            short.parse::<Address>(),
            Err(AddressError::InvalidLength {
                len: 31,
                expected: ADDRESS_LENGTH
            })
        );
    }

    #[test]
    fn test_find_program_address_skips_on_curve_bumps() {
        // 255 and 254 land on the curve for this seed.
        let (address, bump) = find_program_address(&[b"house"], &PROGRAM_ID).unwrap();
        assert_eq!(bump, 253);
        assert_eq!(
            address.to_string(),
            "6LC4epMGU8ZEmE74qcKMRBfbrDDv9KPjeimPfUiEEbWT"
        );
        assert!(!address.is_on_curve());
        assert_eq!(
            create_program_address(&[b"house", &[253]], &PROGRAM_ID).unwrap(),
            Some(address)
        );
    }

    #[test]
    fn test_seed_limits() {
        let long = [7u8; MAX_SEED_LENGTH + 1];
        assert_eq!(
            find_program_address(&[&long], &PROGRAM_ID),
            Err(AddressError::SeedTooLong {
                len: MAX_SEED_LENGTH + 1,
                max: MAX_SEED_LENGTH
            })
        );
        let seeds: Vec<&[u8]> = vec![&b"x"[..]; MAX_SEEDS];
        assert!(matches!(
            find_program_address(&seeds, &PROGRAM_ID),
            Err(AddressError::TooManySeeds { .. })
        ));
    }

    #[test]
    fn test_codec_and_serde() {
        let address = Address::new([9u8; ADDRESS_LENGTH]);
        let encoded = address.encode();
        assert_eq!(encoded.len(), ADDRESS_LENGTH);
        assert_eq!(Address::read(&mut &encoded[..]).unwrap(), address);
        assert!(matches!(
            Address::read(&mut &encoded[..ADDRESS_LENGTH - 1]),
            Err(Error::EndOfBuffer)
        ));

        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{address}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
