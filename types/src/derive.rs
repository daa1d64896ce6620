use crate::{
    address::{find_program_address, Address, AddressError},
    constants::{
        DEALER_SEED, PLAYER_VAULT_SEED, PROGRAM_ID, TABLE_COUNTER_SEED, TABLE_VAULT_SEED,
        TEMPLATE_SEED, TREASURY_SEED,
    },
};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Kinds of program-owned records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Treasury,
    Template,
    PlayerVault,
    TableVault,
    Dealer,
    TableCounter,
}

impl RecordKind {
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Treasury,
        RecordKind::Template,
        RecordKind::PlayerVault,
        RecordKind::TableVault,
        RecordKind::Dealer,
        RecordKind::TableCounter,
    ];

    pub const fn seed(self) -> &'static [u8] {
        match self {
            RecordKind::Treasury => TREASURY_SEED,
            RecordKind::Template => TEMPLATE_SEED,
            RecordKind::PlayerVault => PLAYER_VAULT_SEED,
            RecordKind::TableVault => TABLE_VAULT_SEED,
            RecordKind::Dealer => DEALER_SEED,
            RecordKind::TableCounter => TABLE_COUNTER_SEED,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Treasury => "treasury",
            RecordKind::Template => "template",
            RecordKind::PlayerVault => "player_vault",
            RecordKind::TableVault => "table_vault",
            RecordKind::Dealer => "dealer",
            RecordKind::TableCounter => "table_counter",
        }
    }

    /// 8-byte prefix the program writes at the start of every record of this kind.
    pub const fn discriminator(self) -> [u8; 8] {
        match self {
            RecordKind::Treasury => [21, 145, 94, 109, 254, 199, 210, 151],
            RecordKind::Template => [206, 121, 22, 64, 20, 239, 210, 128],
            RecordKind::PlayerVault => [37, 59, 99, 224, 234, 233, 179, 185],
            RecordKind::TableVault => [7, 14, 145, 251, 151, 162, 15, 125],
            RecordKind::Dealer => [132, 134, 166, 186, 102, 153, 187, 86],
            RecordKind::TableCounter => [225, 195, 35, 175, 255, 135, 104, 140],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "treasury" | "house" => Ok(RecordKind::Treasury),
            "template" => Ok(RecordKind::Template),
            "player_vault" | "vault" => Ok(RecordKind::PlayerVault),
            "table_vault" | "table" => Ok(RecordKind::TableVault),
            "dealer" => Ok(RecordKind::Dealer),
            "table_counter" | "counter" => Ok(RecordKind::TableCounter),
            _ => Err(format!("unknown record kind: {s}")),
        }
    }
}

/// A record kind together with its key material.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Treasury,
    Template(String),
    PlayerVault(Address),
    TableVault(u64),
    Dealer(u64),
    TableCounter,
}

impl RecordKey {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordKey::Treasury => RecordKind::Treasury,
            RecordKey::Template(_) => RecordKind::Template,
            RecordKey::PlayerVault(_) => RecordKind::PlayerVault,
            RecordKey::TableVault(_) => RecordKind::TableVault,
            RecordKey::Dealer(_) => RecordKind::Dealer,
            RecordKey::TableCounter => RecordKind::TableCounter,
        }
    }

    /// Seed parts in order, excluding the bump. Table ids are 8-byte little-endian.
    pub fn seeds(&self) -> Vec<Vec<u8>> {
        let prefix = self.kind().seed().to_vec();
        match self {
            RecordKey::Treasury | RecordKey::TableCounter => vec![prefix],
            RecordKey::Template(name) => vec![prefix, name.as_bytes().to_vec()],
            RecordKey::PlayerVault(owner) => vec![prefix, owner.as_ref().to_vec()],
            RecordKey::TableVault(id) | RecordKey::Dealer(id) => {
                vec![prefix, id.to_le_bytes().to_vec()]
            }
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Treasury | RecordKey::TableCounter => write!(f, "{}", self.kind()),
            RecordKey::Template(name) => write!(f, "template({name})"),
            RecordKey::PlayerVault(owner) => write!(f, "player_vault({owner})"),
            RecordKey::TableVault(id) => write!(f, "table_vault({id})"),
            RecordKey::Dealer(id) => write!(f, "dealer({id})"),
        }
    }
}

/// Computes the canonical address of every program-owned record.
///
/// Derivation is pure: the same key and program id always produce the same address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deriver {
    program_id: Address,
}

impl Default for Deriver {
    fn default() -> Self {
        Self::new(PROGRAM_ID)
    }
}

impl Deriver {
    pub const fn new(program_id: Address) -> Self {
        Self { program_id }
    }

    pub const fn program_id(&self) -> &Address {
        &self.program_id
    }

    pub fn derive_with_bump(&self, key: &RecordKey) -> Result<(Address, u8), AddressError> {
        let seeds = key.seeds();
        let parts: Vec<&[u8]> = seeds.iter().map(Vec::as_slice).collect();
        find_program_address(&parts, &self.program_id)
    }

    pub fn derive(&self, key: &RecordKey) -> Result<Address, AddressError> {
        self.derive_with_bump(key).map(|(address, _)| address)
    }

    pub fn treasury(&self) -> Result<Address, AddressError> {
        self.derive(&RecordKey::Treasury)
    }

    pub fn template(&self, name: &str) -> Result<Address, AddressError> {
        self.derive(&RecordKey::Template(name.to_string()))
    }

    pub fn player_vault(&self, owner: &Address) -> Result<Address, AddressError> {
        self.derive(&RecordKey::PlayerVault(*owner))
    }

    pub fn table_vault(&self, table_id: u64) -> Result<Address, AddressError> {
        self.derive(&RecordKey::TableVault(table_id))
    }

    pub fn dealer(&self, table_id: u64) -> Result<Address, AddressError> {
        self.derive(&RecordKey::Dealer(table_id))
    }

    pub fn table_counter(&self) -> Result<Address, AddressError> {
        self.derive(&RecordKey::TableCounter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TEMPLATE;

    fn check(key: RecordKey, expected: &str, expected_bump: u8) {
        let (address, bump) = Deriver::default().derive_with_bump(&key).unwrap();
        assert_eq!(address.to_string(), expected, "address for {key}");
        assert_eq!(bump, expected_bump, "bump for {key}");
    }

    #[test]
    fn test_known_addresses() {
        check(
            RecordKey::Treasury,
            "6LC4epMGU8ZEmE74qcKMRBfbrDDv9KPjeimPfUiEEbWT",
            253,
        );
        check(
            RecordKey::TableCounter,
            "HDWVEZ1XAJZCANymmyVavX7W6ZLbnYwMspZnPyuxhmUr",
            255,
        );
        check(
            RecordKey::Template(DEFAULT_TEMPLATE.to_string()),
            "HnQxQT9PvojuntjwdqBbiUY7zQdFJDdbFpBuMjiR8F5",
            255,
        );
        check(
            RecordKey::TableVault(0),
            "2pmEaKaPDyfi6Rjtict3KhW6FxWbtAdyeSvKv6PMbBpv",
            255,
        );
        check(
            RecordKey::Dealer(0),
            "4nJAs6XbwM2Y2zQXUCJkovuFjto8A85E5boBn6AQE5P8",
            255,
        );
        check(
            RecordKey::TableVault(1),
            "HtBCxAjerF6t8S9xPtz1zJnSFgPCVmtRd4MRqeGrcrxG",
            255,
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let deriver = Deriver::default();
        let owner = Address::new([3u8; 32]);
        assert_eq!(
            deriver.player_vault(&owner).unwrap(),
            deriver.player_vault(&owner).unwrap()
        );
        assert_ne!(
            deriver.player_vault(&owner).unwrap(),
            deriver.player_vault(&Address::new([4u8; 32])).unwrap()
        );
        assert_ne!(deriver.table_vault(0).unwrap(), deriver.dealer(0).unwrap());
    }

    #[test]
    fn test_program_id_changes_addresses() {
        let other = Deriver::new(Address::new([1u8; 32]));
        assert_ne!(
            other.treasury().unwrap(),
            Deriver::default().treasury().unwrap()
        );
    }

    #[test]
    fn test_table_id_seed_is_little_endian() {
        let seeds = RecordKey::TableVault(0x0102).seeds();
        assert_eq!(seeds[0], b"table_vault".to_vec());
        assert_eq!(seeds[1], vec![0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_long_template_name_rejected() {
        let name = "x".repeat(33);
        assert!(matches!(
            Deriver::default().template(&name),
            Err(AddressError::SeedTooLong { len: 33, .. })
        ));
    }

    #[test]
    fn test_kind_from_str() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert_eq!("house".parse::<RecordKind>().unwrap(), RecordKind::Treasury);
        assert!("nope".parse::<RecordKind>().is_err());
    }
}
