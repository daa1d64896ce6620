use crate::Result;
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, str::FromStr};
use tableside_types::Address;

/// How settled a transaction must be before it counts as confirmed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    /// Whether an observed status meets this commitment.
    pub fn is_met_by(self, observed: Commitment) -> bool {
        observed >= self
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(format!("unknown commitment: {other}")),
        }
    }
}

/// Ledger-assigned transaction signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(signature: impl Into<String>) -> Self {
        Self(signature.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An account as stored by the ledger, before decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Native balance held by the account.
    pub lamports: u64,
    /// Program that owns the account.
    pub owner: Address,
    pub data: Vec<u8>,
}

/// Read and confirmation access to the ledger.
pub trait Ledger: Clone + Send + Sync + 'static {
    /// Fetch the raw account at `address`, or `None` when nothing is stored there.
    fn get_record(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<Option<RawRecord>>> + Send;

    /// Wait until `signature` reaches `commitment`, failing if the transaction errored or the
    /// wait timed out. Never resubmits.
    fn confirm(
        &self,
        signature: &TransactionId,
        commitment: Commitment,
    ) -> impl Future<Output = Result<()>> + Send;
}
