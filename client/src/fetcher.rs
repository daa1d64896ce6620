use crate::{classify::ErrorKind, ledger::Ledger, Error, Result};
use tableside_types::{decode_record, Address, Record};
use tracing::debug;

/// A decoded record together with the live balance of its account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account<R> {
    pub address: Address,
    pub lamports: u64,
    pub record: R,
}

/// Typed, absence-tolerant record reads.
#[derive(Clone)]
pub struct Fetcher<L: Ledger> {
    ledger: L,
}

impl<L: Ledger> Fetcher<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Fetch and decode the record at `address`.
    ///
    /// Absence (nothing stored, an empty account, or a ledger error that reports the account as
    /// missing) yields `Ok(None)`. A record with the wrong discriminator is an error.
    pub async fn fetch<R: Record>(&self, address: &Address) -> Result<Option<Account<R>>> {
        let raw = match self.ledger.get_record(address).await {
            Ok(Some(raw)) if !raw.data.is_empty() => raw,
            Ok(_) => {
                debug!(kind = %R::KIND, %address, "record absent");
                return Ok(None);
            }
            Err(err) if err.kind() == ErrorKind::RecordNotFound => {
                debug!(kind = %R::KIND, %address, error = %err, "record reported missing");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let record = decode_record::<R>(&raw.data)?;
        debug!(kind = %R::KIND, %address, lamports = raw.lamports, "record fetched");
        Ok(Some(Account {
            address: *address,
            lamports: raw.lamports,
            record,
        }))
    }

    /// Fetch a record that must exist.
    pub async fn require<R: Record>(&self, address: &Address) -> Result<Account<R>> {
        self.fetch(address)
            .await?
            .ok_or(Error::RecordNotFound {
                kind: R::KIND,
                address: *address,
            })
    }
}
