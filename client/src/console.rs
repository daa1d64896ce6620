//! Operation orchestration and snapshot publication.

use crate::{
    classify::ErrorKind,
    ledger::{Commitment, Ledger, TransactionId},
    precheck,
    snapshot::{Assembler, Snapshot, DEFAULT_FETCH_CONCURRENCY},
    wallet::Wallet,
    Error, Result,
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tableside_types::{
    AccountContext, Address, Deriver, Operation, RecordKey, TableCounter,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1_000);

/// Tunables for a [Console].
#[derive(Clone, Debug)]
pub struct Options {
    pub deriver: Deriver,
    /// Level a submission must reach before it counts as confirmed.
    pub commitment: Commitment,
    /// Pause between confirmation and the post-operation refresh.
    pub settle_delay: Duration,
    pub fetch_concurrency: usize,
    pub persist_owner_cache: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            deriver: Deriver::default(),
            commitment: Commitment::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            persist_owner_cache: false,
        }
    }
}

/// Outcome of a confirmed operation.
#[derive(Clone, Debug, Serialize)]
pub struct Receipt {
    pub operation: &'static str,
    pub signature: TransactionId,
    /// Table the operation touched. For `OpenTable`, the id it was assigned.
    pub table_id: Option<u64>,
    /// Snapshot published after confirmation; `None` if that refresh failed.
    #[serde(skip)]
    pub snapshot: Option<Arc<Snapshot>>,
}

/// Owns the published snapshot and runs operations against the ledger.
pub struct Console<L: Ledger, W: Wallet> {
    ledger: L,
    wallet: W,
    assembler: Assembler<L>,
    deriver: Deriver,
    commitment: Commitment,
    settle_delay: Duration,
    published: watch::Sender<Arc<Snapshot>>,
    // Version of the last published snapshot. Held for the whole refresh.
    refresh_lock: Mutex<u64>,
}

impl<L: Ledger, W: Wallet> Console<L, W> {
    pub fn new(ledger: L, wallet: W, options: Options) -> Self {
        let assembler = Assembler::new(ledger.clone(), options.deriver)
            .with_concurrency(options.fetch_concurrency)
            .with_persistent_owner_cache(options.persist_owner_cache);
        let (published, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            ledger,
            wallet,
            assembler,
            deriver: options.deriver,
            commitment: options.commitment,
            settle_delay: options.settle_delay,
            published,
            refresh_lock: Mutex::new(0),
        }
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Latest published snapshot (version 0 before the first refresh).
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.borrow().clone()
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.published.subscribe()
    }

    pub fn derive(&self, key: &RecordKey) -> Result<Address> {
        Ok(self.deriver.derive(key)?)
    }

    /// Rebuild the snapshot from the ledger and publish it.
    ///
    /// Concurrent refreshes run one after another. A failed refresh leaves the published
    /// snapshot untouched.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let mut version = self.refresh_lock.lock().await;
        let next = *version + 1;
        let snapshot = Arc::new(
            self.assembler
                .assemble(self.wallet.identity(), next)
                .await?,
        );
        *version = next;
        self.published.send_replace(snapshot.clone());
        info!(
            version = next,
            tables = snapshot.tables.len(),
            skipped = snapshot.skipped_tables.len(),
            "published snapshot"
        );
        Ok(snapshot)
    }

    /// Run `operation` end-to-end: pre-check, sign and submit, confirm, then refresh once.
    ///
    /// Failures are returned as classified and never trigger a refresh.
    pub async fn execute(&self, operation: Operation) -> Result<Receipt> {
        let (signature, table_id) = match self.submit(&operation).await {
            Ok(submitted) => submitted,
            Err(err) => {
                log_failure(&operation, &err);
                return Err(err);
            }
        };
        info!(operation = operation.name(), %signature, table_id, "operation confirmed");

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        let snapshot = match self.refresh().await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(
                    operation = operation.name(),
                    %signature,
                    error = %err,
                    "refresh after confirmed operation failed"
                );
                None
            }
        };
        Ok(Receipt {
            operation: operation.name(),
            signature,
            table_id,
            snapshot,
        })
    }

    async fn submit(&self, operation: &Operation) -> Result<(TransactionId, Option<u64>)> {
        let identity = self.wallet.identity().ok_or(Error::NotAuthorized)?;
        precheck::check(operation, &identity, &self.snapshot())?;

        let mut context = AccountContext::new(identity);
        let mut table_id = operation.table_id();
        if matches!(operation, Operation::OpenTable) {
            // The new table takes the live counter value, not the snapshot's.
            let counter_address = self.deriver.table_counter()?;
            let next = self
                .assembler
                .fetcher()
                .fetch::<TableCounter>(&counter_address)
                .await?
                .map_or(0, |counter| counter.record.count);
            context = context.with_next_table_id(next);
            table_id = Some(next);
        }

        let instruction = operation.instruction(&self.deriver, &context)?;
        debug!(
            operation = operation.name(),
            identity = %identity,
            accounts = instruction.accounts.len(),
            "submitting"
        );
        let signature = self.wallet.sign_and_submit(&instruction).await?;
        debug!(operation = operation.name(), %signature, commitment = %self.commitment, "awaiting confirmation");
        self.ledger.confirm(&signature, self.commitment).await?;
        Ok((signature, table_id))
    }
}

fn log_failure(operation: &Operation, err: &Error) {
    match err.kind() {
        ErrorKind::UserCancelled => {
            info!(operation = operation.name(), "operation cancelled in wallet")
        }
        ErrorKind::Unknown => {
            error!(operation = operation.name(), error = ?err, "operation failed")
        }
        kind => warn!(operation = operation.name(), %kind, error = %err, "operation failed"),
    }
}
