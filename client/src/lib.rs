//! Console-side access to the table program.
//!
//! The [Console] owns the published [Snapshot] and runs every [tableside_types::Operation]
//! end-to-end: pre-check against the cached snapshot, sign and submit through a [Wallet], wait
//! for confirmation on the [Ledger], then refresh exactly once. Reads go through the
//! [Fetcher], which turns absence into `None`, and the [Assembler], which reconciles seats,
//! token entries and vault owners into one immutable view.

use tableside_types::{Address, AddressError, RecordError, RecordKind};
use thiserror::Error;

mod backoff;
pub mod classify;
pub mod config;
pub mod console;
pub mod fetcher;
pub mod ledger;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod precheck;
pub mod rpc;
pub mod snapshot;
pub mod wallet;


pub use classify::ErrorKind;
pub use config::{Config, ConfigError, ValidatedConfig};
pub use console::{Console, Options, Receipt};
pub use fetcher::{Account, Fetcher};
pub use ledger::{Commitment, Ledger, RawRecord, TransactionId};
pub use precheck::Rejection;
pub use rpc::{RetryPolicy, RpcClient};
pub use snapshot::{Assembler, OwnerResolution, Snapshot};
pub use wallet::{HttpWallet, Wallet};

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("address error: {0}")]
    Address(#[from] AddressError),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("{kind} not found at {address}")]
    RecordNotFound { kind: RecordKind, address: Address },
    #[error("no identity connected")]
    NotAuthorized,
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("transaction {signature} failed: {message}")]
    TransactionFailed {
        signature: TransactionId,
        message: String,
    },
    #[error("transaction {signature} not confirmed after {elapsed_ms}ms")]
    ConfirmTimeout {
        signature: TransactionId,
        elapsed_ms: u64,
    },
    #[error("{message}")]
    Precheck { rejection: Rejection, message: String },
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
