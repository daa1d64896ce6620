//! Failure taxonomy shared by reads and submissions.
//!
//! Ledger and wallet failures arrive as free-form messages from systems this crate does not
//! control, so classification inspects status codes and message text rather than error types.

use crate::{precheck::Rejection, Error};
use serde::Serialize;
use std::fmt;
use tableside_types::{program_error::parse_error_code, ProgramError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The identity holder declined to sign. Not an application error.
    UserCancelled,
    InsufficientFunds,
    /// Expected absence of a record.
    RecordNotFound,
    /// An authority-only operation from a non-authority (or no) identity.
    AuthorityRequired,
    /// The ledger program refused the operation.
    LedgerRejected,
    /// Network trouble or a timeout. Reads are safe to retry; see [Error::is_retryable].
    TransientFailure,
    Unknown,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UserCancelled => "user_cancelled",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::RecordNotFound => "record_not_found",
            ErrorKind::AuthorityRequired => "authority_required",
            ErrorKind::LedgerRejected => "ledger_rejected",
            ErrorKind::TransientFailure => "transient_failure",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const CANCELLED_MARKERS: [&str; 5] = [
    "user rejected",
    "walletsigntransactionerror",
    "rejected the request",
    "request declined",
    "user denied",
];
const INSUFFICIENT_MARKERS: [&str; 2] = ["insufficient funds", "insufficient lamports"];
const NOT_FOUND_MARKERS: [&str; 3] = [
    "account does not exist",
    "could not find account",
    "accountnotfound",
];
const REJECTED_MARKERS: [&str; 5] = [
    "program log:",
    "custom program error:",
    "error number:",
    "instructionerror",
    "simulation failed",
];
const TRANSIENT_MARKERS: [&str; 6] = [
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "too many requests",
    "service unavailable",
];

/// Kind for a program error code.
fn classify_code(code: u32) -> ErrorKind {
    match ProgramError::from_code(code) {
        Some(ProgramError::Unauthorized | ProgramError::InvalidTableOwner) => {
            ErrorKind::AuthorityRequired
        }
        Some(
            ProgramError::InsufficientBalance
            | ProgramError::MinimumDepositNotMet
            | ProgramError::InvalidDepositAmount,
        ) => ErrorKind::InsufficientFunds,
        // Framework "account not initialized".
        None if code == 3012 => ErrorKind::RecordNotFound,
        _ => ErrorKind::LedgerRejected,
    }
}

/// Classify a free-form failure message from the ledger or wallet.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|marker| lower.contains(marker));

    if contains_any(&CANCELLED_MARKERS) {
        return ErrorKind::UserCancelled;
    }
    if let Some(code) = parse_error_code(message) {
        return classify_code(code);
    }
    if contains_any(&INSUFFICIENT_MARKERS) {
        return ErrorKind::InsufficientFunds;
    }
    if contains_any(&NOT_FOUND_MARKERS) {
        return ErrorKind::RecordNotFound;
    }
    if contains_any(&REJECTED_MARKERS) {
        return ErrorKind::LedgerRejected;
    }
    if contains_any(&TRANSIENT_MARKERS) {
        return ErrorKind::TransientFailure;
    }
    ErrorKind::Unknown
}

fn classify_status(status: reqwest::StatusCode) -> Option<ErrorKind> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Some(ErrorKind::TransientFailure);
    }
    None
}

impl Error {
    /// Classify this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reqwest(err) => {
                if err.is_timeout() || err.is_connect() || err.is_request() {
                    return ErrorKind::TransientFailure;
                }
                err.status()
                    .and_then(classify_status)
                    .unwrap_or(ErrorKind::Unknown)
            }
            Error::FailedWithBody { status, body } => {
                classify_status(*status).unwrap_or_else(|| classify_message(body))
            }
            Error::ConfirmTimeout { .. } => ErrorKind::TransientFailure,
            Error::RecordNotFound { .. } => ErrorKind::RecordNotFound,
            Error::NotAuthorized => ErrorKind::AuthorityRequired,
            Error::Precheck { rejection, .. } => match rejection {
                Rejection::AuthorityRequired => ErrorKind::AuthorityRequired,
                Rejection::InsufficientFunds => ErrorKind::InsufficientFunds,
                Rejection::Rule => ErrorKind::LedgerRejected,
            },
            Error::Rpc { message, .. } | Error::Wallet(message) => classify_message(message),
            Error::TransactionFailed { message, .. } => match classify_message(message) {
                // Anything that failed on-ledger was rejected by the program or runtime.
                ErrorKind::Unknown => ErrorKind::LedgerRejected,
                kind => kind,
            },
            Error::UnexpectedResponse(_)
            | Error::Base64(_)
            | Error::Json(_)
            | Error::Url(_)
            | Error::InvalidScheme(_)
            | Error::Address(_)
            | Error::Record(_) => ErrorKind::Unknown,
        }
    }

    /// The program error carried by this failure, if any.
    pub fn program_error(&self) -> Option<ProgramError> {
        match self {
            Error::Rpc { message, .. }
            | Error::Wallet(message)
            | Error::TransactionFailed { message, .. }
            | Error::FailedWithBody { body: message, .. } => ProgramError::parse(message),
            _ => None,
        }
    }

    /// Whether the failure is worth retrying unchanged.
    ///
    /// A confirmation timeout is transient but not retryable: the transaction may still land,
    /// so refresh and inspect the ledger before submitting again.
    pub fn is_retryable(&self) -> bool {
        if self.outcome_unknown() {
            return false;
        }
        matches!(
            self.kind(),
            ErrorKind::TransientFailure | ErrorKind::UserCancelled
        )
    }

    /// Whether the operation was submitted and may or may not have been applied.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Error::ConfirmTimeout { .. })
    }

    /// Operator-facing text: the ledger's own message where one is available.
    pub fn user_message(&self) -> String {
        if let Some(program_error) = self.program_error() {
            return program_error.message().to_string();
        }
        match (self.kind(), self) {
            (_, Error::Precheck { message, .. }) => message.clone(),
            (_, Error::ConfirmTimeout { signature, .. }) => format!(
                "Transaction {signature} was submitted but not confirmed in time. Refresh before trying again."
            ),
            (ErrorKind::UserCancelled, _) => "Request cancelled in the wallet.".to_string(),
            (ErrorKind::AuthorityRequired, Error::NotAuthorized) => {
                "Connect a wallet to continue.".to_string()
            }
            (ErrorKind::AuthorityRequired, _) => {
                "This action requires the treasury authority.".to_string()
            }
            (ErrorKind::InsufficientFunds, _) => "Insufficient funds.".to_string(),
            (ErrorKind::RecordNotFound, Error::RecordNotFound { kind, address }) => {
                format!("No {kind} exists at {address}.")
            }
            (ErrorKind::RecordNotFound, _) => "The requested record does not exist.".to_string(),
            (ErrorKind::LedgerRejected, Error::Rpc { message, .. })
            | (ErrorKind::LedgerRejected, Error::Wallet(message))
            | (ErrorKind::LedgerRejected, Error::TransactionFailed { message, .. }) => {
                message.clone()
            }
            (ErrorKind::LedgerRejected, _) => "The ledger rejected the operation.".to_string(),
            (ErrorKind::TransientFailure, _) => {
                "The ledger could not be reached. Try again.".to_string()
            }
            (ErrorKind::Unknown, _) => "Something went wrong. See the logs for details.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableside_types::{Address, RecordKind};

    #[test]
    fn test_classify_cancellation() {
        assert_eq!(
            classify_message("WalletSignTransactionError: User rejected the request."),
            ErrorKind::UserCancelled
        );
        assert_eq!(
            Error::Wallet("user rejected".to_string()).kind(),
            ErrorKind::UserCancelled
        );
        assert!(Error::Wallet("User rejected".into()).is_retryable());
    }

    #[test]
    fn test_classify_program_errors() {
        let full = Error::Wallet(
            "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x1770"
                .to_string(),
        );
        assert_eq!(full.kind(), ErrorKind::LedgerRejected);
        assert_eq!(full.user_message(), "Table is full");

        let unauthorized = Error::Rpc {
            code: -32002,
            message: "Program log: AnchorError occurred. Error Number: 6009.".to_string(),
        };
        assert_eq!(unauthorized.kind(), ErrorKind::AuthorityRequired);

        let broke = Error::Wallet("custom program error: 0x1775".to_string());
        assert_eq!(broke.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(broke.user_message(), "Insufficient balance");

        assert_eq!(
            classify_message("custom program error: 0xbc4"),
            ErrorKind::RecordNotFound
        );
        assert_eq!(
            classify_message("custom program error: 0x7d1"),
            ErrorKind::LedgerRejected
        );
    }

    #[test]
    fn test_classify_messages() {
        assert_eq!(
            classify_message("Attempt to debit: insufficient funds for fee"),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            classify_message("Account does not exist 6LC4epMG"),
            ErrorKind::RecordNotFound
        );
        assert_eq!(
            classify_message("Program log: Instruction: JoinGame"),
            ErrorKind::LedgerRejected
        );
        assert_eq!(classify_message("request timed out"), ErrorKind::TransientFailure);
        assert_eq!(classify_message("something odd"), ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_categories() {
        let throttled = Error::FailedWithBody {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        assert_eq!(throttled.kind(), ErrorKind::TransientFailure);
        let bad = Error::FailedWithBody {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: "nope".to_string(),
        };
        assert_eq!(bad.kind(), ErrorKind::Unknown);
        assert_eq!(
            bad.user_message(),
            "Something went wrong. See the logs for details."
        );

        let missing = Error::RecordNotFound {
            kind: RecordKind::Treasury,
            address: Address::default(),
        };
        assert_eq!(missing.kind(), ErrorKind::RecordNotFound);
        assert_eq!(Error::NotAuthorized.kind(), ErrorKind::AuthorityRequired);
        assert_eq!(
            Error::NotAuthorized.user_message(),
            "Connect a wallet to continue."
        );

        let failed = Error::TransactionFailed {
            signature: crate::TransactionId::new("sig"),
            message: "{\"InstructionError\":[0,\"InvalidAccountData\"]}".to_string(),
        };
        assert_eq!(failed.kind(), ErrorKind::LedgerRejected);
    }

    #[test]
    fn test_confirm_timeout_is_not_retryable() {
        let timeout = Error::ConfirmTimeout {
            signature: crate::TransactionId::new("sig"),
            elapsed_ms: 60_000,
        };
        assert_eq!(timeout.kind(), ErrorKind::TransientFailure);
        assert!(timeout.outcome_unknown());
        assert!(!timeout.is_retryable());
        assert!(timeout.user_message().contains("Refresh before trying again"));

        let unreachable = Error::Rpc {
            code: -32000,
            message: "connection reset by peer".to_string(),
        };
        assert_eq!(unreachable.kind(), ErrorKind::TransientFailure);
        assert!(!unreachable.outcome_unknown());
        assert!(unreachable.is_retryable());
    }

    #[test]
    fn test_precheck_kinds() {
        let err = Error::Precheck {
            rejection: Rejection::InsufficientFunds,
            message: "Maximum buy-in exceeded".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(err.user_message(), "Maximum buy-in exceeded");
        let err = Error::Precheck {
            rejection: Rejection::Rule,
            message: "Table is full".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::LedgerRejected);
    }
}
