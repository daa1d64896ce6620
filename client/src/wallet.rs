//! Identity and signing.
//!
//! Keys never enter this process. A [Wallet] exposes the connected identity (if any) and signs,
//! then submits, a single instruction on the caller's behalf.

use crate::{ledger::TransactionId, Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    sync::{Arc, RwLock},
};
use tableside_types::{AccountMeta, Address, Instruction};
use tracing::{debug, info};
use url::Url;

/// Signing capability held by the operator.
pub trait Wallet: Clone + Send + Sync + 'static {
    /// Connected identity, or `None` when no wallet is connected.
    fn identity(&self) -> Option<Address>;

    /// Sign `instruction` as the connected identity and submit it to the ledger.
    ///
    /// A declined request surfaces as an error classified as cancelled. Submissions are never
    /// retried automatically.
    fn sign_and_submit(
        &self,
        instruction: &Instruction,
    ) -> impl Future<Output = Result<TransactionId>> + Send;
}

#[derive(Deserialize)]
struct IdentityResponse {
    identity: Option<Address>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    program_id: Address,
    name: &'a str,
    accounts: &'a [AccountMeta],
    /// Base64-encoded instruction data.
    data: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    signature: TransactionId,
}

#[derive(Deserialize)]
struct WalletErrorBody {
    error: String,
}

/// Wallet reached over a small HTTP signing service.
///
/// `GET /identity` returns `{"identity": <base58 or null>}`. `POST /sign-and-submit` takes the
/// instruction and returns `{"signature": ...}`, or a non-2xx status with `{"error": ...}`.
#[derive(Clone)]
pub struct HttpWallet {
    http: reqwest::Client,
    url: Url,
    identity: Arc<RwLock<Option<Address>>>,
}

impl HttpWallet {
    /// Connect to the signing service and read its identity.
    pub async fn connect(url: &str) -> Result<Self> {
        let mut url = Url::parse(url)?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        // Endpoints are joined relative to the base path.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        let wallet = Self {
            http: reqwest::Client::new(),
            url,
            identity: Arc::new(RwLock::new(None)),
        };
        wallet.refresh_identity().await?;
        Ok(wallet)
    }

    /// Re-read the connected identity (the operator may switch accounts).
    pub async fn refresh_identity(&self) -> Result<Option<Address>> {
        let url = self.url.join("identity")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::FailedWithBody { status, body });
        }
        let IdentityResponse { identity } = response.json().await?;
        if let Ok(mut cached) = self.identity.write() {
            if *cached != identity {
                info!(identity = ?identity.map(|identity| identity.to_string()), "wallet identity changed");
            }
            *cached = identity;
        }
        Ok(identity)
    }
}

impl Wallet for HttpWallet {
    fn identity(&self) -> Option<Address> {
        self.identity.read().ok().and_then(|identity| *identity)
    }

    async fn sign_and_submit(&self, instruction: &Instruction) -> Result<TransactionId> {
        let url = self.url.join("sign-and-submit")?;
        let request = SubmitRequest {
            program_id: instruction.program_id,
            name: instruction.name,
            accounts: &instruction.accounts,
            data: STANDARD.encode(&instruction.data),
        };
        debug!(name = instruction.name, accounts = instruction.accounts.len(), "requesting signature");
        let response = self.http.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // The service reports wallet and simulation failures as `{"error": ...}`.
            return match serde_json::from_str::<WalletErrorBody>(&body) {
                Ok(WalletErrorBody { error }) => Err(Error::Wallet(error)),
                Err(_) => Err(Error::FailedWithBody { status, body }),
            };
        }
        let SubmitResponse { signature } = response.json().await?;
        Ok(signature)
    }
}
