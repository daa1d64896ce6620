//! JSON-RPC ledger client.

use crate::{
    backoff::Backoff,
    classify::ErrorKind,
    ledger::{Commitment, Ledger, RawRecord, TransactionId},
    Error, Result,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tableside_types::Address;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Retry behavior for read requests. Submissions are never retried here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorBody {
    /// Message with any program logs appended.
    fn into_message(self) -> String {
        let logs = self
            .data
            .as_ref()
            .and_then(|data| data.get("logs"))
            .and_then(Value::as_array)
            .map(|logs| {
                logs.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|logs| !logs.is_empty());
        match logs {
            Some(logs) => format!("{}\n{logs}", self.message),
            None => self.message,
        }
    }
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct AccountInfo {
    lamports: u64,
    owner: String,
    data: (String, String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    #[serde(default)]
    confirmations: Option<u64>,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    fn observed(&self) -> Commitment {
        match (self.confirmation_status, self.confirmations) {
            (Some(status), _) => status,
            // Rooted transactions report no confirmation count.
            (None, None) => Commitment::Finalized,
            (None, Some(_)) => Commitment::Processed,
        }
    }
}

/// Ledger access over HTTP JSON-RPC 2.0.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    pub url: Url,
    commitment: Commitment,
    retry_policy: RetryPolicy,
    confirm_timeout: Duration,
    confirm_poll_interval: Duration,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        Ok(Self {
            http: reqwest::Client::new(),
            url,
            commitment: Commitment::default(),
            retry_policy: RetryPolicy::default(),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            confirm_poll_interval: DEFAULT_CONFIRM_POLL_INTERVAL,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Commitment used for reads.
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_confirm_timing(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirm_timeout = timeout;
        self.confirm_poll_interval = poll_interval;
        self
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let response = self.http.post(self.url.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::FailedWithBody { status, body });
        }
        let response: RpcResponse<T> = response.json().await?;
        if let Some(error) = response.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.into_message(),
            });
        }
        response
            .result
            .ok_or_else(|| Error::UnexpectedResponse(format!("{method} returned no result")))
    }

    async fn call<T: DeserializeOwned>(&self, method: &'static str, params: Value) -> Result<T> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut backoff = Backoff::new(
            self.retry_policy.initial_backoff,
            self.retry_policy.max_backoff,
        );
        let mut attempt = 1;
        loop {
            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(err) if attempt < max_attempts && err.kind() == ErrorKind::TransientFailure => {
                    let delay = backoff.next_delay(&mut rand::thread_rng());
                    warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying ledger request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetch an account, `None` when the address holds nothing.
    pub async fn get_account_info(&self, address: &Address) -> Result<Option<RawRecord>> {
        let params = json!([
            address.to_string(),
            { "encoding": "base64", "commitment": self.commitment.as_str() }
        ]);
        let response: WithContext<Option<AccountInfo>> =
            self.call("getAccountInfo", params).await?;
        let Some(info) = response.value else {
            return Ok(None);
        };
        if info.data.1 != "base64" {
            return Err(Error::UnexpectedResponse(format!(
                "unexpected account encoding: {}",
                info.data.1
            )));
        }
        Ok(Some(RawRecord {
            lamports: info.lamports,
            owner: info.owner.parse()?,
            data: STANDARD.decode(info.data.0)?,
        }))
    }

    /// Poll the signature status until it reaches `commitment`.
    pub async fn wait_for_confirmation(
        &self,
        signature: &TransactionId,
        commitment: Commitment,
    ) -> Result<()> {
        let start = Instant::now();
        loop {
            let params = json!([[signature.as_str()], { "searchTransactionHistory": true }]);
            let statuses: WithContext<Vec<Option<SignatureStatus>>> =
                self.call("getSignatureStatuses", params).await?;
            if let Some(Some(status)) = statuses.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(Error::TransactionFailed {
                        signature: signature.clone(),
                        message: err.to_string(),
                    });
                }
                let observed = status.observed();
                if commitment.is_met_by(observed) {
                    return Ok(());
                }
                debug!(%signature, %observed, "awaiting commitment");
            }

            let elapsed = start.elapsed();
            if elapsed >= self.confirm_timeout {
                return Err(Error::ConfirmTimeout {
                    signature: signature.clone(),
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.confirm_poll_interval).await;
        }
    }
}

impl Ledger for RpcClient {
    async fn get_record(&self, address: &Address) -> Result<Option<RawRecord>> {
        self.get_account_info(address).await
    }

    async fn confirm(&self, signature: &TransactionId, commitment: Commitment) -> Result<()> {
        self.wait_for_confirmation(signature, commitment).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State as AxumState,
        http::StatusCode as AxumStatusCode,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use std::{
        net::SocketAddr,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tokio::time::sleep;

    async fn serve_router(router: Router) -> (String, tokio::task::JoinHandle<()>) {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        let actual_addr = listener.local_addr().unwrap();
        let base_url = format!("http://{actual_addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .await
                .unwrap();
        });

        sleep(Duration::from_millis(50)).await;
        (base_url, handle)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    fn rpc_result(body: &Value, result: Value) -> Response {
        Json(json!({ "jsonrpc": "2.0", "id": body["id"], "result": result })).into_response()
    }

    #[test]
    fn test_rpc_client_invalid_scheme() {
        let err = RpcClient::new("ftp://example.com").err().unwrap();
        assert!(matches!(err, Error::InvalidScheme(_)));
        assert_eq!(
            err.to_string(),
            "invalid URL scheme: ftp (expected http or https)"
        );
        assert!(RpcClient::new("https://api.devnet.solana.com").is_ok());
    }

    #[tokio::test]
    async fn test_get_account_info_decodes_and_retries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/",
                post(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>,
                     Json(body): Json<Value>| async move {
                        let attempt = counter.fetch_add(1, Ordering::SeqCst);
                        if attempt < 2 {
                            return AxumStatusCode::SERVICE_UNAVAILABLE.into_response();
                        }
                        assert_eq!(body["method"], "getAccountInfo");
                        assert_eq!(body["params"][1]["encoding"], "base64");
                        rpc_result(
                            &body,
                            json!({
                                "context": { "slot": 1 },
                                "value": {
                                    "lamports": 1_500_000_000u64,
                                    "owner": "3VWxtZ5CCjG2eKH1FNQxDkCKU57QMk5SZ61Gx6pcsHne",
                                    "data": [STANDARD.encode([1u8, 2, 3]), "base64"],
                                    "executable": false,
                                    "rentEpoch": 0
                                }
                            }),
                        )
                    },
                ),
            )
            .with_state(counter.clone());
        let (base_url, handle) = serve_router(router).await;

        let client = RpcClient::new(&base_url)
            .unwrap()
            .with_retry_policy(fast_retry());
        let record = client
            .get_account_info(&Address::new([1u8; 32]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.lamports, 1_500_000_000);
        assert_eq!(record.data, vec![1, 2, 3]);
        assert_eq!(record.owner, tableside_types::PROGRAM_ID);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_get_account_info_absent() {
        let router = Router::new().route(
            "/",
            post(|Json(body): Json<Value>| async move {
                rpc_result(&body, json!({ "context": { "slot": 1 }, "value": null }))
            }),
        );
        let (base_url, handle) = serve_router(router).await;

        let client = RpcClient::new(&base_url).unwrap();
        let record = client
            .get_account_info(&Address::new([1u8; 32]))
            .await
            .unwrap();
        assert!(record.is_none());

        handle.abort();
    }

    #[tokio::test]
    async fn test_rpc_errors_are_not_retried() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/",
                post(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>,
                     Json(body): Json<Value>| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Json(json!({
                            "jsonrpc": "2.0",
                            "id": body["id"],
                            "error": {
                                "code": -32602,
                                "message": "Invalid param: WrongSize",
                                "data": { "logs": ["Program log: first", "Program log: second"] }
                            }
                        }))
                    },
                ),
            )
            .with_state(counter.clone());
        let (base_url, handle) = serve_router(router).await;

        let client = RpcClient::new(&base_url)
            .unwrap()
            .with_retry_policy(fast_retry());
        let err = client
            .get_account_info(&Address::new([1u8; 32]))
            .await
            .expect_err("rpc error should surface");
        let Error::Rpc { code, message } = err else {
            panic!("expected Rpc, got {err:?}");
        };
        assert_eq!(code, -32602);
        assert!(message.starts_with("Invalid param: WrongSize"));
        assert!(message.contains("Program log: second"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_wait_for_confirmation_polls_until_commitment() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/",
                post(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>,
                     Json(body): Json<Value>| async move {
                        assert_eq!(body["method"], "getSignatureStatuses");
                        let poll = counter.fetch_add(1, Ordering::SeqCst);
                        let status = match poll {
                            0 => Value::Null,
                            1 => json!({ "slot": 5, "confirmations": 0, "err": null, "confirmationStatus": "processed" }),
                            _ => json!({ "slot": 5, "confirmations": 1, "err": null, "confirmationStatus": "confirmed" }),
                        };
                        rpc_result(&body, json!({ "context": { "slot": 5 }, "value": [status] }))
                    },
                ),
            )
            .with_state(counter.clone());
        let (base_url, handle) = serve_router(router).await;

        let client = RpcClient::new(&base_url)
            .unwrap()
            .with_confirm_timing(Duration::from_secs(5), Duration::from_millis(5));
        client
            .wait_for_confirmation(&TransactionId::new("sig"), Commitment::Confirmed)
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_wait_for_confirmation_reports_failures_and_timeouts() {
        let router = Router::new().route(
            "/",
            post(|Json(body): Json<Value>| async move {
                let signature = body["params"][0][0].as_str().unwrap_or_default().to_string();
                let status = if signature == "failed" {
                    json!({ "slot": 5, "confirmations": 1, "err": { "InstructionError": [0, { "Custom": 6000 }] }, "confirmationStatus": "confirmed" })
                } else {
                    Value::Null
                };
                rpc_result(&body, json!({ "context": { "slot": 5 }, "value": [status] }))
            }),
        );
        let (base_url, handle) = serve_router(router).await;

        let client = RpcClient::new(&base_url)
            .unwrap()
            .with_confirm_timing(Duration::from_millis(30), Duration::from_millis(5));
        let err = client
            .wait_for_confirmation(&TransactionId::new("failed"), Commitment::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransactionFailed { .. }));
        assert!(err.to_string().contains("6000"));

        let err = client
            .wait_for_confirmation(&TransactionId::new("missing"), Commitment::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfirmTimeout { .. }));

        handle.abort();
    }
}
