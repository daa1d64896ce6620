use crate::{
    console::Options,
    ledger::Commitment,
    rpc::{RetryPolicy, RpcClient},
    snapshot::DEFAULT_FETCH_CONCURRENCY,
};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};
use tableside_types::{Address, Deriver, PROGRAM_ID};
use thiserror::Error;
use tracing::Level;
use url::Url;

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_CONFIRM_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: usize = 4;
pub const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 200;
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 2_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Console configuration, typically loaded from YAML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Signing service; without one the console is read-only.
    #[serde(default)]
    pub wallet_url: Option<String>,
    #[serde(default = "default_program_id")]
    pub program_id: String,
    #[serde(default)]
    pub commitment: Commitment,

    /// Pause between confirmation and the post-operation refresh.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    #[serde(default = "default_confirm_poll_interval_ms")]
    pub confirm_poll_interval_ms: u64,

    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: usize,
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,
    /// Keep resolved vault owners across refreshes.
    #[serde(default)]
    pub persist_owner_cache: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            wallet_url: None,
            program_id: default_program_id(),
            commitment: Commitment::default(),
            settle_delay_ms: default_settle_delay_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            confirm_poll_interval_ms: default_confirm_poll_interval_ms(),
            fetch_concurrency: default_fetch_concurrency(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_initial_backoff_ms: default_retry_initial_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            persist_owner_cache: false,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: usize },
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("{field} URL scheme must be http or https: {value}")]
    InvalidUrlScheme { field: &'static str, value: String },
    #[error("{field} must be a base58 address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("retry_initial_backoff_ms ({initial}) exceeds retry_max_backoff_ms ({max})")]
    BackoffOrder { initial: u64, max: u64 },
}

#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub rpc_url: Url,
    pub wallet_url: Option<Url>,
    pub program_id: Address,
    pub commitment: Commitment,
    pub settle_delay: Duration,
    pub confirm_timeout: Duration,
    pub confirm_poll_interval: Duration,
    pub fetch_concurrency: usize,
    pub retry_policy: RetryPolicy,
    pub persist_owner_cache: bool,
    pub log_level: Level,
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_program_id() -> String {
    PROGRAM_ID.to_string()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_confirm_timeout_ms() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT_MS
}

fn default_confirm_poll_interval_ms() -> u64 {
    DEFAULT_CONFIRM_POLL_INTERVAL_MS
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

fn default_retry_max_attempts() -> usize {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

fn default_retry_initial_backoff_ms() -> u64 {
    DEFAULT_RETRY_INITIAL_BACKOFF_MS
}

fn default_retry_max_backoff_ms() -> u64 {
    DEFAULT_RETRY_MAX_BACKOFF_MS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn ensure_nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn ensure_nonzero_u64(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value: 0 });
    }
    Ok(())
}

fn validate_http_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(ConfigError::InvalidUrlScheme {
                field,
                value: value.to_string(),
            })
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
    Ok(url)
}

impl Config {
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let rpc_url = validate_http_url("rpc_url", &self.rpc_url)?;
        let wallet_url = self
            .wallet_url
            .as_deref()
            .map(|value| validate_http_url("wallet_url", value))
            .transpose()?;
        let program_id =
            Address::from_str(&self.program_id).map_err(|_| ConfigError::InvalidAddress {
                field: "program_id",
                value: self.program_id.clone(),
            })?;
        ensure_nonzero_u64("confirm_timeout_ms", self.confirm_timeout_ms)?;
        ensure_nonzero_u64("confirm_poll_interval_ms", self.confirm_poll_interval_ms)?;
        ensure_nonzero("fetch_concurrency", self.fetch_concurrency)?;
        ensure_nonzero("retry_max_attempts", self.retry_max_attempts)?;
        if self.retry_initial_backoff_ms > self.retry_max_backoff_ms {
            return Err(ConfigError::BackoffOrder {
                initial: self.retry_initial_backoff_ms,
                max: self.retry_max_backoff_ms,
            });
        }
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        Ok(ValidatedConfig {
            rpc_url,
            wallet_url,
            program_id,
            commitment: self.commitment,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            confirm_timeout: Duration::from_millis(self.confirm_timeout_ms),
            confirm_poll_interval: Duration::from_millis(self.confirm_poll_interval_ms),
            fetch_concurrency: self.fetch_concurrency,
            retry_policy: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
            },
            persist_owner_cache: self.persist_owner_cache,
            log_level,
        })
    }
}

impl ValidatedConfig {
    /// Ledger client for the configured endpoint.
    pub fn rpc_client(&self) -> crate::Result<RpcClient> {
        Ok(RpcClient::new(self.rpc_url.as_str())?
            .with_commitment(self.commitment)
            .with_retry_policy(self.retry_policy)
            .with_confirm_timing(self.confirm_timeout, self.confirm_poll_interval))
    }

    pub fn console_options(&self) -> Options {
        Options {
            deriver: Deriver::new(self.program_id),
            commitment: self.commitment,
            settle_delay: self.settle_delay,
            fetch_concurrency: self.fetch_concurrency,
            persist_owner_cache: self.persist_owner_cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());

        let validated = config.validate().unwrap();
        assert_eq!(validated.rpc_url.as_str(), "https://api.devnet.solana.com/");
        assert_eq!(validated.program_id, PROGRAM_ID);
        assert_eq!(validated.commitment, Commitment::Confirmed);
        assert_eq!(validated.settle_delay, Duration::from_secs(1));
        assert_eq!(validated.retry_policy, RetryPolicy::default());
        assert_eq!(validated.log_level, Level::INFO);
        assert!(validated.wallet_url.is_none());

        let options = validated.console_options();
        assert_eq!(options.deriver.program_id(), &PROGRAM_ID);
        assert!(!options.persist_owner_cache);
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
rpc_url: "http://127.0.0.1:8899"
wallet_url: "http://127.0.0.1:3030"
commitment: finalized
settle_delay_ms: 0
fetch_concurrency: 2
persist_owner_cache: true
log_level: debug
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let validated = config.validate().unwrap();
        assert_eq!(validated.commitment, Commitment::Finalized);
        assert_eq!(validated.settle_delay, Duration::ZERO);
        assert_eq!(validated.fetch_concurrency, 2);
        assert!(validated.persist_owner_cache);
        assert_eq!(validated.log_level, Level::DEBUG);
        assert_eq!(
            validated.wallet_url.as_ref().map(Url::as_str),
            Some("http://127.0.0.1:3030/")
        );
        assert!(validated.rpc_client().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let config = Config {
            rpc_url: "ws://localhost:8900".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrlScheme { field: "rpc_url", .. })
        ));

        let config = Config {
            wallet_url: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { field: "wallet_url", .. })
        ));

        let config = Config {
            program_id: "0OIl".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { .. })
        ));

        let config = Config {
            fetch_concurrency: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNonZero {
                field: "fetch_concurrency",
                ..
            })
        ));

        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));

        let config = Config {
            retry_initial_backoff_ms: 5_000,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BackoffOrder { .. })
        ));
    }
}
