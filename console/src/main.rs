//! Operator console for the table program.
//!
//! Usage:
//!   tableside --config console.yaml snapshot
//!   tableside --wallet-url http://localhost:3030 deposit 0 0.25
//!   tableside derive vault <IDENTITY>

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{path::PathBuf, process::ExitCode, time::Duration};
use tableside_client::{
    Config, Console, Error as ClientError, ErrorKind, HttpWallet, Receipt, RpcClient, Snapshot,
    TransactionId, ValidatedConfig, Wallet,
};
use tableside_types::{
    Address, Deriver, Instruction, Operation, RecordKey, RecordKind, TokenBalance,
    DEFAULT_TEMPLATE,
};
use tracing::{info, warn};

mod amount;

use amount::{format_amount, parse_amount};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and operate tables on the ledger program")]
struct Args {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    rpc_url: Option<String>,

    /// Signing service; required for every mutating command.
    #[arg(long)]
    wallet_url: Option<String>,

    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh snapshot as JSON.
    Snapshot,
    /// Derive the address of a record.
    Derive {
        kind: RecordKind,
        /// Template name, owner identity or table id, depending on the kind.
        seed: Option<String>,
    },
    /// Refresh periodically and print a summary of each snapshot.
    Watch {
        /// Seconds between refreshes.
        #[arg(long, default_value = "5")]
        interval: u64,
    },
    InitTreasury,
    InitTemplate,
    /// Deposit into the caller's vault.
    Fund {
        #[arg(value_parser = parse_amount)]
        amount: u64,
    },
    /// Withdraw from the caller's vault.
    Withdraw {
        #[arg(value_parser = parse_amount)]
        amount: u64,
    },
    OpenTable,
    Join {
        table: u64,
    },
    /// Buy in at a table the caller is seated at.
    Deposit {
        table: u64,
        #[arg(value_parser = parse_amount)]
        amount: u64,
    },
    Leave {
        table: u64,
    },
    CollectRent {
        table: u64,
    },
    /// Set token balances, given as `<vault>=<tokens>`.
    Redistribute {
        table: u64,
        #[arg(required = true, value_parser = parse_balance)]
        balances: Vec<TokenBalance>,
    },
    Kick {
        table: u64,
        vault: Address,
    },
    WithdrawTreasury {
        #[arg(value_parser = parse_amount)]
        amount: u64,
        destination: Address,
    },
}

impl Command {
    fn operation(&self) -> Option<Operation> {
        Some(match self {
            Command::Snapshot | Command::Derive { .. } | Command::Watch { .. } => return None,
            Command::InitTreasury => Operation::InitializeTreasury,
            Command::InitTemplate => Operation::InitializeTemplate,
            Command::Fund { amount } => Operation::FundVault { amount: *amount },
            Command::Withdraw { amount } => Operation::WithdrawVault { amount: *amount },
            Command::OpenTable => Operation::OpenTable,
            Command::Join { table } => Operation::JoinTable { table_id: *table },
            Command::Deposit { table, amount } => Operation::DepositToTable {
                table_id: *table,
                amount: *amount,
            },
            Command::Leave { table } => Operation::LeaveTable { table_id: *table },
            Command::CollectRent { table } => Operation::CollectRent { table_id: *table },
            Command::Redistribute { table, balances } => Operation::RedistributeTokens {
                table_id: *table,
                balances: balances.clone(),
            },
            Command::Kick { table, vault } => Operation::KickOccupant {
                table_id: *table,
                player_vault: *vault,
            },
            Command::WithdrawTreasury {
                amount,
                destination,
            } => Operation::WithdrawTreasury {
                amount: *amount,
                destination: *destination,
            },
        })
    }
}

fn parse_balance(value: &str) -> Result<TokenBalance, String> {
    let (vault, tokens) = value
        .split_once('=')
        .ok_or_else(|| format!("expected <vault>=<tokens>: {value:?}"))?;
    Ok(TokenBalance {
        player_vault: vault.parse().map_err(|err| format!("{err}"))?,
        tokens: tokens
            .trim()
            .parse()
            .map_err(|_| format!("invalid token count: {tokens:?}"))?,
    })
}

/// The connected signing service, if one was configured.
#[derive(Clone)]
enum Signer {
    Http(HttpWallet),
    Disconnected,
}

impl Wallet for Signer {
    fn identity(&self) -> Option<Address> {
        match self {
            Signer::Http(wallet) => wallet.identity(),
            Signer::Disconnected => None,
        }
    }

    async fn sign_and_submit(
        &self,
        instruction: &Instruction,
    ) -> tableside_client::Result<TransactionId> {
        match self {
            Signer::Http(wallet) => wallet.sign_and_submit(instruction).await,
            Signer::Disconnected => Err(ClientError::NotAuthorized),
        }
    }
}

fn load_config(args: &Args) -> Result<ValidatedConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_yaml::from_str::<Config>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(wallet_url) = &args.wallet_url {
        config.wallet_url = Some(wallet_url.clone());
    }
    config.validate().context("invalid configuration")
}

fn derive_key(kind: RecordKind, seed: Option<&str>) -> Result<RecordKey> {
    let table_id = || -> Result<u64> {
        seed.ok_or_else(|| anyhow!("{kind} needs a table id"))?
            .parse()
            .context("invalid table id")
    };
    Ok(match kind {
        RecordKind::Treasury => RecordKey::Treasury,
        RecordKind::TableCounter => RecordKey::TableCounter,
        RecordKind::Template => RecordKey::Template(seed.unwrap_or(DEFAULT_TEMPLATE).to_string()),
        RecordKind::PlayerVault => RecordKey::PlayerVault(
            seed.ok_or_else(|| anyhow!("{kind} needs an owner identity"))?
                .parse()
                .context("invalid owner identity")?,
        ),
        RecordKind::TableVault => RecordKey::TableVault(table_id()?),
        RecordKind::Dealer => RecordKey::Dealer(table_id()?),
    })
}

#[derive(Serialize)]
struct Derived {
    kind: RecordKind,
    key: String,
    address: Address,
    bump: u8,
}

#[derive(Serialize)]
struct TableSummary {
    table_id: u64,
    occupied: usize,
    max_players: u8,
    max_buy_in: String,
    tokens_issued: Option<u64>,
    balanced: Option<bool>,
}

#[derive(Serialize)]
struct Summary {
    version: u64,
    identity: Option<Address>,
    treasury: Option<String>,
    vault: Option<String>,
    available: Option<String>,
    seated_at: Option<u64>,
    table_counter: Option<u64>,
    skipped_tables: Vec<u64>,
    tables: Vec<TableSummary>,
}

fn summarize(snapshot: &Snapshot) -> Summary {
    Summary {
        version: snapshot.version,
        identity: snapshot.identity,
        treasury: snapshot
            .treasury
            .as_ref()
            .map(|treasury| format_amount(treasury.balance)),
        vault: snapshot
            .vault
            .as_ref()
            .map(|vault| format_amount(vault.total_balance)),
        available: snapshot
            .vault
            .as_ref()
            .map(|vault| format_amount(vault.available_balance)),
        seated_at: snapshot
            .vault
            .as_ref()
            .and_then(|vault| vault.current_table_id.filter(|_| vault.is_seated)),
        table_counter: snapshot.table_counter,
        skipped_tables: snapshot.skipped_tables.clone(),
        tables: snapshot
            .tables
            .iter()
            .map(|table| {
                let dealer = snapshot.dealer(table.table_id);
                TableSummary {
                    table_id: table.table_id,
                    occupied: table.occupied(),
                    max_players: table.max_players,
                    max_buy_in: format_amount(table.max_buy_in),
                    tokens_issued: dealer.map(|dealer| dealer.total_tokens_issued),
                    balanced: dealer.map(|dealer| dealer.is_balanced),
                }
            })
            .collect(),
    }
}

async fn watch(console: &Console<RpcClient, Signer>, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match console.refresh().await {
                    Ok(snapshot) => println!("{}", serde_json::to_string(&summarize(&snapshot))?),
                    Err(err) => warn!(kind = %err.kind(), error = %err, "refresh failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                return Ok(());
            }
        }
    }
}

fn print_receipt(receipt: &Receipt) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(receipt)?);
    match &receipt.snapshot {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&summarize(snapshot))?),
        None => eprintln!("confirmed, but the follow-up refresh failed; run `snapshot` to see the result"),
    }
    Ok(())
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(&args)?;
    init_tracing(&config, args.json_logs);

    if let Command::Derive { kind, seed } = &args.command {
        let key = derive_key(*kind, seed.as_deref())?;
        let (address, bump) = Deriver::new(config.program_id)
            .derive_with_bump(&key)
            .context("failed to derive address")?;
        let derived = Derived {
            kind: *kind,
            key: key.to_string(),
            address,
            bump,
        };
        println!("{}", serde_json::to_string_pretty(&derived)?);
        return Ok(ExitCode::SUCCESS);
    }

    let ledger = config.rpc_client().context("failed to create ledger client")?;
    let signer = match &config.wallet_url {
        Some(url) => Signer::Http(
            HttpWallet::connect(url.as_str())
                .await
                .context("failed to connect to wallet")?,
        ),
        None => Signer::Disconnected,
    };
    let console = Console::new(ledger, signer, config.console_options());

    let Some(operation) = args.command.operation() else {
        return match args.command {
            Command::Watch { interval } => {
                watch(&console, Duration::from_secs(interval.max(1))).await?;
                Ok(ExitCode::SUCCESS)
            }
            _ => {
                let snapshot = console.refresh().await.context("refresh failed")?;
                println!("{}", serde_json::to_string_pretty(&*snapshot)?);
                Ok(ExitCode::SUCCESS)
            }
        };
    };

    // Pre-checks run against the latest snapshot; without one the program decides.
    if let Err(err) = console.refresh().await {
        warn!(error = %err, "initial refresh failed, submitting without local checks");
    }
    match console.execute(operation).await {
        Ok(receipt) => {
            print_receipt(&receipt)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.kind() == ErrorKind::UserCancelled => {
            println!("{}", err.user_message());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{} ({})", err.user_message(), err.kind());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_tracing(config: &ValidatedConfig, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_balance() {
        let vault = Address::new([3u8; 32]);
        let balance = parse_balance(&format!("{vault}=2500")).unwrap();
        assert_eq!(balance.player_vault, vault);
        assert_eq!(balance.tokens, 2_500);
        assert!(parse_balance("2500").is_err());
        assert!(parse_balance(&format!("{vault}=lots")).is_err());
    }

    #[test]
    fn test_cli_builds_operations() {
        let args = Args::try_parse_from(["tableside", "deposit", "3", "0.25"]).unwrap();
        assert_eq!(
            args.command.operation(),
            Some(Operation::DepositToTable {
                table_id: 3,
                amount: 250_000_000,
            })
        );
        let args = Args::try_parse_from(["tableside", "snapshot"]).unwrap();
        assert_eq!(args.command.operation(), None);
        assert!(Args::try_parse_from(["tableside", "fund", "1.5.0"]).is_err());
        assert!(Args::try_parse_from(["tableside", "redistribute", "0"]).is_err());
    }

    #[test]
    fn test_derive_key() {
        assert_eq!(
            derive_key(RecordKind::Template, None).unwrap(),
            RecordKey::Template(DEFAULT_TEMPLATE.to_string())
        );
        assert_eq!(
            derive_key(RecordKind::Dealer, Some("4")).unwrap(),
            RecordKey::Dealer(4)
        );
        assert!(derive_key(RecordKind::TableVault, None).is_err());
        assert!(derive_key(RecordKind::PlayerVault, Some("nope")).is_err());
    }

    #[test]
    fn test_summary_formats_amounts() {
        let snapshot = Snapshot {
            version: 2,
            ..Default::default()
        };
        let summary = summarize(&snapshot);
        assert_eq!(summary.version, 2);
        assert!(summary.tables.is_empty());
        assert!(summary.treasury.is_none());
    }
}
