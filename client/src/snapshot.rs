//! Snapshot assembly.
//!
//! A refresh reads the counter, treasury, template and caller vault, then every table id below
//! the counter with its dealer, then the owner behind every distinct vault address seen in any
//! seat or token entry. The result is an immutable [Snapshot]; a newer one replaces it whole.

use crate::{
    fetcher::{Account, Fetcher},
    ledger::Ledger,
    Result,
};
use futures::{future::try_join4, stream, StreamExt};
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Mutex,
};
use tableside_types::{
    Address, Dealer, Deriver, PlayerVault, TableCounter, TableVault, Template, Treasury,
    DEFAULT_TEMPLATE, MAX_SEATS,
};
use tracing::{debug, warn};

/// Default number of concurrent record fetches per refresh.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreasuryView {
    pub address: Address,
    pub authority: Address,
    pub total_collected: u64,
    /// Live native balance of the treasury account.
    pub balance: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TemplateView {
    pub address: Address,
    pub name: String,
    pub min_buy_in: u64,
    pub max_buy_in: u64,
    pub max_players: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VaultView {
    pub address: Address,
    pub owner: Address,
    pub is_seated: bool,
    pub is_ready: bool,
    pub current_table_id: Option<u64>,
    pub buy_in_amount: u64,
    pub total_balance: u64,
    pub available_balance: u64,
}

/// Identity behind a seated vault address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", content = "owner", rename_all = "snake_case")]
pub enum OwnerResolution {
    Resolved(Address),
    /// The vault could not be read (absent or failed); shown as pending.
    Unresolved,
}

impl OwnerResolution {
    pub fn owner(&self) -> Option<Address> {
        match self {
            OwnerResolution::Resolved(owner) => Some(*owner),
            OwnerResolution::Unresolved => None,
        }
    }
}

/// An occupied seat joined with its token entry (matched by vault address).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeatView {
    pub seat: usize,
    pub player_vault: Address,
    pub owner: OwnerResolution,
    /// `None` when the dealer has no entry for this vault (e.g. joined but not bought in).
    pub tokens: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenEntryView {
    pub slot: usize,
    pub player_vault: Address,
    pub tokens: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DealerView {
    pub address: Address,
    pub table_id: u64,
    pub authority: Address,
    pub entries: Vec<TokenEntryView>,
    pub total_tokens_issued: u64,
    /// Whether entry balances add up to `total_tokens_issued`, as reported by the ledger.
    pub is_balanced: bool,
}

impl DealerView {
    pub fn tokens_of(&self, player_vault: &Address) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| &entry.player_vault == player_vault)
            .map(|entry| entry.tokens)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub table_id: u64,
    pub address: Address,
    pub owner: Address,
    pub template_name: String,
    pub max_players: u8,
    pub min_buy_in: u64,
    pub max_buy_in: u64,
    pub creation_fee: u64,
    pub start_fee: u64,
    /// Live native balance of the table account.
    pub balance: u64,
    pub seats: [Option<Address>; MAX_SEATS],
    pub seating: Vec<SeatView>,
    /// Dealer entries whose vault no longer holds a seat.
    pub orphaned_entries: Vec<TokenEntryView>,
}

impl TableView {
    pub fn occupied(&self) -> usize {
        self.seating.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seating.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.occupied() >= usize::from(self.max_players).min(MAX_SEATS)
    }

    pub fn seat_of(&self, player_vault: &Address) -> Option<&SeatView> {
        self.seating
            .iter()
            .find(|seat| &seat.player_vault == player_vault)
    }
}

/// One immutable, internally consistent view of the program's records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Strictly increasing per published snapshot; 0 before the first refresh.
    pub version: u64,
    pub identity: Option<Address>,
    pub treasury: Option<TreasuryView>,
    pub template: Option<TemplateView>,
    /// Derived address of the caller's vault (present whenever an identity is).
    pub vault_address: Option<Address>,
    pub vault: Option<VaultView>,
    /// `None` when the counter does not exist (no tables yet).
    pub table_counter: Option<u64>,
    pub tables: Vec<TableView>,
    /// Ids below the counter whose table was absent or failed to load.
    pub skipped_tables: Vec<u64>,
    pub dealers: BTreeMap<u64, DealerView>,
    pub owners: BTreeMap<Address, OwnerResolution>,
}

impl Snapshot {
    /// Whether a refresh has completed.
    pub fn is_loaded(&self) -> bool {
        self.version > 0
    }

    pub fn table(&self, table_id: u64) -> Option<&TableView> {
        self.tables
            .binary_search_by_key(&table_id, |table| table.table_id)
            .ok()
            .map(|index| &self.tables[index])
    }

    pub fn dealer(&self, table_id: u64) -> Option<&DealerView> {
        self.dealers.get(&table_id)
    }

    pub fn owner_of(&self, player_vault: &Address) -> Option<OwnerResolution> {
        self.owners.get(player_vault).copied()
    }

    /// Tokens the caller holds at `table_id`, when the dealer has an entry for the caller's vault.
    pub fn caller_tokens(&self, table_id: u64) -> Option<u64> {
        let vault = self.vault_address?;
        self.dealer(table_id)?.tokens_of(&vault)
    }

    /// Whether `identity` is the treasury authority; `None` when the treasury is unknown.
    pub fn is_authority(&self, identity: &Address) -> Option<bool> {
        self.treasury
            .as_ref()
            .map(|treasury| &treasury.authority == identity)
    }
}

/// Join seats with dealer entries by vault address.
///
/// Slots in the two arrays are assigned independently, so index position carries no meaning.
/// Returns the reconciled seating and the entries no longer backed by a seat.
pub fn reconcile(
    seats: &[Option<Address>],
    dealer: Option<&Dealer>,
    owners: &BTreeMap<Address, OwnerResolution>,
) -> (Vec<SeatView>, Vec<TokenEntryView>) {
    let mut entries: HashMap<Address, (usize, u64)> = HashMap::new();
    if let Some(dealer) = dealer {
        for (slot, vault, tokens) in dealer.entries() {
            entries.entry(vault).or_insert((slot, tokens));
        }
    }

    let mut seated = BTreeSet::new();
    let seating: Vec<SeatView> = seats
        .iter()
        .enumerate()
        .filter_map(|(seat, occupant)| occupant.map(|vault| (seat, vault)))
        .map(|(seat, vault)| {
            seated.insert(vault);
            SeatView {
                seat,
                player_vault: vault,
                owner: owners
                    .get(&vault)
                    .copied()
                    .unwrap_or(OwnerResolution::Unresolved),
                tokens: entries.get(&vault).map(|(_, tokens)| *tokens),
            }
        })
        .collect();

    let orphaned_entries: Vec<TokenEntryView> = dealer
        .map(|dealer| {
            dealer
                .entries()
                .filter(|(_, vault, _)| !seated.contains(vault))
                .map(|(slot, player_vault, tokens)| TokenEntryView {
                    slot,
                    player_vault,
                    tokens,
                })
                .collect()
        })
        .unwrap_or_default();

    (seating, orphaned_entries)
}

fn dealer_view(account: &Account<Dealer>) -> DealerView {
    let dealer = &account.record;
    DealerView {
        address: account.address,
        table_id: dealer.table_id,
        authority: dealer.authority,
        entries: dealer
            .entries()
            .map(|(slot, player_vault, tokens)| TokenEntryView {
                slot,
                player_vault,
                tokens,
            })
            .collect(),
        total_tokens_issued: dealer.total_tokens_issued,
        is_balanced: dealer.is_balanced(),
    }
}

fn vault_view(account: &Account<PlayerVault>) -> VaultView {
    let vault = &account.record;
    let available_balance = if vault.is_seated {
        vault.available_balance(account.lamports)
    } else {
        account.lamports
    };
    VaultView {
        address: account.address,
        owner: vault.owner,
        is_seated: vault.is_seated,
        is_ready: vault.is_ready,
        current_table_id: vault.current_table_id,
        buy_in_amount: vault.buy_in_amount,
        total_balance: account.lamports,
        available_balance,
    }
}

type LoadedTable = (Account<TableVault>, Option<Account<Dealer>>);

/// Builds snapshots from ledger reads.
pub struct Assembler<L: Ledger> {
    fetcher: Fetcher<L>,
    deriver: Deriver,
    concurrency: usize,
    owner_cache: Option<Mutex<HashMap<Address, Address>>>,
}

impl<L: Ledger> Assembler<L> {
    pub fn new(ledger: L, deriver: Deriver) -> Self {
        Self {
            fetcher: Fetcher::new(ledger),
            deriver,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            owner_cache: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Keep resolved vault owners across refreshes. A vault's owner never changes once created.
    pub fn with_persistent_owner_cache(mut self, enabled: bool) -> Self {
        self.owner_cache = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn fetcher(&self) -> &Fetcher<L> {
        &self.fetcher
    }

    /// Read everything and build a snapshot stamped with `version`.
    pub async fn assemble(&self, identity: Option<Address>, version: u64) -> Result<Snapshot> {
        let counter_address = self.deriver.table_counter()?;
        let treasury_address = self.deriver.treasury()?;
        let template_address = self.deriver.template(DEFAULT_TEMPLATE)?;
        let vault_address = identity
            .map(|identity| self.deriver.player_vault(&identity))
            .transpose()?;

        let (counter, treasury, template, vault) = try_join4(
            self.fetcher.fetch::<TableCounter>(&counter_address),
            self.fetcher.fetch::<Treasury>(&treasury_address),
            self.fetcher.fetch::<Template>(&template_address),
            async {
                match &vault_address {
                    Some(address) => self.fetcher.fetch::<PlayerVault>(address).await,
                    None => Ok(None),
                }
            },
        )
        .await?;

        let table_counter = counter.map(|counter| counter.record.count);
        let (loaded, skipped_tables) = match table_counter {
            Some(count) => self.load_tables(count).await,
            None => {
                debug!("table counter absent, no tables");
                (Vec::new(), Vec::new())
            }
        };

        // Every distinct vault address seen in a seat or a token entry, fetched once.
        let mut pending = BTreeSet::new();
        for (table, dealer) in &loaded {
            pending.extend(table.record.occupants().map(|(_, vault)| vault));
            if let Some(dealer) = dealer {
                pending.extend(dealer.record.entries().map(|(_, vault, _)| vault));
            }
        }
        let mut owners = BTreeMap::new();
        if let Some(vault) = &vault {
            // Already read above.
            if pending.remove(&vault.address) {
                owners.insert(vault.address, OwnerResolution::Resolved(vault.record.owner));
            }
        }
        self.resolve_owners(pending, &mut owners).await;

        let mut dealers = BTreeMap::new();
        let mut tables = Vec::with_capacity(loaded.len());
        for (table, dealer) in &loaded {
            let (seating, orphaned_entries) = reconcile(
                &table.record.players,
                dealer.as_ref().map(|dealer| &dealer.record),
                &owners,
            );
            if !orphaned_entries.is_empty() {
                debug!(
                    table_id = table.record.table_id,
                    orphaned = orphaned_entries.len(),
                    "dealer entries without a seat"
                );
            }
            if let Some(dealer) = dealer {
                dealers.insert(table.record.table_id, dealer_view(dealer));
            }
            let record = &table.record;
            tables.push(TableView {
                table_id: record.table_id,
                address: table.address,
                owner: record.owner,
                template_name: record.template_name.clone(),
                max_players: record.max_players,
                min_buy_in: record.min_buy_in,
                max_buy_in: record.max_buy_in,
                creation_fee: record.creation_fee,
                start_fee: record.start_fee,
                balance: table.lamports,
                seats: record.players,
                seating,
                orphaned_entries,
            });
        }
        tables.sort_by_key(|table| table.table_id);

        Ok(Snapshot {
            version,
            identity,
            treasury: treasury.map(|account| TreasuryView {
                address: account.address,
                authority: account.record.authority,
                total_collected: account.record.total_collected,
                balance: account.lamports,
            }),
            template: template.map(|account| TemplateView {
                address: account.address,
                name: account.record.name,
                min_buy_in: account.record.min_buy_in,
                max_buy_in: account.record.max_buy_in,
                max_players: account.record.max_players,
            }),
            vault_address,
            vault: vault.as_ref().map(vault_view),
            table_counter,
            tables,
            skipped_tables,
            dealers,
            owners,
        })
    }

    /// Load tables `0..count` with their dealers. Absent or failing tables are skipped.
    async fn load_tables(&self, count: u64) -> (Vec<LoadedTable>, Vec<u64>) {
        let results: Vec<(u64, Result<Option<LoadedTable>>)> = stream::iter(0..count)
            .map(|table_id| async move { (table_id, self.load_table(table_id).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut loaded = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (table_id, result) in results {
            match result {
                Ok(Some(table)) => loaded.push(table),
                Ok(None) => {
                    warn!(table_id, "table reserved but absent, skipping");
                    skipped.push(table_id);
                }
                Err(err) => {
                    warn!(table_id, error = %err, "failed to load table, skipping");
                    skipped.push(table_id);
                }
            }
        }
        (loaded, skipped)
    }

    async fn load_table(&self, table_id: u64) -> Result<Option<LoadedTable>> {
        let table_address = self.deriver.table_vault(table_id)?;
        let Some(table) = self.fetcher.fetch::<TableVault>(&table_address).await? else {
            return Ok(None);
        };
        let dealer_address = self.deriver.dealer(table_id)?;
        let dealer = match self.fetcher.fetch::<Dealer>(&dealer_address).await {
            Ok(dealer) => dealer,
            Err(err) => {
                warn!(table_id, address = %dealer_address, error = %err, "failed to load dealer");
                None
            }
        };
        Ok(Some((table, dealer)))
    }

    async fn resolve_owners(
        &self,
        pending: BTreeSet<Address>,
        owners: &mut BTreeMap<Address, OwnerResolution>,
    ) {
        let mut to_fetch = Vec::with_capacity(pending.len());
        match &self.owner_cache {
            Some(cache) => {
                let cache = match cache.lock() {
                    Ok(cache) => cache,
                    Err(poisoned) => poisoned.into_inner(),
                };
                for vault in pending {
                    match cache.get(&vault) {
                        Some(owner) => {
                            owners.insert(vault, OwnerResolution::Resolved(*owner));
                        }
                        None => to_fetch.push(vault),
                    }
                }
            }
            None => to_fetch.extend(pending),
        }

        let resolved: Vec<(Address, OwnerResolution)> = stream::iter(to_fetch)
            .map(|vault| async move {
                let resolution = match self.fetcher.fetch::<PlayerVault>(&vault).await {
                    Ok(Some(account)) => OwnerResolution::Resolved(account.record.owner),
                    Ok(None) => {
                        debug!(address = %vault, "seat vault absent, owner unresolved");
                        OwnerResolution::Unresolved
                    }
                    Err(err) => {
                        warn!(address = %vault, error = %err, "failed to resolve seat owner");
                        OwnerResolution::Unresolved
                    }
                };
                (vault, resolution)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        if let Some(cache) = &self.owner_cache {
            let mut cache = match cache.lock() {
                Ok(cache) => cache,
                Err(poisoned) => poisoned.into_inner(),
            };
            for (vault, resolution) in &resolved {
                if let OwnerResolution::Resolved(owner) = resolution {
                    cache.insert(*vault, *owner);
                }
            }
        }
        owners.extend(resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tableside_types::TokenEntry;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    #[test]
    fn test_reconcile_joins_by_address_not_index() {
        let mut seats = [None; MAX_SEATS];
        seats[0] = Some(addr(1));
        seats[1] = Some(addr(2));
        seats[4] = Some(addr(3));

        let mut dealer = Dealer::default();
        // Slot order deliberately differs from seat order.
        dealer.players_tokens[0] = TokenEntry {
            player_vault: Some(addr(3)),
            tokens: 300,
        };
        dealer.players_tokens[5] = TokenEntry {
            player_vault: Some(addr(1)),
            tokens: 100,
        };
        dealer.players_tokens[6] = TokenEntry {
            player_vault: Some(addr(9)),
            tokens: 50,
        };

        let mut owners = BTreeMap::new();
        owners.insert(addr(1), OwnerResolution::Resolved(addr(11)));

        let (seating, orphaned) = reconcile(&seats, Some(&dealer), &owners);
        assert_eq!(seating.len(), 3);
        assert_eq!(seating[0].tokens, Some(100));
        assert_eq!(seating[0].owner, OwnerResolution::Resolved(addr(11)));
        assert_eq!(seating[1].tokens, None);
        assert_eq!(seating[1].owner, OwnerResolution::Unresolved);
        assert_eq!(seating[2].seat, 4);
        assert_eq!(seating[2].tokens, Some(300));
        assert_eq!(
            orphaned,
            vec![TokenEntryView {
                slot: 6,
                player_vault: addr(9),
                tokens: 50
            }]
        );
    }

    #[test]
    fn test_reconcile_without_dealer() {
        let mut seats = [None; MAX_SEATS];
        seats[2] = Some(addr(1));
        let (seating, orphaned) = reconcile(&seats, None, &BTreeMap::new());
        assert_eq!(seating.len(), 1);
        assert_eq!(seating[0].tokens, None);
        assert!(orphaned.is_empty());
    }

    #[test]
    fn test_snapshot_helpers() {
        let vault = addr(5);
        let mut snapshot = Snapshot {
            version: 2,
            identity: Some(addr(1)),
            vault_address: Some(vault),
            treasury: Some(TreasuryView {
                address: addr(2),
                authority: addr(1),
                total_collected: 0,
                balance: 0,
            }),
            ..Default::default()
        };
        snapshot.dealers.insert(
            3,
            DealerView {
                address: addr(3),
                table_id: 3,
                authority: addr(1),
                entries: vec![TokenEntryView {
                    slot: 0,
                    player_vault: vault,
                    tokens: 700,
                }],
                total_tokens_issued: 700,
                is_balanced: true,
            },
        );
        assert!(snapshot.is_loaded());
        assert_eq!(snapshot.caller_tokens(3), Some(700));
        assert_eq!(snapshot.caller_tokens(4), None);
        assert_eq!(snapshot.is_authority(&addr(1)), Some(true));
        assert_eq!(snapshot.is_authority(&addr(2)), Some(false));
        assert!(snapshot.table(3).is_none());
        assert!(!Snapshot::default().is_loaded());
    }

    #[test]
    fn test_owner_resolution_serializes_tagged() {
        let json = serde_json::to_value(OwnerResolution::Resolved(addr(1))).unwrap();
        assert_eq!(json["status"], "resolved");
        assert_eq!(json["owner"], addr(1).to_string());
        let json = serde_json::to_value(OwnerResolution::Unresolved).unwrap();
        assert_eq!(json["status"], "unresolved");
    }
}
