//! In-memory ledger and wallet.
//!
//! [MockLedger] stores raw records keyed by address and simulates the table program closely
//! enough to drive every operation: it enforces the same seating, buy-in, authority and
//! token-sum rules and reports violations with the program's own error codes. Fetches are
//! counted per address and can be made to fail.

use crate::{
    ledger::{Commitment, Ledger, RawRecord, TransactionId},
    wallet::Wallet,
    Error, Result,
};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use tableside_types::{
    decode_record, encode_record, native_to_tokens, tokens_to_native, Address, Dealer, Deriver,
    Instruction, PlayerVault, ProgramError, Record, RecordKey, TableCounter, TableVault, Template,
    TokenEntry, Treasury, DEFAULT_TEMPLATE, MAX_REDISTRIBUTION_ENTRIES, MAX_SEATS,
    MIN_TABLE_BUY_IN, MIN_VAULT_DEPOSIT, NATIVE_PER_DISPLAY_UNIT, PROGRAM_ID,
};

/// Balance given to every account the program creates.
pub const MOCK_RENT: u64 = 2_000_000;
pub const MOCK_CREATION_FEE: u64 = 10_000_000;
pub const MOCK_START_FEE: u64 = 1_000_000;
pub const MOCK_TEMPLATE_MAX_BUY_IN: u64 = NATIVE_PER_DISPLAY_UNIT;
pub const MOCK_TEMPLATE_MAX_PLAYERS: u8 = MAX_SEATS as u8;

const ACCOUNT_NOT_INITIALIZED: u32 = 3012;
const CONSTRAINT_SEEDS: u32 = 2006;

fn program_failure(error: ProgramError) -> String {
    format!(
        "Transaction simulation failed: Error processing Instruction 0: custom program error: {:#x}",
        error.code()
    )
}

fn framework_failure(account: &str, code: u32, name: &str) -> String {
    format!("AnchorError caused by account: {account}. Error Code: {name}. Error Number: {code}.")
}

fn not_initialized(account: &str) -> String {
    framework_failure(account, ACCOUNT_NOT_INITIALIZED, "AccountNotInitialized")
}

#[derive(Default)]
struct State {
    records: HashMap<Address, RawRecord>,
    /// Native balances of identities (accounts holding no record).
    balances: HashMap<Address, u64>,
    fetches: HashMap<Address, usize>,
    fetch_failures: HashMap<Address, String>,
    confirm_failure: Option<String>,
    submitted: HashSet<TransactionId>,
    next_signature: u64,
}

impl State {
    fn get<R: Record>(&self, address: &Address) -> Option<R> {
        let raw = self.records.get(address)?;
        decode_record(&raw.data).ok()
    }

    fn require<R: Record>(&self, address: &Address, account: &str) -> std::result::Result<R, String> {
        self.get(address).ok_or_else(|| not_initialized(account))
    }

    /// Write `record`, keeping the account's balance (or `MOCK_RENT` if it is new).
    fn put<R: Record>(&mut self, address: Address, record: &R) {
        let raw = self.records.entry(address).or_insert_with(|| RawRecord {
            lamports: MOCK_RENT,
            owner: PROGRAM_ID,
            data: Vec::new(),
        });
        raw.data = encode_record(record);
    }

    fn lamports(&self, address: &Address) -> u64 {
        match self.records.get(address) {
            Some(raw) => raw.lamports,
            None => self.balances.get(address).copied().unwrap_or(0),
        }
    }

    fn set_lamports(&mut self, address: Address, lamports: u64) {
        match self.records.get_mut(&address) {
            Some(raw) => raw.lamports = lamports,
            None => {
                self.balances.insert(address, lamports);
            }
        }
    }

    fn transfer(&mut self, from: Address, to: Address, amount: u64) -> std::result::Result<(), String> {
        let available = self.lamports(&from);
        if available < amount {
            return Err(format!(
                "Transfer: insufficient lamports {available}, need {amount}"
            ));
        }
        self.set_lamports(from, available - amount);
        let credited = self.lamports(&to).saturating_add(amount);
        self.set_lamports(to, credited);
        Ok(())
    }
}

/// Instruction arguments after the discriminator.
struct Args<'a>(&'a [u8]);

impl Args<'_> {
    fn take(&mut self, len: usize) -> std::result::Result<&[u8], String> {
        if self.0.len() < len {
            return Err("Program failed to complete: instruction data too short".to_string());
        }
        let (head, tail) = self.0.split_at(len);
        self.0 = tail;
        Ok(head)
    }

    fn u32(&mut self) -> std::result::Result<u32, String> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(bytes))
    }

    fn u64(&mut self) -> std::result::Result<u64, String> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    fn address(&mut self) -> std::result::Result<Address, String> {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(self.take(32)?);
        Ok(Address::new(bytes))
    }
}

/// In-memory [Ledger] with a simulated table program.
#[derive(Clone, Default)]
pub struct MockLedger {
    deriver: Deriver,
    state: Arc<Mutex<State>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn deriver(&self) -> &Deriver {
        &self.deriver
    }

    pub fn put_record<R: Record>(&self, address: Address, lamports: u64, record: &R) {
        self.put_raw(
            address,
            RawRecord {
                lamports,
                owner: *self.deriver.program_id(),
                data: encode_record(record),
            },
        );
    }

    pub fn put_raw(&self, address: Address, raw: RawRecord) {
        self.state().records.insert(address, raw);
    }

    pub fn remove(&self, address: &Address) -> Option<RawRecord> {
        self.state().records.remove(address)
    }

    pub fn record<R: Record>(&self, address: &Address) -> Option<R> {
        self.state().get(address)
    }

    /// Balance of a record account or an identity.
    pub fn lamports(&self, address: &Address) -> u64 {
        self.state().lamports(address)
    }

    pub fn fund_identity(&self, identity: Address, amount: u64) {
        let mut state = self.state();
        let balance = state.lamports(&identity).saturating_add(amount);
        state.set_lamports(identity, balance);
    }

    pub fn fetch_count(&self, address: &Address) -> usize {
        self.state().fetches.get(address).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.state().fetches.values().sum()
    }

    pub fn reset_fetch_counts(&self) {
        self.state().fetches.clear();
    }

    /// Make every fetch of `address` fail with `message`.
    pub fn fail_fetches(&self, address: Address, message: impl Into<String>) {
        self.state().fetch_failures.insert(address, message.into());
    }

    /// Make every confirmation report the transaction as failed with `message`.
    pub fn fail_confirmations(&self, message: impl Into<String>) {
        self.state().confirm_failure = Some(message.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fetch_failures.clear();
        state.confirm_failure = None;
    }

    /// Seed a treasury owned by `authority` and the default template.
    pub fn seed_program(&self, authority: Address) {
        let treasury = Treasury {
            authority,
            total_collected: 0,
            bump: self.bump(&RecordKey::Treasury),
        };
        let template = default_template(self.bump(&RecordKey::Template(DEFAULT_TEMPLATE.to_string())));
        let mut state = self.state();
        if let Ok(address) = self.deriver.treasury() {
            state.put(address, &treasury);
        }
        if let Ok(address) = self.deriver.template(DEFAULT_TEMPLATE) {
            state.put(address, &template);
        }
    }

    fn bump(&self, key: &RecordKey) -> u8 {
        self.deriver
            .derive_with_bump(key)
            .map(|(_, bump)| bump)
            .unwrap_or_default()
    }

    fn expect_address(
        &self,
        key: RecordKey,
        actual: &Address,
        account: &str,
    ) -> std::result::Result<(), String> {
        match self.deriver.derive(&key) {
            Ok(expected) if &expected == actual => Ok(()),
            _ => Err(framework_failure(
                account,
                CONSTRAINT_SEEDS,
                "ConstraintSeeds",
            )),
        }
    }

    /// Execute `instruction` as `signer`, returning the program's failure message on rejection.
    pub fn apply(
        &self,
        signer: &Address,
        instruction: &Instruction,
    ) -> std::result::Result<TransactionId, String> {
        if &instruction.program_id != self.deriver.program_id() {
            return Err("Attempt to load a program that does not exist".to_string());
        }
        if !instruction
            .accounts
            .iter()
            .any(|meta| meta.is_signer && &meta.address == signer)
        {
            return Err("Transaction signature verification failure".to_string());
        }
        if instruction.data.len() < 8 {
            return Err(program_failure_raw(101));
        }
        let account = |index: usize| -> std::result::Result<Address, String> {
            instruction
                .accounts
                .get(index)
                .map(|meta| meta.address)
                .ok_or_else(|| framework_failure("accounts", 3005, "AccountNotEnoughKeys"))
        };
        let mut args = Args(&instruction.data[8..]);

        let mut state = self.state();
        // Apply to a scratch copy so a rejection leaves no partial writes.
        let mut scratch = State {
            records: state.records.clone(),
            balances: state.balances.clone(),
            ..State::default()
        };
        let table_id = match instruction.name {
            "initialize_house" => {
                self.initialize_treasury(&mut scratch, *signer, account(0)?)?;
                None
            }
            "initialize_challenger_template" => {
                self.initialize_template(&mut scratch, account(0)?)?;
                None
            }
            "deposit_sol" => {
                self.fund_vault(&mut scratch, *signer, account(0)?, args.u64()?)?;
                None
            }
            "withdraw_sol" => {
                self.withdraw_vault(&mut scratch, *signer, account(0)?, args.u64()?)?;
                None
            }
            "open_challenger_table" => Some(self.open_table(
                &mut scratch,
                *signer,
                [account(0)?, account(1)?, account(2)?, account(3)?, account(4)?, account(5)?],
            )?),
            "join_game" => {
                let table_id = args.u64()?;
                self.join_table(&mut scratch, table_id, account(0)?, account(1)?)?;
                Some(table_id)
            }
            "deposit_to_game" => Some(self.deposit_to_table(
                &mut scratch,
                account(0)?,
                account(1)?,
                account(2)?,
                args.u64()?,
            )?),
            "leave_table" => Some(self.leave_table(
                &mut scratch,
                account(0)?,
                account(1)?,
                account(2)?,
            )?),
            "collect_rent" => Some(self.collect_rent(
                &mut scratch,
                *signer,
                account(0)?,
                account(1)?,
                account(2)?,
            )?),
            "redistribute_tokens" => {
                let len = args.u32()? as usize;
                if len > MAX_REDISTRIBUTION_ENTRIES {
                    return Err(program_failure(ProgramError::TooManyPlayers));
                }
                let mut balances = Vec::with_capacity(len);
                for _ in 0..len {
                    balances.push((args.address()?, args.u64()?));
                }
                Some(self.redistribute(
                    &mut scratch,
                    *signer,
                    account(0)?,
                    account(2)?,
                    &balances,
                )?)
            }
            "kick_out_player" => {
                let player_vault = args.address()?;
                if account(2)? != player_vault {
                    return Err(framework_failure("player_vault", 2012, "ConstraintAddress"));
                }
                Some(self.kick(
                    &mut scratch,
                    *signer,
                    account(0)?,
                    account(1)?,
                    player_vault,
                    account(3)?,
                )?)
            }
            "withdraw_from_house" => {
                self.withdraw_treasury(
                    &mut scratch,
                    *signer,
                    account(0)?,
                    account(2)?,
                    args.u64()?,
                )?;
                None
            }
            other => return Err(format!("unknown instruction: {other}")),
        };

        state.records = scratch.records;
        state.balances = scratch.balances;
        state.next_signature += 1;
        let signature = TransactionId::new(format!(
            "mock-{}-{}{}",
            state.next_signature,
            instruction.name,
            table_id.map(|id| format!("-{id}")).unwrap_or_default()
        ));
        state.submitted.insert(signature.clone());
        Ok(signature)
    }

    fn treasury(&self, state: &State, address: &Address) -> std::result::Result<Treasury, String> {
        self.expect_address(RecordKey::Treasury, address, "house")?;
        state
            .get(address)
            .ok_or_else(|| program_failure(ProgramError::HouseNotInitialized))
    }

    fn require_authority(
        &self,
        state: &State,
        signer: Address,
        treasury: &Address,
    ) -> std::result::Result<Treasury, String> {
        let treasury = self.treasury(state, treasury)?;
        if treasury.authority != signer {
            return Err(program_failure(ProgramError::Unauthorized));
        }
        Ok(treasury)
    }

    fn initialize_treasury(
        &self,
        state: &mut State,
        signer: Address,
        address: Address,
    ) -> std::result::Result<(), String> {
        self.expect_address(RecordKey::Treasury, &address, "house")?;
        if state.records.contains_key(&address) {
            return Err(format!("Allocate: account {address} already in use"));
        }
        let treasury = Treasury {
            authority: signer,
            total_collected: 0,
            bump: self.bump(&RecordKey::Treasury),
        };
        state.put(address, &treasury);
        Ok(())
    }

    fn initialize_template(&self, state: &mut State, address: Address) -> std::result::Result<(), String> {
        let key = RecordKey::Template(DEFAULT_TEMPLATE.to_string());
        self.expect_address(key.clone(), &address, "table_template")?;
        if state.records.contains_key(&address) {
            return Err(format!("Allocate: account {address} already in use"));
        }
        state.put(address, &default_template(self.bump(&key)));
        Ok(())
    }

    fn fund_vault(
        &self,
        state: &mut State,
        signer: Address,
        address: Address,
        amount: u64,
    ) -> std::result::Result<(), String> {
        self.expect_address(RecordKey::PlayerVault(signer), &address, "player_vault")?;
        if amount == 0 {
            return Err(program_failure(ProgramError::InvalidDepositAmount));
        }
        if amount < MIN_VAULT_DEPOSIT {
            return Err(program_failure(ProgramError::MinimumDepositNotMet));
        }
        if state.get::<PlayerVault>(&address).is_none() {
            let vault = PlayerVault {
                owner: signer,
                bump: self.bump(&RecordKey::PlayerVault(signer)),
                ..Default::default()
            };
            state.put(address, &vault);
            // Deposits are the vault's only balance.
            state.set_lamports(address, 0);
        }
        state.transfer(signer, address, amount)
    }

    fn withdraw_vault(
        &self,
        state: &mut State,
        signer: Address,
        address: Address,
        amount: u64,
    ) -> std::result::Result<(), String> {
        self.expect_address(RecordKey::PlayerVault(signer), &address, "player_vault")?;
        let vault: PlayerVault = state.require(&address, "player_vault")?;
        if vault.owner != signer {
            return Err(program_failure(ProgramError::Unauthorized));
        }
        if amount == 0 || amount > vault.available_balance(state.lamports(&address)) {
            return Err(program_failure(ProgramError::InsufficientBalance));
        }
        state.transfer(address, signer, amount)
    }

    /// Accounts: counter, template, table, dealer, vault, treasury.
    fn open_table(
        &self,
        state: &mut State,
        signer: Address,
        [counter_address, template_address, table_address, dealer_address, vault_address, treasury_address]: [Address; 6],
    ) -> std::result::Result<u64, String> {
        self.expect_address(RecordKey::TableCounter, &counter_address, "table_counter")?;
        self.expect_address(RecordKey::PlayerVault(signer), &vault_address, "player_vault")?;
        let mut treasury = self.treasury(state, &treasury_address)?;
        let template: Template = state
            .get(&template_address)
            .ok_or_else(|| program_failure(ProgramError::InvalidTemplate))?;
        let mut vault: PlayerVault = state.require(&vault_address, "player_vault")?;
        if vault.is_seated {
            return Err(program_failure(ProgramError::PlayerAlreadySeated));
        }
        let mut counter = state
            .get::<TableCounter>(&counter_address)
            .unwrap_or(TableCounter {
                count: 0,
                bump: self.bump(&RecordKey::TableCounter),
            });
        let table_id = counter.count;
        self.expect_address(RecordKey::TableVault(table_id), &table_address, "table_vault")?;
        self.expect_address(RecordKey::Dealer(table_id), &dealer_address, "dealer")?;
        if state.records.contains_key(&table_address) {
            return Err(format!("Allocate: account {table_address} already in use"));
        }

        state.transfer(signer, treasury_address, MOCK_CREATION_FEE)?;
        treasury.total_collected = treasury.total_collected.saturating_add(MOCK_CREATION_FEE);

        let mut players = [None; MAX_SEATS];
        players[0] = Some(vault_address);
        let table = TableVault {
            table_id,
            owner: treasury.authority,
            template_name: template.name.clone(),
            max_players: template.max_players,
            min_buy_in: template.min_buy_in,
            max_buy_in: template.max_buy_in,
            creation_fee: MOCK_CREATION_FEE,
            start_fee: MOCK_START_FEE,
            players,
            bump: self.bump(&RecordKey::TableVault(table_id)),
        };
        let dealer = Dealer {
            table_id,
            authority: treasury.authority,
            players_tokens: [TokenEntry::default(); MAX_SEATS],
            total_tokens_issued: 0,
            bump: self.bump(&RecordKey::Dealer(table_id)),
        };
        vault.is_seated = true;
        vault.is_ready = false;
        vault.current_table_id = Some(table_id);
        counter.count += 1;

        state.put(table_address, &table);
        state.put(dealer_address, &dealer);
        state.put(vault_address, &vault);
        state.put(counter_address, &counter);
        state.put(treasury_address, &treasury);
        Ok(table_id)
    }

    fn join_table(
        &self,
        state: &mut State,
        table_id: u64,
        table_address: Address,
        vault_address: Address,
    ) -> std::result::Result<(), String> {
        self.expect_address(RecordKey::TableVault(table_id), &table_address, "table_vault")?;
        let mut table: TableVault = state.require(&table_address, "table_vault")?;
        let mut vault: PlayerVault = state.require(&vault_address, "player_vault")?;
        if table.is_empty() {
            return Err(program_failure(ProgramError::TableEmpty));
        }
        if vault.is_seated_at(table_id) {
            return Err(program_failure(ProgramError::PlayerAlreadyAtTable));
        }
        if vault.is_seated {
            return Err(program_failure(ProgramError::PlayerAlreadySeated));
        }
        if table.is_full() {
            return Err(program_failure(ProgramError::TableFull));
        }
        let capacity = table.capacity();
        let Some(seat) = table.players[..capacity].iter_mut().find(|seat| seat.is_none()) else {
            return Err(program_failure(ProgramError::TableFull));
        };
        *seat = Some(vault_address);
        vault.is_seated = true;
        vault.is_ready = false;
        vault.current_table_id = Some(table_id);
        state.put(table_address, &table);
        state.put(vault_address, &vault);
        Ok(())
    }

    fn seated_table(
        &self,
        state: &State,
        table_address: Address,
        dealer_address: Address,
        vault_address: Address,
    ) -> std::result::Result<(TableVault, Dealer, PlayerVault), String> {
        let table: TableVault = state.require(&table_address, "table_vault")?;
        self.expect_address(RecordKey::Dealer(table.table_id), &dealer_address, "dealer")?;
        let dealer: Dealer = state
            .get(&dealer_address)
            .ok_or_else(|| program_failure(ProgramError::DealerNotInitialized))?;
        let vault: PlayerVault = state.require(&vault_address, "player_vault")?;
        if !vault.is_seated_at(table.table_id) || table.seat_of(&vault_address).is_none() {
            return Err(program_failure(ProgramError::PlayerNotAtTable));
        }
        Ok((table, dealer, vault))
    }

    fn deposit_to_table(
        &self,
        state: &mut State,
        table_address: Address,
        dealer_address: Address,
        vault_address: Address,
        amount: u64,
    ) -> std::result::Result<u64, String> {
        let (table, mut dealer, mut vault) =
            self.seated_table(state, table_address, dealer_address, vault_address)?;
        if amount < MIN_TABLE_BUY_IN.max(table.min_buy_in) {
            return Err(program_failure(ProgramError::InvalidBuyInAmount));
        }
        if amount > vault.available_balance(state.lamports(&vault_address)) {
            return Err(program_failure(ProgramError::InsufficientBalance));
        }
        let current = dealer.tokens_of(&vault_address).unwrap_or(0);
        let committed = tokens_to_native(current)
            .checked_add(amount)
            .ok_or_else(|| program_failure(ProgramError::Overflow))?;
        if committed > table.max_buy_in {
            return Err(program_failure(ProgramError::ExceedsMaxBuyIn));
        }

        let tokens = native_to_tokens(amount);
        let slot = dealer
            .players_tokens
            .iter()
            .position(|entry| entry.player_vault == Some(vault_address))
            .or_else(|| {
                dealer
                    .players_tokens
                    .iter()
                    .position(|entry| entry.player_vault.is_none())
            })
            .ok_or_else(|| program_failure(ProgramError::TableFull))?;
        let entry = &mut dealer.players_tokens[slot];
        entry.player_vault = Some(vault_address);
        entry.tokens = entry
            .tokens
            .checked_add(tokens)
            .ok_or_else(|| program_failure(ProgramError::Overflow))?;
        dealer.total_tokens_issued = dealer
            .total_tokens_issued
            .checked_add(tokens)
            .ok_or_else(|| program_failure(ProgramError::Overflow))?;
        vault.buy_in_amount += amount;

        state.put(dealer_address, &dealer);
        state.put(vault_address, &vault);
        Ok(table.table_id)
    }

    fn leave_table(
        &self,
        state: &mut State,
        table_address: Address,
        dealer_address: Address,
        vault_address: Address,
    ) -> std::result::Result<u64, String> {
        let (mut table, mut dealer, mut vault) =
            self.seated_table(state, table_address, dealer_address, vault_address)?;
        let tokens = remove_entry(&mut dealer, &vault_address)?;
        for seat in table.players.iter_mut() {
            if *seat == Some(vault_address) {
                *seat = None;
            }
        }
        // Settle the vault at its token value.
        let settled = state
            .lamports(&vault_address)
            .saturating_sub(vault.buy_in_amount)
            .saturating_add(tokens_to_native(tokens));
        state.set_lamports(vault_address, settled);
        unseat(&mut vault);

        state.put(table_address, &table);
        state.put(dealer_address, &dealer);
        state.put(vault_address, &vault);
        Ok(table.table_id)
    }

    fn collect_rent(
        &self,
        state: &mut State,
        signer: Address,
        table_address: Address,
        dealer_address: Address,
        treasury_address: Address,
    ) -> std::result::Result<u64, String> {
        let mut treasury = self.require_authority(state, signer, &treasury_address)?;
        let table: TableVault = state.require(&table_address, "table_vault")?;
        self.expect_address(RecordKey::Dealer(table.table_id), &dealer_address, "dealer")?;
        if !table.is_empty() {
            return Err(program_failure(ProgramError::TableNotEmpty));
        }
        let collected = state.lamports(&table_address) + state.lamports(&dealer_address);
        state.records.remove(&table_address);
        state.records.remove(&dealer_address);
        let balance = state.lamports(&treasury_address).saturating_add(collected);
        state.set_lamports(treasury_address, balance);
        treasury.total_collected = treasury.total_collected.saturating_add(collected);
        state.put(treasury_address, &treasury);
        Ok(table.table_id)
    }

    fn redistribute(
        &self,
        state: &mut State,
        signer: Address,
        dealer_address: Address,
        treasury_address: Address,
        balances: &[(Address, u64)],
    ) -> std::result::Result<u64, String> {
        self.require_authority(state, signer, &treasury_address)?;
        if balances.is_empty() {
            return Err(program_failure(ProgramError::InvalidTokenAmount));
        }
        let mut dealer: Dealer = state
            .get(&dealer_address)
            .ok_or_else(|| program_failure(ProgramError::DealerNotInitialized))?;
        for (player_vault, tokens) in balances {
            let entry = dealer
                .players_tokens
                .iter_mut()
                .find(|entry| entry.player_vault.as_ref() == Some(player_vault))
                .ok_or_else(|| program_failure(ProgramError::PlayerNotAtTable))?;
            entry.tokens = *tokens;
        }
        if !dealer.is_balanced() {
            return Err(program_failure(ProgramError::TokenSumMismatch));
        }
        state.put(dealer_address, &dealer);
        Ok(dealer.table_id)
    }

    fn kick(
        &self,
        state: &mut State,
        signer: Address,
        dealer_address: Address,
        table_address: Address,
        vault_address: Address,
        treasury_address: Address,
    ) -> std::result::Result<u64, String> {
        self.require_authority(state, signer, &treasury_address)?;
        let mut table: TableVault = state.require(&table_address, "table_vault")?;
        let mut dealer: Dealer = state
            .get(&dealer_address)
            .ok_or_else(|| program_failure(ProgramError::DealerNotInitialized))?;
        let Some(seat) = table.seat_of(&vault_address) else {
            return Err(program_failure(ProgramError::PlayerNotAtTable));
        };
        if dealer.tokens_of(&vault_address).unwrap_or(0) > 0 {
            return Err(program_failure(ProgramError::PlayerHasTokens));
        }
        if dealer.tokens_of(&vault_address).is_some() {
            remove_entry(&mut dealer, &vault_address)?;
        }
        table.players[seat] = None;
        if let Some(mut vault) = state.get::<PlayerVault>(&vault_address) {
            unseat(&mut vault);
            state.put(vault_address, &vault);
        }
        state.put(table_address, &table);
        state.put(dealer_address, &dealer);
        Ok(table.table_id)
    }

    fn withdraw_treasury(
        &self,
        state: &mut State,
        signer: Address,
        treasury_address: Address,
        destination: Address,
        amount: u64,
    ) -> std::result::Result<(), String> {
        self.require_authority(state, signer, &treasury_address)?;
        if amount == 0 || amount > state.lamports(&treasury_address) {
            return Err(program_failure(ProgramError::InsufficientBalance));
        }
        state.transfer(treasury_address, destination, amount)
    }
}

fn program_failure_raw(code: u32) -> String {
    format!("Transaction simulation failed: Error processing Instruction 0: custom program error: {code:#x}")
}

fn default_template(bump: u8) -> Template {
    Template {
        name: DEFAULT_TEMPLATE.to_string(),
        min_buy_in: MIN_TABLE_BUY_IN,
        max_buy_in: MOCK_TEMPLATE_MAX_BUY_IN,
        max_players: MOCK_TEMPLATE_MAX_PLAYERS,
        bump,
    }
}

/// Clear the dealer entry for `vault`, returning its tokens.
fn remove_entry(dealer: &mut Dealer, vault: &Address) -> std::result::Result<u64, String> {
    let Some(entry) = dealer
        .players_tokens
        .iter_mut()
        .find(|entry| entry.player_vault.as_ref() == Some(vault))
    else {
        return Ok(0);
    };
    let tokens = entry.tokens;
    *entry = TokenEntry::default();
    dealer.total_tokens_issued = dealer
        .total_tokens_issued
        .checked_sub(tokens)
        .ok_or_else(|| program_failure(ProgramError::TokenIntegrityViolation))?;
    Ok(tokens)
}

fn unseat(vault: &mut PlayerVault) {
    vault.is_seated = false;
    vault.is_ready = false;
    vault.current_table_id = None;
    vault.buy_in_amount = 0;
}

impl Ledger for MockLedger {
    async fn get_record(&self, address: &Address) -> Result<Option<RawRecord>> {
        let mut state = self.state();
        *state.fetches.entry(*address).or_default() += 1;
        if let Some(message) = state.fetch_failures.get(address) {
            return Err(Error::Rpc {
                code: -32000,
                message: message.clone(),
            });
        }
        Ok(state.records.get(address).cloned())
    }

    async fn confirm(&self, signature: &TransactionId, _commitment: Commitment) -> Result<()> {
        let state = self.state();
        if let Some(message) = &state.confirm_failure {
            return Err(Error::TransactionFailed {
                signature: signature.clone(),
                message: message.clone(),
            });
        }
        if !state.submitted.contains(signature) {
            return Err(Error::ConfirmTimeout {
                signature: signature.clone(),
                elapsed_ms: 0,
            });
        }
        Ok(())
    }
}

/// How a [MockWallet] answers signing requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalletMode {
    Approve,
    /// The operator declines every request.
    Reject,
}

/// [Wallet] that signs as a fixed identity and submits straight to a [MockLedger].
#[derive(Clone)]
pub struct MockWallet {
    ledger: MockLedger,
    identity: Arc<Mutex<Option<Address>>>,
    mode: Arc<Mutex<WalletMode>>,
    submissions: Arc<AtomicUsize>,
}

impl MockWallet {
    pub fn new(ledger: MockLedger, identity: Address) -> Self {
        Self {
            ledger,
            identity: Arc::new(Mutex::new(Some(identity))),
            mode: Arc::new(Mutex::new(WalletMode::Approve)),
            submissions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A wallet with no connected identity.
    pub fn disconnected(ledger: MockLedger) -> Self {
        let wallet = Self::new(ledger, Address::default());
        wallet.set_identity(None);
        wallet
    }

    pub fn set_identity(&self, identity: Option<Address>) {
        *self.identity.lock().unwrap() = identity;
    }

    pub fn set_mode(&self, mode: WalletMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Signing requests received, including declined ones.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

impl Wallet for MockWallet {
    fn identity(&self) -> Option<Address> {
        *self.identity.lock().unwrap()
    }

    async fn sign_and_submit(&self, instruction: &Instruction) -> Result<TransactionId> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let identity = self.identity().ok_or(Error::NotAuthorized)?;
        let mode = *self.mode.lock().unwrap();
        match mode {
            WalletMode::Reject => Err(Error::Wallet(
                "WalletSignTransactionError: User rejected the request.".to_string(),
            )),
            WalletMode::Approve => self
                .ledger
                .apply(&identity, instruction)
                .map_err(Error::Wallet),
        }
    }
}
