use crate::address::Address;

/// Deployed table program.
pub const PROGRAM_ID: Address = Address::new([
    37, 5, 132, 54, 154, 202, 245, 232, 250, 227, 203, 235, 28, 76, 236, 72, 118, 44, 163, 225,
    153, 118, 52, 24, 211, 229, 178, 250, 46, 35, 13, 183,
]);

/// The ledger's native system program (all-zero address).
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// Seed prefixes for each record kind.
pub const TREASURY_SEED: &[u8] = b"house";
pub const TEMPLATE_SEED: &[u8] = b"table_template";
pub const PLAYER_VAULT_SEED: &[u8] = b"player_vault";
pub const TABLE_VAULT_SEED: &[u8] = b"table_vault";
pub const DEALER_SEED: &[u8] = b"dealer";
pub const TABLE_COUNTER_SEED: &[u8] = b"table_counter";

/// Name of the only template the console creates and opens tables from.
pub const DEFAULT_TEMPLATE: &str = "challenger";

/// Maximum template name length (a template name is used verbatim as a seed).
pub const MAX_TEMPLATE_NAME_LENGTH: usize = 32;

/// Seats per table.
pub const MAX_SEATS: usize = 7;

/// Maximum entries accepted in a single redistribution.
pub const MAX_REDISTRIBUTION_ENTRIES: usize = MAX_SEATS;

/// Native units (lamports) per display unit (SOL).
pub const NATIVE_PER_DISPLAY_UNIT: u64 = 1_000_000_000;

/// Game tokens issued per display unit bought in.
pub const TOKENS_PER_DISPLAY_UNIT: u64 = 10_000;

/// Native units backing a single game token.
pub const NATIVE_PER_TOKEN: u64 = NATIVE_PER_DISPLAY_UNIT / TOKENS_PER_DISPLAY_UNIT;

/// Smallest vault deposit the console will submit (0.12 display units).
pub const MIN_VAULT_DEPOSIT: u64 = 120_000_000;

/// Smallest table buy-in the console will submit (0.1 display units).
pub const MIN_TABLE_BUY_IN: u64 = 100_000_000;

/// Native value of `tokens` game tokens.
pub const fn tokens_to_native(tokens: u64) -> u64 {
    tokens.saturating_mul(NATIVE_PER_TOKEN)
}

/// Whole game tokens backed by `native` units (remainder dropped).
pub const fn native_to_tokens(native: u64) -> u64 {
    native / NATIVE_PER_TOKEN
}
