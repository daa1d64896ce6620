//! Custom error codes raised by the table program.

use std::fmt;

/// First custom error code; the program numbers its errors sequentially from here.
pub const CUSTOM_ERROR_OFFSET: u32 = 6000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProgramError {
    TableFull = 6000,
    TableEmpty = 6001,
    PlayerNotAtTable = 6002,
    PlayerAlreadyAtTable = 6003,
    PlayerAlreadyReady = 6004,
    InsufficientBalance = 6005,
    GameAlreadyActive = 6006,
    GameNotActive = 6007,
    NotEnoughPlayers = 6008,
    Unauthorized = 6009,
    Overflow = 6010,
    Underflow = 6011,
    MinimumDepositNotMet = 6012,
    InvalidDepositAmount = 6013,
    InvalidBuyInAmount = 6014,
    CannotActDuringGame = 6015,
    InvalidTableParams = 6016,
    HouseNotInitialized = 6017,
    TableNotEmpty = 6018,
    InvalidTemplate = 6019,
    PlayerAlreadySeated = 6020,
    PlayerNotSeated = 6021,
    PlayerAlreadyInGame = 6022,
    InvalidTableOwner = 6023,
    ExceedsMaxBuyIn = 6024,
    TokenSumMismatch = 6025,
    TokenIntegrityViolation = 6026,
    TooManyPlayers = 6027,
    DealerNotInitialized = 6028,
    InvalidTokenAmount = 6029,
    PlayerHasTokens = 6030,
}

impl ProgramError {
    pub const ALL: [ProgramError; 31] = [
        ProgramError::TableFull,
        ProgramError::TableEmpty,
        ProgramError::PlayerNotAtTable,
        ProgramError::PlayerAlreadyAtTable,
        ProgramError::PlayerAlreadyReady,
        ProgramError::InsufficientBalance,
        ProgramError::GameAlreadyActive,
        ProgramError::GameNotActive,
        ProgramError::NotEnoughPlayers,
        ProgramError::Unauthorized,
        ProgramError::Overflow,
        ProgramError::Underflow,
        ProgramError::MinimumDepositNotMet,
        ProgramError::InvalidDepositAmount,
        ProgramError::InvalidBuyInAmount,
        ProgramError::CannotActDuringGame,
        ProgramError::InvalidTableParams,
        ProgramError::HouseNotInitialized,
        ProgramError::TableNotEmpty,
        ProgramError::InvalidTemplate,
        ProgramError::PlayerAlreadySeated,
        ProgramError::PlayerNotSeated,
        ProgramError::PlayerAlreadyInGame,
        ProgramError::InvalidTableOwner,
        ProgramError::ExceedsMaxBuyIn,
        ProgramError::TokenSumMismatch,
        ProgramError::TokenIntegrityViolation,
        ProgramError::TooManyPlayers,
        ProgramError::DealerNotInitialized,
        ProgramError::InvalidTokenAmount,
        ProgramError::PlayerHasTokens,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        let index = code.checked_sub(CUSTOM_ERROR_OFFSET)?;
        Self::ALL.get(index as usize).copied()
    }

    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn message(self) -> &'static str {
        match self {
            ProgramError::TableFull => "Table is full",
            ProgramError::TableEmpty => "Table is empty - cannot join empty table",
            ProgramError::PlayerNotAtTable => "Player is not at this table",
            ProgramError::PlayerAlreadyAtTable => "Player is already at this table",
            ProgramError::PlayerAlreadyReady => "Player is already ready",
            ProgramError::InsufficientBalance => "Insufficient balance",
            ProgramError::GameAlreadyActive => "Game is already active",
            ProgramError::GameNotActive => "Game is not active",
            ProgramError::NotEnoughPlayers => "Not enough players to start game (minimum 2)",
            ProgramError::Unauthorized => "Unauthorized action",
            ProgramError::Overflow => "Arithmetic overflow",
            ProgramError::Underflow => "Arithmetic underflow",
            ProgramError::MinimumDepositNotMet => "Minimum deposit amount not met (0.12 SOL required)",
            ProgramError::InvalidDepositAmount => "Invalid deposit amount (minimum 0.12 SOL)",
            ProgramError::InvalidBuyInAmount => "Invalid buy-in amount (below table minimum)",
            ProgramError::CannotActDuringGame => "Cannot perform action during active game",
            ProgramError::InvalidTableParams => "Invalid table parameters",
            ProgramError::HouseNotInitialized => "House account not initialized",
            ProgramError::TableNotEmpty => "Table is not empty - cannot cleanup",
            ProgramError::InvalidTemplate => "Invalid table template",
            ProgramError::PlayerAlreadySeated => "Player is already seated at another table",
            ProgramError::PlayerNotSeated => "Player is not seated at any table",
            ProgramError::PlayerAlreadyInGame => "Player is already in an active game",
            ProgramError::InvalidTableOwner => "Invalid table owner - table must be owned by House Authority",
            ProgramError::ExceedsMaxBuyIn => "Maximum buy-in exceeded",
            ProgramError::TokenSumMismatch => "Token sum mismatch - total must remain constant",
            ProgramError::TokenIntegrityViolation => "Token integrity violation",
            ProgramError::TooManyPlayers => "Too many players for redistribution",
            ProgramError::DealerNotInitialized => "Dealer not initialized",
            ProgramError::InvalidTokenAmount => "Invalid token amount",
            ProgramError::PlayerHasTokens => "Cannot kick out player - player still has tokens",
        }
    }

    /// Extract a program error from a ledger failure message or log.
    pub fn parse(message: &str) -> Option<Self> {
        parse_error_code(message).and_then(Self::from_code)
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

impl std::error::Error for ProgramError {}

/// Find a numeric error code in a ledger failure message.
///
/// Recognizes `custom program error: 0x1770` (hex), `Error Number: 6000` (decimal) and the
/// `{"Custom":6000}` form used in transaction status errors.
pub fn parse_error_code(message: &str) -> Option<u32> {
    const HEX_MARKER: &str = "custom program error: 0x";
    const DECIMAL_MARKERS: [&str; 2] = ["Error Number: ", "\"Custom\":"];

    if let Some(start) = message.find(HEX_MARKER) {
        let digits: String = message[start + HEX_MARKER.len()..]
            .chars()
            .take_while(char::is_ascii_hexdigit)
            .collect();
        if let Ok(code) = u32::from_str_radix(&digits, 16) {
            return Some(code);
        }
    }
    for marker in DECIMAL_MARKERS {
        let Some(start) = message.find(marker) else {
            continue;
        };
        let digits: String = message[start + marker.len()..]
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }
    None
}
