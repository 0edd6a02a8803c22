//! Round engine error types.

use thiserror::Error;

use crate::{
    game::CardNumber,
    session::BetAmount,
    wallet::WalletError,
};

/// Errors returned by reservation, release and claim handling.
///
/// None of these are fatal: each one rejects a single request and leaves the
/// tier running.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum BingoError {
    #[error("Card {0} is already taken")]
    CardTaken(CardNumber),

    #[error("Selection limit reached: at most {limit} cards per tier")]
    SelectionLimitExceeded { limit: usize },

    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Card {0} already submitted a claim this round")]
    AlreadySubmitted(CardNumber),

    #[error("Card {0} is not a winner")]
    InvalidClaim(CardNumber),

    #[error("Not enough players: {reserved} of {required} cards reserved")]
    NotEnoughPlayers { required: usize, reserved: usize },

    #[error("Card {0} does not exist")]
    InvalidCard(u8),

    #[error("Invalid bet amount: {0}")]
    InvalidBetAmount(BetAmount),

    #[error("Round in progress")]
    RoundInProgress,

    #[error("No active round")]
    NoActiveRound,

    #[error("No session for card {0}")]
    SessionNotFound(CardNumber),

    #[error("Card {0} belongs to another player")]
    NotSessionOwner(CardNumber),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation id {0} was already used for a different request")]
    DuplicateOperation(String),

    #[error("Tier {0} is unavailable")]
    TierUnavailable(BetAmount),

    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl BingoError {
    /// Client-safe message. Ledger failures are reported without detail.
    pub fn client_message(&self) -> String {
        match self {
            BingoError::Ledger(_) => "Wallet service unavailable".to_string(),
            BingoError::InvalidTransition { .. } => "Request not allowed right now".to_string(),
            _ => self.to_string(),
        }
    }

    /// Stable machine-readable code for transport payloads.
    pub fn code(&self) -> &'static str {
        match self {
            BingoError::CardTaken(_) => "card_taken",
            BingoError::SelectionLimitExceeded { .. } => "selection_limit_exceeded",
            BingoError::InsufficientFunds { .. } => "insufficient_funds",
            BingoError::AlreadySubmitted(_) => "already_submitted",
            BingoError::InvalidClaim(_) => "invalid_claim",
            BingoError::NotEnoughPlayers { .. } => "not_enough_players",
            BingoError::InvalidCard(_) => "invalid_card",
            BingoError::InvalidBetAmount(_) => "invalid_bet_amount",
            BingoError::RoundInProgress => "round_in_progress",
            BingoError::NoActiveRound => "no_active_round",
            BingoError::SessionNotFound(_) => "session_not_found",
            BingoError::NotSessionOwner(_) => "not_session_owner",
            BingoError::InvalidTransition { .. } => "invalid_transition",
            BingoError::DuplicateOperation(_) => "duplicate_operation",
            BingoError::TierUnavailable(_) => "tier_unavailable",
            BingoError::Ledger(_) => "ledger_error",
        }
    }
}

impl From<WalletError> for BingoError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientBalance {
                available,
                required,
            } => BingoError::InsufficientFunds {
                required,
                available,
            },
            other => BingoError::Ledger(other.to_string()),
        }
    }
}

/// Result type for round engine operations
pub type BingoResult<T> = Result<T, BingoError>;
