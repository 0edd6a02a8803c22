//! Outbound tier events and read models.

use serde::Serialize;

use chrono::{DateTime, Utc};

use super::{
    settlement::{GameEndResult, PendingPayout},
    state_machine::TierStatus,
};
use crate::{
    game::{BingoNumber, CardNumber, WinClaim},
    session::{BetAmount, Session, UserId},
};

/// Lobby view of one tier.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub bet_amount: BetAmount,
    pub status: TierStatus,
    /// Seconds left on the countdown or grace window, zero otherwise
    pub timer: u64,
    pub player_count: usize,
    pub prize_pool: i64,
}

/// Stake returned when a round is cancelled.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub user_id: UserId,
    pub card_number: CardNumber,
    pub amount: i64,
}

/// Full state of a tier for clients that (re)connect.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub bet_amount: BetAmount,
    pub round: u64,
    pub status: TierStatus,
    pub timer: u64,
    pub player_count: usize,
    pub prize_pool: i64,
    /// Wall-clock start of the current countdown; `None` while ready
    pub created_at: Option<DateTime<Utc>>,
    pub sessions: Vec<Session>,
    pub called_numbers: Vec<BingoNumber>,
    pub current_number: Option<BingoNumber>,
    pub winners: Vec<WinClaim>,
    pub last_result: Option<GameEndResult>,
    pub pending_payouts: Vec<PendingPayout>,
}

/// Events broadcast to tier subscribers, in the order they were applied.
///
/// Serialized as `{"event": "<kebab-name>", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum TierEvent {
    SessionsUpdated {
        bet_amount: BetAmount,
        sessions: Vec<Session>,
        player_count: usize,
        prize_pool: i64,
    },
    NumberCalled {
        bet_amount: BetAmount,
        number: BingoNumber,
        called_numbers: Vec<BingoNumber>,
    },
    GameStarted {
        bet_amount: BetAmount,
        round: u64,
        player_count: usize,
        prize_pool: i64,
    },
    GameStopped {
        bet_amount: BetAmount,
        round: u64,
        grace_period_secs: u64,
    },
    WinnerAnnounced {
        bet_amount: BetAmount,
        round: u64,
        claim: WinClaim,
    },
    GameEnded(GameEndResult),
    RoundCancelled {
        bet_amount: BetAmount,
        round: u64,
        reason: String,
        refunds: Vec<Refund>,
        pending_refunds: Vec<PendingPayout>,
    },
    TimerStatesUpdate {
        timers: Vec<TimerState>,
    },
}

impl TierEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            TierEvent::SessionsUpdated { .. } => "sessions-updated",
            TierEvent::NumberCalled { .. } => "number-called",
            TierEvent::GameStarted { .. } => "game-started",
            TierEvent::GameStopped { .. } => "game-stopped",
            TierEvent::WinnerAnnounced { .. } => "winner-announced",
            TierEvent::GameEnded(_) => "game-ended",
            TierEvent::RoundCancelled { .. } => "round-cancelled",
            TierEvent::TimerStatesUpdate { .. } => "timer-states-update",
        }
    }
}
