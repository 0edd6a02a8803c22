//! Bet tier lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::{
    errors::{BingoError, BingoResult},
    session::BetAmount,
};

/// Round phase of a bet tier.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierStatus {
    Ready,
    CountingDown,
    Active,
    /// Grace window after the first accepted claim
    Stopped,
    Ended,
}

impl TierStatus {
    /// `ready → counting-down → active → stopped → ended → ready`, plus the
    /// cancel (`counting-down → ready`) and no-winner (`active → ended`) exits.
    #[must_use]
    pub const fn can_transition_to(self, next: TierStatus) -> bool {
        matches!(
            (self, next),
            (TierStatus::Ready, TierStatus::CountingDown)
                | (TierStatus::CountingDown, TierStatus::Active)
                | (TierStatus::CountingDown, TierStatus::Ready)
                | (TierStatus::Active, TierStatus::Stopped)
                | (TierStatus::Active, TierStatus::Ended)
                | (TierStatus::Stopped, TierStatus::Ended)
                | (TierStatus::Ended, TierStatus::Ready)
        )
    }

    /// Reservations and releases are accepted.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, TierStatus::Ready | TierStatus::CountingDown)
    }

    /// Claims are accepted.
    #[must_use]
    pub const fn is_in_play(self) -> bool {
        matches!(self, TierStatus::Active | TierStatus::Stopped)
    }
}

impl std::fmt::Display for TierStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierStatus::Ready => write!(f, "ready"),
            TierStatus::CountingDown => write!(f, "counting-down"),
            TierStatus::Active => write!(f, "active"),
            TierStatus::Stopped => write!(f, "stopped"),
            TierStatus::Ended => write!(f, "ended"),
        }
    }
}

/// Process-wide state of one stake amount.
#[derive(Debug, Clone)]
pub struct BetTier {
    bet_amount: BetAmount,
    status: TierStatus,
    round: u64,
    round_started_at: Option<Instant>,
    round_created_at: Option<DateTime<Utc>>,
}

impl BetTier {
    pub fn new(bet_amount: BetAmount) -> Self {
        Self {
            bet_amount,
            status: TierStatus::Ready,
            round: 0,
            round_started_at: None,
            round_created_at: None,
        }
    }

    pub fn bet_amount(&self) -> BetAmount {
        self.bet_amount
    }

    pub fn status(&self) -> TierStatus {
        self.status
    }

    /// Rounds opened so far; the current one if a round is open.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Wall-clock time the current countdown opened.
    pub fn round_created_at(&self) -> Option<DateTime<Utc>> {
        self.round_created_at
    }

    pub fn transition(&mut self, next: TierStatus) -> BingoResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(BingoError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        log::debug!(
            "Tier {} round {}: {} -> {}",
            self.bet_amount,
            self.round,
            self.status,
            next
        );

        if self.status == TierStatus::Ready && next == TierStatus::CountingDown {
            self.round += 1;
        }
        if next == TierStatus::Ready {
            self.round_started_at = None;
            self.round_created_at = None;
        }
        self.status = next;
        Ok(())
    }

    /// Open a countdown anchored at `now`.
    pub fn start_countdown(&mut self, now: Instant) -> BingoResult<()> {
        self.transition(TierStatus::CountingDown)?;
        self.round_started_at = Some(now);
        self.round_created_at = Some(Utc::now());
        Ok(())
    }

    /// Whole seconds left on the countdown, rounded up. Zero outside a countdown.
    pub fn countdown_remaining(&self, now: Instant, budget: Duration) -> Duration {
        match (self.status, self.round_started_at) {
            (TierStatus::CountingDown, Some(started)) => {
                budget.saturating_sub(now.saturating_duration_since(started))
            }
            _ => Duration::ZERO,
        }
    }
}

/// Round a duration up to whole seconds, as shown to clients.
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}
