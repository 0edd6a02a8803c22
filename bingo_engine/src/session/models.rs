//! Card reservation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::{BingoError, BingoResult},
    game::CardNumber,
};

/// User ID type
pub type UserId = i64;

/// Stake per card, in the ledger's smallest unit. Also keys the bet tier.
pub type BetAmount = i64;

/// Lifecycle of one card reservation within a round.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Reserved; the stake debit is still outstanding.
    Selected,
    /// Stake paid, waiting for the round to start.
    Ready,
    /// In the running round.
    Playing,
    /// Submitted an accepted claim.
    Submitted,
    /// Submitted a false claim; out for the rest of the round.
    Blocked,
}

impl SessionStatus {
    #[must_use]
    pub const fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Selected, SessionStatus::Ready)
                | (SessionStatus::Ready, SessionStatus::Playing)
                | (SessionStatus::Playing, SessionStatus::Submitted)
                | (SessionStatus::Playing, SessionStatus::Blocked)
        )
    }

    /// Counts towards the tier's player count.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        !matches!(self, SessionStatus::Selected)
    }

    /// Took part in a started round, and so in its prize pool.
    #[must_use]
    pub const fn reached_playing(self) -> bool {
        matches!(
            self,
            SessionStatus::Playing | SessionStatus::Submitted | SessionStatus::Blocked
        )
    }

    /// Already has a claim on record this round.
    #[must_use]
    pub const fn has_claimed(self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::Blocked)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Selected => write!(f, "selected"),
            SessionStatus::Ready => write!(f, "ready"),
            SessionStatus::Playing => write!(f, "playing"),
            SessionStatus::Submitted => write!(f, "submitted"),
            SessionStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// One card reservation by one user in one bet tier.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: Uuid,
    pub card_number: CardNumber,
    pub user_id: UserId,
    pub bet_amount: BetAmount,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// New reservation in the `selected` state.
    pub fn new(card_number: CardNumber, user_id: UserId, bet_amount: BetAmount) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            card_number,
            user_id,
            bet_amount,
            status: SessionStatus::Selected,
            created_at: Utc::now(),
        }
    }

    pub fn advance(&mut self, next: SessionStatus) -> BingoResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(BingoError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn stake_key(&self) -> String {
        format!("stake:{}", self.session_id)
    }

    pub fn refund_key(&self) -> String {
        format!("refund:{}", self.session_id)
    }

    pub fn prize_key(&self) -> String {
        format!("prize:{}", self.session_id)
    }
}
