//! Tier actor message types.

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{
    events::{RoundSnapshot, TierEvent, TimerState},
    settlement::GameEndResult,
};
use crate::{
    errors::BingoResult,
    game::{CardNumber, WinClaim},
    session::{Session, UserId},
};

/// Messages that can be sent to a TierActor
#[derive(Debug)]
pub enum TierMessage {
    /// Reserve a card and take the stake
    Reserve {
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
        response: oneshot::Sender<BingoResult<Session>>,
    },

    /// Release a card and refund the stake
    Release {
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
        response: oneshot::Sender<BingoResult<()>>,
    },

    /// Submit a win claim
    Claim {
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
        response: oneshot::Sender<BingoResult<WinClaim>>,
    },

    GetSessions {
        response: oneshot::Sender<Vec<Session>>,
    },

    GetTimerState {
        response: oneshot::Sender<TimerState>,
    },

    GetSnapshot {
        response: oneshot::Sender<RoundSnapshot>,
    },

    GetHistory {
        response: oneshot::Sender<Vec<GameEndResult>>,
    },

    /// Advance timers now instead of waiting for the next interval tick
    Tick,

    /// Subscribe to tier events. The reply is the snapshot the event stream
    /// continues from.
    Subscribe {
        subscriber_id: Uuid,
        sender: mpsc::Sender<TierEvent>,
        response: oneshot::Sender<RoundSnapshot>,
    },

    /// Unsubscribe from tier events
    Unsubscribe { subscriber_id: Uuid },

    /// Stop the actor
    Close { response: oneshot::Sender<()> },
}
