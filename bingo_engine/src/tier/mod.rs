//! Bet tiers: one independent round engine per stake amount.
//!
//! This module implements:
//! - TierEngine: session registry, timer state machine, number calling,
//!   claims, grace window and settlement for one stake
//! - TierActor: async actor serializing every operation on one tier
//! - TierManager: lazily spawns tier actors keyed by stake
//!
//! ## Architecture
//!
//! Each tier runs in a separate Tokio task with an mpsc message inbox and a
//! periodic tick. Requests carry a oneshot reply channel. Events are pushed
//! to per-tier subscribers in application order and to a process-wide
//! broadcast feed.
//!
//! ## Example
//!
//! ```no_run
//! use bingo_engine::game::{CardNumber, InMemoryCardTable};
//! use bingo_engine::tier::{TierConfig, TierManager};
//! use bingo_engine::wallet::InMemoryLedger;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cards = Arc::new(InMemoryCardTable::from_file("data/cards.json")?);
//!     let ledger = Arc::new(InMemoryLedger::new(Some(1_000)));
//!     let manager = TierManager::new(TierConfig::default(), ledger, cards);
//!
//!     let session = manager.reserve(10, CardNumber::new(7)?, 1, None).await?;
//!     println!("Reserved {} in tier {}", session.card_number, session.bet_amount);
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod config;
pub mod engine;
pub mod events;
pub mod grace;
pub mod manager;
pub mod messages;
pub mod settlement;
pub mod state_machine;

pub use actor::{TierActor, TierHandle};
pub use config::TierConfig;
pub use engine::TierEngine;
pub use events::{Refund, RoundSnapshot, TierEvent, TimerState};
pub use grace::GracePeriod;
pub use manager::TierManager;
pub use messages::TierMessage;
pub use settlement::{GameEndResult, PayoutKind, PendingPayout, RoundOutcome, WinnerPayout};
pub use state_machine::{BetTier, TierStatus};
