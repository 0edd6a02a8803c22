//! # Bingo Engine
//!
//! A real-time multiplayer 75-ball bingo round engine.
//!
//! Players reserve cards in a bet tier (one tier per stake amount). The first
//! reservation starts a countdown; when it runs out with enough cards the
//! round starts and the server calls numbers at a fixed pace. A claim is
//! checked against the last called number; the first valid claim stops the
//! calling and opens a short grace window for further winners, after which
//! the prize pool is split and paid through the wallet ledger.
//!
//! ## Core Modules
//!
//! - [`game`]: numbers, cards, number caller, win detection, card table
//! - [`session`]: card reservations and the per-tier registry
//! - [`tier`]: tier state machine, round engine, actor and manager
//! - [`wallet`]: ledger interface with in-memory and PostgreSQL adapters
//! - [`db`]: PostgreSQL connection pool

pub mod db;
pub mod errors;
pub mod game;
pub mod session;
pub mod tier;
pub mod wallet;

pub use errors::{BingoError, BingoResult};
pub use game::{BingoCard, BingoNumber, CardNumber, CardTable, InMemoryCardTable, WinClaim, WinPattern};
pub use session::{BetAmount, Session, SessionStatus, UserId};
pub use tier::{GameEndResult, TierConfig, TierEvent, TierManager, TierStatus};
pub use wallet::{InMemoryLedger, PgWalletLedger, WalletError, WalletLedger};
