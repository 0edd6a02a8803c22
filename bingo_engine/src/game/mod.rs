//! Bingo game primitives.
//!
//! This module provides:
//! - Numbers, letters and 5x5 cards with a free centre
//! - The per-round called-number log
//! - The random number caller
//! - Last-number-triggered win detection
//! - The read-only card table

pub mod called;
pub mod caller;
pub mod card_table;
pub mod constants;
pub mod detector;
pub mod entities;

pub use called::CalledNumberLog;
pub use caller::NumberCaller;
pub use card_table::{CardTable, CardTableError, InMemoryCardTable};
pub use detector::{PatternMatch, WinClaim, WinPattern, evaluate};
pub use entities::{BingoCard, BingoNumber, CardCell, CardError, CardNumber, CellPosition, Letter};
