//! Wallet ledger used for stakes, refunds and prizes.
//!
//! This module implements:
//! - The [`WalletLedger`] interface the round engine calls
//! - Idempotency keys to prevent duplicate transactions
//! - An in-memory ledger and a PostgreSQL ledger with a journal of entries
//!
//! ## Example
//!
//! ```no_run
//! use bingo_engine::wallet::{InMemoryLedger, WalletLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = InMemoryLedger::new(Some(100));
//!
//!     let balance = ledger.debit(1, 10, "stake:example".to_string()).await?;
//!     println!("Balance after stake: {}", balance);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ledger;
pub mod memory;
pub mod models;
pub mod postgres;

pub use errors::{WalletError, WalletResult};
pub use ledger::WalletLedger;
pub use memory::InMemoryLedger;
pub use models::{EntryDirection, EntryType, Wallet, WalletEntry};
pub use postgres::PgWalletLedger;
