//! Card reservations.
//!
//! Each bet tier owns a [`SessionRegistry`]. A session moves
//! `selected → ready → playing → submitted | blocked` and is removed when the
//! card is released, the round is cancelled, or the round ends.

pub mod models;
pub mod pending;
pub mod registry;

pub use models::{BetAmount, Session, SessionStatus, UserId};
pub use pending::{PendingGuard, PendingOperations};
pub use registry::SessionRegistry;
