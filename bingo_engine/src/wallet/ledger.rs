//! Wallet ledger interface consumed by the round engine.

use async_trait::async_trait;

use super::{errors::WalletResult, models::WalletEntry};
use crate::session::UserId;

/// Atomic balance mutations keyed by idempotency key.
///
/// Every mutation carries a key that is unique per logical operation. A key
/// that was already applied is rejected with
/// [`WalletError::DuplicateTransaction`](super::WalletError::DuplicateTransaction)
/// and the balance is left untouched. All methods return the balance after
/// the call.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    /// Take `amount` from the wallet, failing with `InsufficientBalance` rather
    /// than going negative.
    async fn debit(&self, user_id: UserId, amount: i64, idempotency_key: String)
    -> WalletResult<i64>;

    /// Pay `amount` into the wallet.
    async fn credit(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64>;

    /// Return a previously debited stake.
    async fn refund(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64>;

    async fn get_balance(&self, user_id: UserId) -> WalletResult<i64>;

    /// Journal entries for a user, newest first.
    async fn recent_entries(&self, user_id: UserId, limit: usize) -> WalletResult<Vec<WalletEntry>>;
}
