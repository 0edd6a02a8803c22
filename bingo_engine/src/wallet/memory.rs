//! In-process ledger for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use super::{
    errors::{WalletError, WalletResult},
    ledger::WalletLedger,
    models::{EntryType, WalletEntry},
};
use crate::session::UserId;

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<UserId, i64>,
    applied_keys: HashSet<String>,
    entries: Vec<WalletEntry>,
}

/// Ledger kept in memory behind a single lock.
///
/// Wallets are opened on first use with `default_balance`. Without a default,
/// unknown users get `WalletNotFound` until [`InMemoryLedger::set_balance`]
/// opens their wallet.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    default_balance: Option<i64>,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new(default_balance: Option<i64>) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            default_balance,
        }
    }

    /// Open or overwrite a wallet.
    pub async fn set_balance(&self, user_id: UserId, balance: i64) {
        self.state.lock().await.balances.insert(user_id, balance);
    }

    /// Journal entries for a user, oldest first.
    pub async fn entries(&self, user_id: UserId) -> Vec<WalletEntry> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Sum of all wallet balances.
    pub async fn total_balance(&self) -> i64 {
        self.state.lock().await.balances.values().sum()
    }

    async fn apply(
        &self,
        user_id: UserId,
        amount: i64,
        entry_type: EntryType,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut state = self.state.lock().await;

        if state.applied_keys.contains(&idempotency_key) {
            return Err(WalletError::DuplicateTransaction(idempotency_key));
        }

        let current = match state.balances.get(&user_id) {
            Some(balance) => *balance,
            None => self
                .default_balance
                .ok_or(WalletError::WalletNotFound(user_id))?,
        };

        let signed = match entry_type {
            EntryType::Stake => {
                if current < amount {
                    return Err(WalletError::InsufficientBalance {
                        available: current,
                        required: amount,
                    });
                }
                -amount
            }
            EntryType::Prize | EntryType::Refund => amount,
        };
        let new_balance = current + signed;

        state.balances.insert(user_id, new_balance);
        state.applied_keys.insert(idempotency_key.clone());
        let id = state.entries.len() as i64 + 1;
        state.entries.push(WalletEntry {
            id,
            user_id,
            amount: signed,
            balance_after: new_balance,
            direction: entry_type.direction(),
            entry_type,
            idempotency_key,
            created_at: Utc::now(),
        });

        Ok(new_balance)
    }
}

#[async_trait]
impl WalletLedger for InMemoryLedger {
    async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        self.apply(user_id, amount, EntryType::Stake, idempotency_key)
            .await
    }

    async fn credit(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        self.apply(user_id, amount, EntryType::Prize, idempotency_key)
            .await
    }

    async fn refund(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        self.apply(user_id, amount, EntryType::Refund, idempotency_key)
            .await
    }

    async fn get_balance(&self, user_id: UserId) -> WalletResult<i64> {
        let state = self.state.lock().await;
        state
            .balances
            .get(&user_id)
            .copied()
            .or(self.default_balance)
            .ok_or(WalletError::WalletNotFound(user_id))
    }

    async fn recent_entries(&self, user_id: UserId, limit: usize) -> WalletResult<Vec<WalletEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debit_and_credit() {
        let ledger = InMemoryLedger::new(None);
        ledger.set_balance(1, 100).await;

        assert_eq!(ledger.debit(1, 30, "a".into()).await.unwrap(), 70);
        assert_eq!(ledger.credit(1, 5, "b".into()).await.unwrap(), 75);
        assert_eq!(ledger.refund(1, 30, "c".into()).await.unwrap(), 105);
        assert_eq!(ledger.get_balance(1).await.unwrap(), 105);

        let entries = ledger.entries(1).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].amount, -30);
        assert_eq!(entries[0].entry_type, EntryType::Stake);
        assert_eq!(entries[2].balance_after, 105);

        let recent = ledger.recent_entries(1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].entry_type, EntryType::Refund);
        assert_eq!(recent[1].entry_type, EntryType::Prize);
    }

    #[tokio::test]
    async fn test_debit_never_goes_negative() {
        let ledger = InMemoryLedger::new(None);
        ledger.set_balance(1, 10).await;

        let err = ledger.debit(1, 11, "k".into()).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientBalance {
                available: 10,
                required: 11
            }
        ));
        assert_eq!(ledger.get_balance(1).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let ledger = InMemoryLedger::new(Some(50));
        ledger.debit(1, 10, "stake:x".into()).await.unwrap();
        let err = ledger.debit(1, 10, "stake:x".into()).await.unwrap_err();
        assert!(matches!(err, WalletError::DuplicateTransaction(_)));
        assert_eq!(ledger.get_balance(1).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_unknown_wallet() {
        let ledger = InMemoryLedger::new(None);
        assert!(matches!(
            ledger.get_balance(9).await,
            Err(WalletError::WalletNotFound(9))
        ));
        assert!(matches!(
            ledger.debit(9, 1, "k".into()).await,
            Err(WalletError::WalletNotFound(9))
        ));
    }

    #[tokio::test]
    async fn test_invalid_amount() {
        let ledger = InMemoryLedger::new(Some(10));
        assert!(matches!(
            ledger.credit(1, 0, "k".into()).await,
            Err(WalletError::InvalidAmount(0))
        ));
    }
}
