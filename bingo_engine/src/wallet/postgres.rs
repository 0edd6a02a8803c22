//! PostgreSQL ledger backed by `wallets` and `wallet_entries`.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

use super::{
    errors::{WalletError, WalletResult},
    ledger::WalletLedger,
    models::{EntryDirection, EntryType, Wallet, WalletEntry},
};
use crate::session::UserId;

/// Ledger adapter over a Postgres pool.
///
/// Each mutation runs in one transaction: idempotency check, conditional
/// balance update, journal insert.
#[derive(Clone)]
pub struct PgWalletLedger {
    pool: Arc<PgPool>,
}

impl PgWalletLedger {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get wallet for a user
    pub async fn get_wallet(&self, user_id: UserId) -> WalletResult<Wallet> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(WalletError::WalletNotFound(user_id))?;

        Ok(Wallet {
            user_id: row.get("user_id"),
            balance: row.get("balance"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        })
    }

    async fn fetch_entries(&self, user_id: UserId, limit: i64) -> WalletResult<Vec<WalletEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, amount, balance_after, direction, entry_type, idempotency_key, created_at
            FROM wallet_entries
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        let entries = rows
            .into_iter()
            .filter_map(|row| {
                let entry_type: EntryType = row.get::<String, _>("entry_type").parse().ok()?;
                Some(WalletEntry {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    amount: row.get("amount"),
                    balance_after: row.get("balance_after"),
                    direction: entry_type.direction(),
                    entry_type,
                    idempotency_key: row.get("idempotency_key"),
                    created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
                })
            })
            .collect();

        Ok(entries)
    }

    async fn ensure_unused_key(
        tx: &mut Transaction<'_, Postgres>,
        idempotency_key: &str,
    ) -> WalletResult<()> {
        let existing = sqlx::query("SELECT id FROM wallet_entries WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&mut **tx)
            .await?;

        match existing {
            Some(_) => Err(WalletError::DuplicateTransaction(idempotency_key.to_string())),
            None => Ok(()),
        }
    }

    async fn pay_in(
        &self,
        user_id: UserId,
        amount: i64,
        entry_type: EntryType,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;
        Self::ensure_unused_key(&mut tx, &idempotency_key).await?;

        let row = sqlx::query(
            "INSERT INTO wallets (user_id, balance, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (user_id)
             DO UPDATE SET
                balance = wallets.balance + EXCLUDED.balance,
                updated_at = NOW()
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;
        let new_balance: i64 = row.get("balance");

        Self::create_entry(&mut tx, user_id, amount, new_balance, entry_type, idempotency_key)
            .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn create_entry(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        amount: i64,
        balance_after: i64,
        entry_type: EntryType,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        let direction: EntryDirection = entry_type.direction();
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_entries (user_id, amount, balance_after, direction, entry_type, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(balance_after)
        .bind(direction.to_string())
        .bind(entry_type.to_string())
        .bind(idempotency_key)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }
}

#[async_trait]
impl WalletLedger for PgWalletLedger {
    async fn debit(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut tx = self.pool.begin().await?;
        Self::ensure_unused_key(&mut tx, &idempotency_key).await?;

        // Check and update in one statement so concurrent debits can't overdraw
        let updated = sqlx::query(
            "UPDATE wallets
             SET balance = balance - $1, updated_at = NOW()
             WHERE user_id = $2 AND balance >= $1
             RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_balance: i64 = match updated {
            Some(row) => row.get("balance"),
            None => {
                let current = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;

                return match current {
                    Some(row) => Err(WalletError::InsufficientBalance {
                        available: row.get("balance"),
                        required: amount,
                    }),
                    None => Err(WalletError::WalletNotFound(user_id)),
                };
            }
        };

        Self::create_entry(
            &mut tx,
            user_id,
            -amount,
            new_balance,
            EntryType::Stake,
            idempotency_key,
        )
        .await?;

        tx.commit().await?;
        Ok(new_balance)
    }

    async fn credit(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        self.pay_in(user_id, amount, EntryType::Prize, idempotency_key)
            .await
    }

    async fn refund(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: String,
    ) -> WalletResult<i64> {
        self.pay_in(user_id, amount, EntryType::Refund, idempotency_key)
            .await
    }

    async fn get_balance(&self, user_id: UserId) -> WalletResult<i64> {
        Ok(self.get_wallet(user_id).await?.balance)
    }

    async fn recent_entries(&self, user_id: UserId, limit: usize) -> WalletResult<Vec<WalletEntry>> {
        self.fetch_entries(user_id, i64::try_from(limit).unwrap_or(i64::MAX))
            .await
    }
}
