//! Wallet read endpoint for the calling user.

use axum::{
    Json,
    extract::{Extension, Query, State},
};
use bingo_engine::{session::UserId, wallet::WalletEntry};
use serde::{Deserialize, Serialize};

use super::{AppState, errors::ApiError};

const DEFAULT_ENTRY_LIMIT: usize = 20;
const MAX_ENTRY_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct WalletQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub user_id: UserId,
    pub balance: i64,
    pub entries: Vec<WalletEntry>,
}

/// Balance and latest journal entries (stakes, refunds, prizes).
///
/// # Response
///
/// ```json
/// {"userId": 1, "balance": 114, "entries": [{"amount": 24, "entryType": "prize", "balanceAfter": 114, ...}]}
/// ```
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<WalletResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_ENTRY_LIMIT).min(MAX_ENTRY_LIMIT);
    let ledger = state.tiers.ledger();

    let balance = ledger.get_balance(user_id).await?;
    let entries = ledger.recent_entries(user_id, limit).await?;

    Ok(Json(WalletResponse {
        user_id,
        balance,
        entries,
    }))
}
