//! Card table lookup.

use axum::{
    Json,
    extract::{Path, State},
};
use bingo_engine::{BingoError, game::BingoCard};

use super::{AppState, errors::ApiError, tiers::parse_card};

/// Printed layout of one card, `0` marking the free centre.
///
/// # Response
///
/// ```json
/// {"card_number": 7, "grid": [[12, 16, 31, 46, 61], ...]}
/// ```
pub async fn get_card(
    State(state): State<AppState>,
    Path(card): Path<u8>,
) -> Result<Json<BingoCard>, ApiError> {
    let card_number = parse_card(card)?;
    let card = state
        .cards
        .get_card(card_number)
        .ok_or(BingoError::InvalidCard(card))?;
    Ok(Json(card.as_ref().clone()))
}
