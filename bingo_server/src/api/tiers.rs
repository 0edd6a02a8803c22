//! Bet tier API handlers.
//!
//! This module provides HTTP REST endpoints for tier operations including:
//! - Listing every tier's timer state for the lobby
//! - Reading a tier's sessions, current round and past results
//! - Reserving and releasing cards, and claiming a win
//!
//! Write endpoints take the caller from the `x-user-id` header and an optional
//! idempotency key from `x-operation-id`.
//!
//! # Examples
//!
//! Reserve card 7 in the 10-unit tier:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/tiers/10/cards/7/reserve \
//!   -H "x-user-id: 1" \
//!   -H "x-operation-id: 9d3c0a52"
//! ```

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::HeaderMap,
};
use bingo_engine::{
    BingoError,
    game::{CardNumber, WinClaim},
    session::{BetAmount, Session, UserId},
    tier::{GameEndResult, RoundSnapshot, TimerState},
};
use serde::Serialize;

use super::{AppState, errors::ApiError, middleware::operation_id_from_headers};
use crate::{logging, metrics};

/// A card operation requested over HTTP or WebSocket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardCommand {
    Reserve,
    Release,
    Claim,
}

impl CardCommand {
    pub fn name(self) -> &'static str {
        match self {
            CardCommand::Reserve => "reserve",
            CardCommand::Release => "release",
            CardCommand::Claim => "claim",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    Reserved(Session),
    Released { released: bool },
    Claimed(WinClaim),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub bet_amount: BetAmount,
    pub sessions: Vec<Session>,
}

pub fn parse_card(card: u8) -> Result<CardNumber, ApiError> {
    CardNumber::new(card).map_err(|_| ApiError::Engine(BingoError::InvalidCard(card)))
}

/// Run one card command with single-flight per user and card.
///
/// A user's request for a card they already have one in flight for is refused
/// instead of queued. Requests from different users reach the tier actor,
/// which decides who gets the card.
pub async fn run_card_command(
    state: &AppState,
    command: CardCommand,
    bet_amount: BetAmount,
    card_number: CardNumber,
    user_id: UserId,
    operation_id: Option<String>,
) -> Result<CommandOutcome, ApiError> {
    let Some(_guard) = state.pending.try_acquire(bet_amount, card_number, user_id) else {
        return Err(ApiError::OperationPending(card_number));
    };

    let tiers = &state.tiers;
    let result = match command {
        CardCommand::Reserve => tiers
            .reserve(bet_amount, card_number, user_id, operation_id)
            .await
            .map(CommandOutcome::Reserved),
        CardCommand::Release => tiers
            .release(bet_amount, card_number, user_id, operation_id)
            .await
            .map(|()| CommandOutcome::Released { released: true }),
        CardCommand::Claim => tiers
            .claim(bet_amount, card_number, user_id, operation_id)
            .await
            .map(CommandOutcome::Claimed),
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.code(),
    };
    match command {
        CardCommand::Reserve => metrics::reservations_total(outcome),
        CardCommand::Claim => metrics::claims_total(outcome),
        CardCommand::Release => {}
    }
    if let Err(err) = &result {
        logging::log_rejected_request(command.name(), bet_amount, user_id, err.code(), &err.to_string());
    }

    result.map_err(ApiError::from)
}

/// List timer states of every tier.
///
/// # Response
///
/// ```json
/// [{"betAmount": 10, "status": "counting-down", "timer": 17, "playerCount": 2, "prizePool": 16}]
/// ```
pub async fn list_tiers(State(state): State<AppState>) -> Json<Vec<TimerState>> {
    Json(state.tiers.timer_states().await)
}

/// Sessions of a tier ordered by card number.
pub async fn get_sessions(
    State(state): State<AppState>,
    Path(bet_amount): Path<BetAmount>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = state.tiers.sessions(bet_amount).await?;
    Ok(Json(SessionsResponse {
        bet_amount,
        sessions,
    }))
}

/// Full round snapshot, the same payload a WebSocket client gets on resync.
pub async fn get_round(
    State(state): State<AppState>,
    Path(bet_amount): Path<BetAmount>,
) -> Result<Json<RoundSnapshot>, ApiError> {
    Ok(Json(state.tiers.round_state(bet_amount).await?))
}

/// Recent round results, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(bet_amount): Path<BetAmount>,
) -> Result<Json<Vec<GameEndResult>>, ApiError> {
    Ok(Json(state.tiers.history(bet_amount).await?))
}

/// Reserve a card and stake the tier's bet.
///
/// # Errors
///
/// - `409 Conflict`: card taken, selection limit, round in progress
/// - `402 Payment Required`: insufficient funds
/// - `404 Not Found`: card not in the card table
pub async fn reserve_card(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path((bet_amount, card)): Path<(BetAmount, u8)>,
    headers: HeaderMap,
) -> Result<Json<CommandOutcome>, ApiError> {
    let card_number = parse_card(card)?;
    let outcome = run_card_command(
        &state,
        CardCommand::Reserve,
        bet_amount,
        card_number,
        user_id,
        operation_id_from_headers(&headers),
    )
    .await?;
    Ok(Json(outcome))
}

/// Release a reserved card and refund its stake.
pub async fn release_card(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path((bet_amount, card)): Path<(BetAmount, u8)>,
    headers: HeaderMap,
) -> Result<Json<CommandOutcome>, ApiError> {
    let card_number = parse_card(card)?;
    let outcome = run_card_command(
        &state,
        CardCommand::Release,
        bet_amount,
        card_number,
        user_id,
        operation_id_from_headers(&headers),
    )
    .await?;
    Ok(Json(outcome))
}

/// Claim a win on a card.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: no pattern through the last called number; the card is now blocked
/// - `409 Conflict`: card already claimed or no round in play
pub async fn claim_card(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path((bet_amount, card)): Path<(BetAmount, u8)>,
    headers: HeaderMap,
) -> Result<Json<CommandOutcome>, ApiError> {
    let card_number = parse_card(card)?;
    let outcome = run_card_command(
        &state,
        CardCommand::Claim,
        bet_amount,
        card_number,
        user_id,
        operation_id_from_headers(&headers),
    )
    .await?;
    Ok(Json(outcome))
}
