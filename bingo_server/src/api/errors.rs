//! Mapping of engine errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bingo_engine::{BingoError, game::CardNumber, wallet::WalletError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Request failure as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Engine(BingoError),
    /// The same user already has a request for this card in flight
    OperationPending(CardNumber),
    MissingUser,
    WalletNotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(err) => engine_status(err),
            ApiError::OperationPending(_) => StatusCode::CONFLICT,
            ApiError::MissingUser => StatusCode::UNAUTHORIZED,
            ApiError::WalletNotFound => StatusCode::NOT_FOUND,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Engine(err) => err.code(),
            ApiError::OperationPending(_) => "operation_pending",
            ApiError::MissingUser => "missing_user",
            ApiError::WalletNotFound => "wallet_not_found",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Engine(err) => err.client_message(),
            ApiError::OperationPending(card) => {
                format!("You already have a request for card {} in progress", card)
            }
            ApiError::MissingUser => "Missing or invalid x-user-id header".to_string(),
            ApiError::WalletNotFound => "Wallet not found".to_string(),
        }
    }
}

fn engine_status(err: &BingoError) -> StatusCode {
    match err {
        BingoError::CardTaken(_)
        | BingoError::SelectionLimitExceeded { .. }
        | BingoError::AlreadySubmitted(_)
        | BingoError::NotEnoughPlayers { .. }
        | BingoError::RoundInProgress
        | BingoError::NoActiveRound
        | BingoError::InvalidTransition { .. }
        | BingoError::DuplicateOperation(_) => StatusCode::CONFLICT,
        BingoError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        BingoError::InvalidCard(_) | BingoError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        BingoError::InvalidClaim(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BingoError::NotSessionOwner(_) => StatusCode::FORBIDDEN,
        BingoError::InvalidBetAmount(_) => StatusCode::BAD_REQUEST,
        BingoError::TierUnavailable(_) | BingoError::Ledger(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<BingoError> for ApiError {
    fn from(err: BingoError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::WalletNotFound(_) => ApiError::WalletNotFound,
            other => ApiError::Engine(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}
