//! HTTP/WebSocket API for the bingo server.
//!
//! # Modules
//!
//! - [`tiers`]: tier state, card reservations and claims
//! - [`cards`]: card table lookup
//! - [`wallet`]: the caller's balance and ledger journal
//! - [`websocket`]: live lobby and tier streams
//! - [`middleware`]: caller identity and request logging
//! - [`errors`]: engine error to HTTP status mapping
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                                   - Health check
//! GET  /api/v1/tiers                             - Timer state of every tier
//! GET  /api/v1/tiers/{bet}/sessions              - Reserved cards
//! GET  /api/v1/tiers/{bet}/round                 - Round snapshot
//! GET  /api/v1/tiers/{bet}/history               - Recent results
//! POST /api/v1/tiers/{bet}/cards/{card}/reserve  - Reserve a card (x-user-id)
//! POST /api/v1/tiers/{bet}/cards/{card}/release  - Release a card (x-user-id)
//! POST /api/v1/tiers/{bet}/cards/{card}/claim    - Claim a win (x-user-id)
//! GET  /api/v1/cards/{card}                      - Card layout
//! GET  /api/v1/wallet                            - Balance and journal (x-user-id)
//! GET  /ws/lobby                                 - Lobby timer stream
//! GET  /ws/tiers/{bet}?user_id=N                 - Tier event stream and commands
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod cards;
pub mod errors;
pub mod middleware;
pub mod rate_limiter;
pub mod tiers;
pub mod wallet;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use bingo_engine::{
    db::Database,
    game::CardTable,
    session::PendingOperations,
    tier::TierManager,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// - `tiers`: addresses tier actors
/// - `cards`: the card table tiers validate against
/// - `database`: present when the PostgreSQL ledger is in use
/// - `pending`: card requests in flight, per user
#[derive(Clone)]
pub struct AppState {
    pub tiers: Arc<TierManager>,
    pub cards: Arc<dyn CardTable>,
    pub database: Option<Arc<Database>>,
    pub pending: PendingOperations,
}

impl AppState {
    pub fn new(tiers: Arc<TierManager>, database: Option<Arc<Database>>) -> Self {
        Self {
            cards: tiers.cards().clone(),
            tiers,
            database,
            pending: PendingOperations::new(),
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use bingo_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:6969").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let root_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ws/lobby", get(websocket::lobby_handler))
        .route("/ws/tiers/{bet_amount}", get(websocket::tier_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", create_v1_router())
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(middleware::request_log_middleware)),
        )
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    let public_routes = Router::new()
        .route("/tiers", get(tiers::list_tiers))
        .route("/tiers/{bet_amount}/sessions", get(tiers::get_sessions))
        .route("/tiers/{bet_amount}/round", get(tiers::get_round))
        .route("/tiers/{bet_amount}/history", get(tiers::get_history))
        .route("/cards/{card}", get(cards::get_card));

    let player_routes = Router::new()
        .route("/tiers/{bet_amount}/cards/{card}/reserve", post(tiers::reserve_card))
        .route("/tiers/{bet_amount}/cards/{card}/release", post(tiers::release_card))
        .route("/tiers/{bet_amount}/cards/{card}/claim", post(tiers::claim_card))
        .route("/wallet", get(wallet::get_wallet))
        .layer(axum::middleware::from_fn(middleware::user_id_middleware));

    Router::new().merge(public_routes).merge(player_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the ledger database (if any) answers, `503 Service
/// Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","database":null,"tiers":4,"cards":100,"timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => Some(db.health_check().await.is_ok()),
        None => None,
    };
    let healthy = db_healthy.unwrap_or(true);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "tiers": state.tiers.tier_count().await,
        "cards": state.cards.card_count(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
