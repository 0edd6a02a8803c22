//! Structured logging configuration.
//!
//! `tracing-subscriber` is the single sink: engine records emitted through the
//! `log` facade are bridged into it, so round transitions and wallet failures
//! land in the same stream as request logs.

use bingo_engine::tier::TierEvent;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, defaulting to `info,sqlx=warn,hyper=warn`.
///
/// # Example
///
/// ```no_run
/// use bingo_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a round lifecycle event from the tier feed.
///
/// Per-number calls and timer updates are frequent and go to `debug`.
pub fn log_round_event(event: &TierEvent) {
    match event {
        TierEvent::GameStarted {
            bet_amount,
            round,
            player_count,
            prize_pool,
        } => tracing::info!(
            bet_amount = *bet_amount,
            round = *round,
            player_count = *player_count,
            prize_pool = *prize_pool,
            "Round started"
        ),
        TierEvent::GameEnded(result) => tracing::info!(
            bet_amount = result.bet_amount,
            round = result.round,
            outcome = ?result.outcome,
            winners = result.total_winners,
            prize_pool = result.prize_pool,
            split = result.split,
            pending_payouts = result.pending_payouts.len(),
            "Round ended"
        ),
        TierEvent::RoundCancelled {
            bet_amount,
            round,
            reason,
            refunds,
            pending_refunds,
        } => tracing::info!(
            bet_amount = *bet_amount,
            round = *round,
            refunds = refunds.len(),
            pending_refunds = pending_refunds.len(),
            "Round cancelled: {}",
            reason
        ),
        TierEvent::WinnerAnnounced {
            bet_amount,
            round,
            claim,
        } => tracing::info!(
            bet_amount = *bet_amount,
            round = *round,
            card = claim.card_number.value(),
            user_id = claim.user_id,
            pattern = %claim.pattern,
            "Winner announced"
        ),
        other => tracing::debug!(event = other.name(), "Tier event"),
    }
}

/// Log a rejected or failed player request
pub fn log_rejected_request(operation: &str, bet_amount: i64, user_id: i64, code: &str, message: &str) {
    tracing::warn!(
        operation = operation,
        bet_amount = bet_amount,
        user_id = user_id,
        code = code,
        "Request rejected: {}",
        message
    );
}

/// Log API request/response
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64, user_id: Option<i64>) {
    tracing::info!(
        http_method = method,
        http_path = path,
        http_status = status_code,
        duration_ms = duration_ms,
        user_id = user_id,
        "API request completed"
    );
}
