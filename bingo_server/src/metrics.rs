//! Prometheus metrics for monitoring round health.
//!
//! Metrics are exposed in Prometheus text format on a separate listener when
//! `METRICS_BIND` is set. Without an installed recorder every call below is a
//! no-op.
//!
//! # Metrics Categories
//!
//! - **WebSocket Metrics**: active and total connections
//! - **Request Metrics**: reservations and claims by outcome
//! - **Round Metrics**: rounds started, cancelled and completed, numbers called, prize pools
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bingo_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::reservations_total("ok");
//! ```

use bingo_engine::tier::{RoundOutcome, TierEvent};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Adjust the active WebSocket connections gauge.
pub fn websocket_connected(channel: &'static str) {
    metrics::counter!("websocket_connections_total", "channel" => channel).increment(1);
    metrics::gauge!("websocket_connections_active", "channel" => channel).increment(1.0);
}

pub fn websocket_disconnected(channel: &'static str) {
    metrics::gauge!("websocket_connections_active", "channel" => channel).decrement(1.0);
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Count a reservation attempt by outcome code (`ok` or an error code).
pub fn reservations_total(outcome: &'static str) {
    metrics::counter!("reservations_total", "outcome" => outcome).increment(1);
}

/// Count a claim attempt by outcome code (`ok` or an error code).
pub fn claims_total(outcome: &'static str) {
    metrics::counter!("claims_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Round Metrics
// ============================================================================

/// Update round metrics from one tier event.
pub fn record_event(event: &TierEvent) {
    match event {
        TierEvent::GameStarted { bet_amount, .. } => {
            metrics::counter!("rounds_started_total", "tier" => bet_amount.to_string()).increment(1);
        }
        TierEvent::RoundCancelled {
            bet_amount,
            pending_refunds,
            ..
        } => {
            metrics::counter!("rounds_cancelled_total", "tier" => bet_amount.to_string()).increment(1);
            metrics::counter!("payouts_deferred_total").increment(pending_refunds.len() as u64);
        }
        TierEvent::GameEnded(result) => {
            let outcome = match result.outcome {
                RoundOutcome::Won => "won",
                RoundOutcome::NoWinner => "no_winner",
            };
            metrics::counter!("rounds_completed_total",
                "tier" => result.bet_amount.to_string(),
                "outcome" => outcome
            )
            .increment(1);
            metrics::histogram!("prize_pool_units").record(result.prize_pool as f64);
            metrics::counter!("payouts_deferred_total").increment(result.pending_payouts.len() as u64);
        }
        TierEvent::NumberCalled { .. } => {
            metrics::counter!("numbers_called_total").increment(1);
        }
        _ => {}
    }
}
