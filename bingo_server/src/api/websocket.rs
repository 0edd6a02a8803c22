//! WebSocket handlers for live lobby and tier updates.
//!
//! # Lobby
//!
//! `GET /ws/lobby` sends the timer state of every tier on connect, then a
//! `timer-states-update` whenever a tier's timer, status or player count changes.
//!
//! # Tier
//!
//! `GET /ws/tiers/{bet}?user_id=N` sends a `resync` snapshot on connect and
//! then every tier event in the order the tier applied it. If the connection
//! falls behind, the tier drops it from its subscribers; the handler then
//! resubscribes and sends a fresh `resync` so the client never sees a gap.
//!
//! Clients send JSON commands:
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/tiers/10?user_id=1');
//! ws.send(JSON.stringify({ type: "reserve", card_number: 7, operation_id: "a1" }));
//! ws.send(JSON.stringify({ type: "claim", card_number: 7 }));
//! ws.send(JSON.stringify({ type: "resync" }));
//! ```
//!
//! Each command gets an `ack` or an `error` reply. A user's commands on one card are
//! single-flight: a second one while the first is running gets
//! `operation_pending`.

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bingo_engine::{
    game::CardNumber,
    session::{BetAmount, UserId},
    tier::{RoundSnapshot, TierEvent, TimerState},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::{
    AppState,
    errors::ApiError,
    rate_limiter::CommandLimiter,
    tiers::{CardCommand, CommandOutcome, parse_card, run_card_command},
};
use crate::metrics;

/// Capacity of one connection's event queue
const SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Debug, Default, Deserialize)]
pub struct TierQuery {
    user_id: Option<UserId>,
}

/// Client messages received on a tier connection
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Reserve {
        card_number: u8,
        #[serde(default)]
        operation_id: Option<String>,
    },
    Release {
        card_number: u8,
        #[serde(default)]
        operation_id: Option<String>,
    },
    Claim {
        card_number: u8,
        #[serde(default)]
        operation_id: Option<String>,
    },
    Resync,
}

/// Messages the server sends besides tier events
#[derive(Debug, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    Resync(RoundSnapshot),
    Lobby {
        timers: Vec<TimerState>,
    },
    Ack {
        command: &'static str,
        card_number: CardNumber,
        result: CommandOutcome,
    },
    Error {
        command: Option<&'static str>,
        code: &'static str,
        message: String,
    },
}

impl ServerMessage {
    fn error(command: Option<&'static str>, err: &ApiError) -> Self {
        ServerMessage::Error {
            command,
            code: err.code(),
            message: err.message(),
        }
    }
}

type Sink = SplitSink<WebSocket, Message>;

async fn send_json<T: Serialize>(sink: &mut Sink, message: &T) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize WebSocket message: {}", e);
            true
        }
    }
}

// ============================================================================
// Lobby
// ============================================================================

pub async fn lobby_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_lobby(socket, state))
}

async fn handle_lobby(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut feed = state.tiers.subscribe_feed();
    metrics::websocket_connected("lobby");
    debug!("Lobby connection opened");

    let timers = state.tiers.timer_states().await;
    if send_json(&mut sink, &ServerMessage::Lobby { timers }).await {
        loop {
            tokio::select! {
                event = feed.recv() => {
                    let message = match event {
                        Ok(event @ TierEvent::TimerStatesUpdate { .. }) => {
                            send_json(&mut sink, &event).await
                        }
                        Ok(_) => true,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Lobby connection skipped {} events, sending full state", skipped);
                            let timers = state.tiers.timer_states().await;
                            send_json(&mut sink, &ServerMessage::Lobby { timers }).await
                        }
                        Err(broadcast::error::RecvError::Closed) => false,
                    };
                    if !message {
                        break;
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    metrics::websocket_disconnected("lobby");
    debug!("Lobby connection closed");
}

// ============================================================================
// Tier
// ============================================================================

/// Upgrade to a tier connection.
///
/// Without `user_id` the connection is read-only: events stream normally but
/// card commands are refused.
pub async fn tier_handler(
    ws: WebSocketUpgrade,
    Path(bet_amount): Path<BetAmount>,
    Query(query): Query<TierQuery>,
    State(state): State<AppState>,
) -> Response {
    let user_id = query.user_id.filter(|&id| id > 0);
    ws.on_upgrade(move |socket| handle_tier(socket, bet_amount, user_id, state))
}

/// Subscribe and push the snapshot the event stream continues from.
async fn resubscribe(
    state: &AppState,
    bet_amount: BetAmount,
    sink: &mut Sink,
) -> Option<(Uuid, mpsc::Receiver<TierEvent>)> {
    let subscriber_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
    match state.tiers.subscribe(bet_amount, subscriber_id, tx).await {
        Ok(snapshot) => {
            if send_json(sink, &ServerMessage::Resync(snapshot)).await {
                Some((subscriber_id, rx))
            } else {
                None
            }
        }
        Err(err) => {
            let _ = send_json(sink, &ServerMessage::error(None, &err.into())).await;
            None
        }
    }
}

async fn handle_tier(socket: WebSocket, bet_amount: BetAmount, user_id: Option<UserId>, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    metrics::websocket_connected("tier");
    info!("WebSocket connected: tier={}, user={:?}", bet_amount, user_id);

    let Some((mut subscriber_id, mut events)) = resubscribe(&state, bet_amount, &mut sink).await else {
        metrics::websocket_disconnected("tier");
        return;
    };
    let mut limiter = CommandLimiter::default();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => {
                        if !send_json(&mut sink, &event).await {
                            break;
                        }
                    }
                    // Dropped by the tier for lagging
                    None => {
                        debug!("Tier {} subscriber {} dropped, resyncing", bet_amount, subscriber_id);
                        match resubscribe(&state, bet_amount, &mut sink).await {
                            Some((id, rx)) => {
                                subscriber_id = id;
                                events = rx;
                            }
                            None => break,
                        }
                    }
                }
            }
            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };

                if !limiter.check() {
                    warn!("Rate limit exceeded for user {:?} on tier {}", user_id, bet_amount);
                    let reply = ServerMessage::Error {
                        command: None,
                        code: "rate_limited",
                        message: "Too many commands. Please slow down.".to_string(),
                    };
                    if !send_json(&mut sink, &reply).await {
                        break;
                    }
                    continue;
                }

                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(ClientMessage::Resync) => match state.tiers.round_state(bet_amount).await {
                        Ok(snapshot) => ServerMessage::Resync(snapshot),
                        Err(err) => ServerMessage::error(None, &err.into()),
                    },
                    Ok(message) => handle_command(&state, bet_amount, user_id, message).await,
                    Err(e) => {
                        debug!("Unparsable tier command: {}", e);
                        ServerMessage::Error {
                            command: None,
                            code: "invalid_message",
                            message: "Invalid message format".to_string(),
                        }
                    }
                };
                if !send_json(&mut sink, &reply).await {
                    break;
                }
            }
        }
    }

    state.tiers.unsubscribe(bet_amount, subscriber_id).await;
    metrics::websocket_disconnected("tier");
    info!("WebSocket disconnected: tier={}, user={:?}", bet_amount, user_id);
}

/// Split a card command into its parts.
pub fn command_parts(message: ClientMessage) -> Option<(CardCommand, u8, Option<String>)> {
    match message {
        ClientMessage::Reserve {
            card_number,
            operation_id,
        } => Some((CardCommand::Reserve, card_number, operation_id)),
        ClientMessage::Release {
            card_number,
            operation_id,
        } => Some((CardCommand::Release, card_number, operation_id)),
        ClientMessage::Claim {
            card_number,
            operation_id,
        } => Some((CardCommand::Claim, card_number, operation_id)),
        ClientMessage::Resync => None,
    }
}

async fn handle_command(
    state: &AppState,
    bet_amount: BetAmount,
    user_id: Option<UserId>,
    message: ClientMessage,
) -> ServerMessage {
    let Some((command, card, operation_id)) = command_parts(message) else {
        return ServerMessage::error(None, &ApiError::MissingUser);
    };
    let Some(user_id) = user_id else {
        return ServerMessage::error(Some(command.name()), &ApiError::MissingUser);
    };
    let card_number = match parse_card(card) {
        Ok(card_number) => card_number,
        Err(err) => return ServerMessage::error(Some(command.name()), &err),
    };

    match run_card_command(state, command, bet_amount, card_number, user_id, operation_id).await {
        Ok(result) => ServerMessage::Ack {
            command: command.name(),
            card_number,
            result,
        },
        Err(err) => ServerMessage::error(Some(command.name()), &err),
    }
}
