//! Tier actor implementation with async message handling.

use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{broadcast, mpsc},
    time::{Instant, MissedTickBehavior, interval},
};
use uuid::Uuid;

use super::{
    config::TierConfig,
    engine::TierEngine,
    events::TierEvent,
    messages::TierMessage,
};
use crate::{
    errors::{BingoError, BingoResult},
    game::CardTable,
    session::BetAmount,
    wallet::WalletLedger,
};

/// Capacity of each tier inbox
const INBOX_CAPACITY: usize = 100;

/// Tier actor handle for sending messages
#[derive(Clone, Debug)]
pub struct TierHandle {
    sender: mpsc::Sender<TierMessage>,
    bet_amount: BetAmount,
}

impl TierHandle {
    /// Create a new tier handle
    pub fn new(sender: mpsc::Sender<TierMessage>, bet_amount: BetAmount) -> Self {
        Self { sender, bet_amount }
    }

    pub fn bet_amount(&self) -> BetAmount {
        self.bet_amount
    }

    /// Send a message to the tier
    pub async fn send(&self, message: TierMessage) -> BingoResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| BingoError::TierUnavailable(self.bet_amount))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Actor owning one bet tier
pub struct TierActor {
    engine: TierEngine,

    inbox: mpsc::Receiver<TierMessage>,

    /// Per-tier subscribers (tier WebSocket connections)
    subscribers: HashMap<Uuid, mpsc::Sender<TierEvent>>,

    /// Process-wide feed shared by all tiers (lobby and metrics)
    feed: broadcast::Sender<TierEvent>,

    is_closed: bool,
}

impl TierActor {
    /// Create a new tier actor
    ///
    /// # Returns
    ///
    /// * `(TierActor, TierHandle)` - Actor and handle for sending messages
    pub fn new(
        bet_amount: BetAmount,
        config: TierConfig,
        ledger: Arc<dyn WalletLedger>,
        cards: Arc<dyn CardTable>,
        feed: broadcast::Sender<TierEvent>,
    ) -> BingoResult<(Self, TierHandle)> {
        let engine = TierEngine::new(bet_amount, config, ledger, cards)?;
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);

        let actor = Self {
            engine,
            inbox,
            subscribers: HashMap::new(),
            feed,
            is_closed: false,
        };

        Ok((actor, TierHandle::new(sender, bet_amount)))
    }

    /// Run the tier actor event loop
    pub async fn run(mut self) {
        let bet = self.engine.bet_amount();
        log::info!("Tier {} starting", bet);

        let mut tick_interval = interval(self.engine.config().tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    self.handle_message(message).await;
                    self.dispatch_events();

                    if self.is_closed {
                        break;
                    }
                }

                _ = tick_interval.tick() => {
                    self.engine.tick(Instant::now()).await;
                    self.dispatch_events();
                }
            }
        }

        log::info!("Tier {} closed", bet);
    }

    async fn handle_message(&mut self, message: TierMessage) {
        match message {
            TierMessage::Reserve {
                card_number,
                user_id,
                operation_id,
                response,
            } => {
                let result = self
                    .engine
                    .reserve(card_number, user_id, operation_id, Instant::now())
                    .await;
                let _ = response.send(result);
            }

            TierMessage::Release {
                card_number,
                user_id,
                operation_id,
                response,
            } => {
                let result = self
                    .engine
                    .release(card_number, user_id, operation_id, Instant::now())
                    .await;
                let _ = response.send(result);
            }

            TierMessage::Claim {
                card_number,
                user_id,
                operation_id,
                response,
            } => {
                let result = self
                    .engine
                    .claim(card_number, user_id, operation_id, Instant::now())
                    .await;
                let _ = response.send(result);
            }

            TierMessage::GetSessions { response } => {
                let _ = response.send(self.engine.sessions());
            }

            TierMessage::GetTimerState { response } => {
                let _ = response.send(self.engine.timer_state(Instant::now()));
            }

            TierMessage::GetSnapshot { response } => {
                let _ = response.send(self.engine.snapshot(Instant::now()));
            }

            TierMessage::GetHistory { response } => {
                let _ = response.send(self.engine.history());
            }

            TierMessage::Tick => {
                self.engine.tick(Instant::now()).await;
            }

            TierMessage::Subscribe {
                subscriber_id,
                sender,
                response,
            } => {
                self.subscribers.insert(subscriber_id, sender);
                let _ = response.send(self.engine.snapshot(Instant::now()));
                log::debug!(
                    "Subscriber {} joined tier {}",
                    subscriber_id,
                    self.engine.bet_amount()
                );
            }

            TierMessage::Unsubscribe { subscriber_id } => {
                self.subscribers.remove(&subscriber_id);
                log::debug!(
                    "Subscriber {} left tier {}",
                    subscriber_id,
                    self.engine.bet_amount()
                );
            }

            TierMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(());
            }
        }
    }

    /// Forward engine events to subscribers and the shared feed, in order.
    fn dispatch_events(&mut self) {
        for event in self.engine.drain_events() {
            self.subscribers.retain(|id, sender| match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // A gap would break ordering; the client resyncs on reconnect
                    log::warn!("Subscriber {} lagging at {}, removing", id, event.name());
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {} disconnected, removing", id);
                    false
                }
            });

            // No receivers is fine
            let _ = self.feed.send(event);
        }
    }
}
