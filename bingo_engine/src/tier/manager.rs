//! Tier manager for spawning and addressing tier actors.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use uuid::Uuid;

use super::{
    actor::{TierActor, TierHandle},
    config::TierConfig,
    events::{RoundSnapshot, TierEvent, TimerState},
    messages::TierMessage,
    settlement::GameEndResult,
};
use crate::{
    errors::{BingoError, BingoResult},
    game::{CardNumber, CardTable, WinClaim},
    session::{BetAmount, Session, UserId},
    wallet::WalletLedger,
};

/// Capacity of the process-wide event feed
const FEED_CAPACITY: usize = 1024;

/// Owns one actor per stake amount. Tiers are created on first use and live
/// for the rest of the process.
pub struct TierManager {
    config: TierConfig,

    ledger: Arc<dyn WalletLedger>,

    cards: Arc<dyn CardTable>,

    /// Active tier handles
    tiers: Arc<RwLock<HashMap<BetAmount, TierHandle>>>,

    /// Accepted stakes; any positive stake when `None`
    allowed_bets: Option<BTreeSet<BetAmount>>,

    feed: broadcast::Sender<TierEvent>,
}

impl TierManager {
    pub fn new(config: TierConfig, ledger: Arc<dyn WalletLedger>, cards: Arc<dyn CardTable>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            config,
            ledger,
            cards,
            tiers: Arc::new(RwLock::new(HashMap::new())),
            allowed_bets: None,
            feed,
        }
    }

    /// Restrict the manager to a fixed set of stakes.
    #[must_use]
    pub fn with_allowed_bets(mut self, bets: impl IntoIterator<Item = BetAmount>) -> Self {
        let bets: BTreeSet<_> = bets.into_iter().collect();
        self.allowed_bets = (!bets.is_empty()).then_some(bets);
        self
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    pub fn cards(&self) -> &Arc<dyn CardTable> {
        &self.cards
    }

    pub fn ledger(&self) -> &Arc<dyn WalletLedger> {
        &self.ledger
    }

    /// Spawn every allowed tier up front so the lobby lists them.
    pub async fn spawn_allowed(&self) -> BingoResult<usize> {
        let Some(bets) = self.allowed_bets.clone() else {
            return Ok(0);
        };
        for bet in &bets {
            self.get_or_spawn(*bet).await?;
        }
        Ok(bets.len())
    }

    fn check_bet(&self, bet_amount: BetAmount) -> BingoResult<()> {
        let allowed = bet_amount > 0
            && self
                .allowed_bets
                .as_ref()
                .is_none_or(|bets| bets.contains(&bet_amount));
        if allowed {
            Ok(())
        } else {
            Err(BingoError::InvalidBetAmount(bet_amount))
        }
    }

    /// Get a tier handle if the tier has been created
    pub async fn get_tier(&self, bet_amount: BetAmount) -> Option<TierHandle> {
        let tiers = self.tiers.read().await;
        tiers.get(&bet_amount).cloned()
    }

    /// Get a tier handle, spawning the actor on first use
    pub async fn get_or_spawn(&self, bet_amount: BetAmount) -> BingoResult<TierHandle> {
        self.check_bet(bet_amount)?;

        if let Some(handle) = self.get_tier(bet_amount).await
            && !handle.is_closed()
        {
            return Ok(handle);
        }

        let mut tiers = self.tiers.write().await;
        // Another caller may have spawned it while we waited for the lock
        if let Some(handle) = tiers.get(&bet_amount)
            && !handle.is_closed()
        {
            return Ok(handle.clone());
        }

        let (actor, handle) = TierActor::new(
            bet_amount,
            self.config.clone(),
            self.ledger.clone(),
            self.cards.clone(),
            self.feed.clone(),
        )?;
        tiers.insert(bet_amount, handle.clone());
        drop(tiers);

        tokio::spawn(async move {
            actor.run().await;
        });

        log::info!("Spawned tier {}", bet_amount);
        Ok(handle)
    }

    async fn request<T>(
        &self,
        bet_amount: BetAmount,
        build: impl FnOnce(oneshot::Sender<T>) -> TierMessage,
    ) -> BingoResult<T> {
        let handle = self.get_or_spawn(bet_amount).await?;
        let (tx, rx) = oneshot::channel();
        handle.send(build(tx)).await?;
        rx.await.map_err(|_| BingoError::TierUnavailable(bet_amount))
    }

    pub async fn reserve(
        &self,
        bet_amount: BetAmount,
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
    ) -> BingoResult<Session> {
        self.request(bet_amount, |response| TierMessage::Reserve {
            card_number,
            user_id,
            operation_id,
            response,
        })
        .await?
    }

    pub async fn release(
        &self,
        bet_amount: BetAmount,
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
    ) -> BingoResult<()> {
        self.request(bet_amount, |response| TierMessage::Release {
            card_number,
            user_id,
            operation_id,
            response,
        })
        .await?
    }

    pub async fn claim(
        &self,
        bet_amount: BetAmount,
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
    ) -> BingoResult<WinClaim> {
        self.request(bet_amount, |response| TierMessage::Claim {
            card_number,
            user_id,
            operation_id,
            response,
        })
        .await?
    }

    pub async fn sessions(&self, bet_amount: BetAmount) -> BingoResult<Vec<Session>> {
        self.request(bet_amount, |response| TierMessage::GetSessions { response })
            .await
    }

    pub async fn round_state(&self, bet_amount: BetAmount) -> BingoResult<RoundSnapshot> {
        self.request(bet_amount, |response| TierMessage::GetSnapshot { response })
            .await
    }

    pub async fn history(&self, bet_amount: BetAmount) -> BingoResult<Vec<GameEndResult>> {
        self.request(bet_amount, |response| TierMessage::GetHistory { response })
            .await
    }

    /// Lobby timers of every live tier, ordered by stake.
    pub async fn timer_states(&self) -> Vec<TimerState> {
        let handles: Vec<TierHandle> = {
            let tiers = self.tiers.read().await;
            tiers.values().cloned().collect()
        };

        let mut states = Vec::with_capacity(handles.len());
        for handle in handles {
            let (tx, rx) = oneshot::channel();
            if handle
                .send(TierMessage::GetTimerState { response: tx })
                .await
                .is_err()
            {
                continue;
            }
            if let Ok(state) = rx.await {
                states.push(state);
            }
        }
        states.sort_by_key(|s| s.bet_amount);
        states
    }

    /// Ask a tier to process its timers now.
    pub async fn tick(&self, bet_amount: BetAmount) -> BingoResult<()> {
        let handle = self
            .get_tier(bet_amount)
            .await
            .ok_or(BingoError::TierUnavailable(bet_amount))?;
        handle.send(TierMessage::Tick).await
    }

    /// Subscribe to one tier. Returns the snapshot the stream continues from.
    pub async fn subscribe(
        &self,
        bet_amount: BetAmount,
        subscriber_id: Uuid,
        sender: mpsc::Sender<TierEvent>,
    ) -> BingoResult<RoundSnapshot> {
        self.request(bet_amount, |response| TierMessage::Subscribe {
            subscriber_id,
            sender,
            response,
        })
        .await
    }

    pub async fn unsubscribe(&self, bet_amount: BetAmount, subscriber_id: Uuid) {
        if let Some(handle) = self.get_tier(bet_amount).await {
            let _ = handle.send(TierMessage::Unsubscribe { subscriber_id }).await;
        }
    }

    /// Events of every tier, for lobby views and metrics.
    pub fn subscribe_feed(&self) -> broadcast::Receiver<TierEvent> {
        self.feed.subscribe()
    }

    /// Get active tier count
    pub async fn tier_count(&self) -> usize {
        let tiers = self.tiers.read().await;
        tiers.len()
    }

    /// Stop every tier actor.
    pub async fn shutdown(&self) {
        let handles: Vec<TierHandle> = {
            let mut tiers = self.tiers.write().await;
            tiers.drain().map(|(_, handle)| handle).collect()
        };

        for handle in handles {
            let (tx, rx) = oneshot::channel();
            if handle.send(TierMessage::Close { response: tx }).await.is_ok() {
                let _ = rx.await;
            }
        }
        log::info!("All tiers closed");
    }
}
