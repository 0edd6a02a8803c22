//! Round engine for a single bet tier.
//!
//! The engine holds all mutable state of one tier and is driven by explicit
//! calls: client intents (`reserve`, `release`, `claim`) and clock ticks. It is
//! not shared; the owning [`TierActor`](super::TierActor) serializes every
//! call, which makes each operation atomic with respect to the others.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;

use super::{
    config::TierConfig,
    events::{Refund, RoundSnapshot, TierEvent, TimerState},
    grace::GracePeriod,
    settlement::{self, GameEndResult, PayoutKind, PendingPayout},
    state_machine::{BetTier, TierStatus, ceil_secs},
};
use crate::{
    errors::{BingoError, BingoResult},
    game::{
        BingoNumber, CalledNumberLog, CardNumber, CardTable, NumberCaller, WinClaim, evaluate,
    },
    session::{BetAmount, Session, SessionRegistry, SessionStatus, UserId},
    wallet::{WalletError, WalletLedger, WalletResult},
};

/// Pause between retries of payouts the ledger refused
const PAYOUT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome recorded against a client-supplied operation id.
#[derive(Clone, Debug)]
enum RecordedOutcome {
    Reserve(BingoResult<Session>),
    Release(BingoResult<()>),
    Claim(BingoResult<WinClaim>),
}

type OperationKey = (UserId, String);

/// State and rules of one bet tier.
pub struct TierEngine {
    tier: BetTier,
    config: TierConfig,
    registry: SessionRegistry,
    called: CalledNumberLog,
    caller: NumberCaller,
    grace: Option<GracePeriod>,
    next_call_at: Option<Instant>,
    operations: HashMap<OperationKey, RecordedOutcome>,
    last_result: Option<GameEndResult>,
    history: VecDeque<GameEndResult>,
    events: VecDeque<TierEvent>,
    last_timer: Option<TimerState>,
    pending_payouts: Vec<PendingPayout>,
    next_payout_retry: Option<Instant>,
    ledger: Arc<dyn WalletLedger>,
    cards: Arc<dyn CardTable>,
}

impl TierEngine {
    pub fn new(
        bet_amount: BetAmount,
        config: TierConfig,
        ledger: Arc<dyn WalletLedger>,
        cards: Arc<dyn CardTable>,
    ) -> BingoResult<Self> {
        if bet_amount <= 0 {
            return Err(BingoError::InvalidBetAmount(bet_amount));
        }

        let caller = match config.rng_seed {
            Some(seed) => NumberCaller::seeded(seed),
            None => NumberCaller::new(),
        }
        .with_script(config.scripted_calls.clone());

        Ok(Self {
            tier: BetTier::new(bet_amount),
            registry: SessionRegistry::new(config.max_selections_per_user),
            called: CalledNumberLog::new(),
            caller,
            grace: None,
            next_call_at: None,
            operations: HashMap::new(),
            last_result: None,
            history: VecDeque::with_capacity(config.history_len),
            events: VecDeque::new(),
            last_timer: None,
            pending_payouts: Vec::new(),
            next_payout_retry: None,
            config,
            ledger,
            cards,
        })
    }

    pub fn bet_amount(&self) -> BetAmount {
        self.tier.bet_amount()
    }

    pub fn status(&self) -> TierStatus {
        self.tier.status()
    }

    pub fn round(&self) -> u64 {
        self.tier.round()
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Sessions ordered by card number.
    pub fn sessions(&self) -> Vec<Session> {
        self.registry.list()
    }

    pub fn called_numbers(&self) -> &[BingoNumber] {
        self.called.as_slice()
    }

    pub fn last_result(&self) -> Option<&GameEndResult> {
        self.last_result.as_ref()
    }

    /// Finished rounds, oldest first.
    pub fn history(&self) -> Vec<GameEndResult> {
        self.history.iter().cloned().collect()
    }

    /// Refunds and prizes the ledger has not accepted yet.
    pub fn pending_payouts(&self) -> &[PendingPayout] {
        &self.pending_payouts
    }

    /// Take the events produced since the last drain, in application order.
    pub fn drain_events(&mut self) -> Vec<TierEvent> {
        self.events.drain(..).collect()
    }

    fn prize_pool(&self) -> i64 {
        settlement::prize_pool(self.registry.player_count(), self.bet_amount())
    }

    pub fn timer_state(&self, now: Instant) -> TimerState {
        let timer = match self.tier.status() {
            TierStatus::CountingDown => {
                ceil_secs(self.tier.countdown_remaining(now, self.config.countdown))
            }
            TierStatus::Stopped => self
                .grace
                .as_ref()
                .map_or(0, |grace| ceil_secs(grace.remaining(now))),
            _ => 0,
        };

        TimerState {
            bet_amount: self.bet_amount(),
            status: self.tier.status(),
            timer,
            player_count: self.registry.player_count(),
            prize_pool: self.prize_pool(),
        }
    }

    pub fn snapshot(&self, now: Instant) -> RoundSnapshot {
        let timer = self.timer_state(now);
        RoundSnapshot {
            bet_amount: timer.bet_amount,
            round: self.tier.round(),
            status: timer.status,
            timer: timer.timer,
            player_count: timer.player_count,
            prize_pool: timer.prize_pool,
            created_at: self.tier.round_created_at(),
            sessions: self.registry.list(),
            called_numbers: self.called.as_slice().to_vec(),
            current_number: self.called.current(),
            winners: self
                .grace
                .as_ref()
                .map(|grace| grace.winners().to_vec())
                .unwrap_or_default(),
            last_result: self.last_result.clone(),
            pending_payouts: self.pending_payouts.clone(),
        }
    }

    fn recorded(&self, user_id: UserId, operation_id: Option<&str>) -> Option<&RecordedOutcome> {
        operation_id.and_then(|id| self.operations.get(&(user_id, id.to_string())))
    }

    fn record(&mut self, user_id: UserId, operation_id: Option<String>, outcome: RecordedOutcome) {
        if let Some(id) = operation_id {
            self.operations.insert((user_id, id), outcome);
        }
    }

    // ----- Reservation -----

    /// Reserve `card_number` for `user_id` and take the stake.
    ///
    /// Replaying an `operation_id` returns the recorded outcome.
    pub async fn reserve(
        &mut self,
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
        now: Instant,
    ) -> BingoResult<Session> {
        match self.recorded(user_id, operation_id.as_deref()) {
            Some(RecordedOutcome::Reserve(outcome)) => return outcome.clone(),
            Some(_) => return Err(BingoError::DuplicateOperation(operation_id.unwrap_or_default())),
            None => {}
        }

        let outcome = self.reserve_card(card_number, user_id, now).await;
        self.record(user_id, operation_id, RecordedOutcome::Reserve(outcome.clone()));
        outcome
    }

    async fn reserve_card(
        &mut self,
        card_number: CardNumber,
        user_id: UserId,
        now: Instant,
    ) -> BingoResult<Session> {
        if !self.tier.status().is_open() {
            return Err(BingoError::RoundInProgress);
        }
        if self.cards.get_card(card_number).is_none() {
            return Err(BingoError::InvalidCard(card_number.value()));
        }

        let bet = self.bet_amount();
        let held = self.registry.check_reservable(card_number, user_id)?;

        // Stakes for cards already held here have left the wallet; count them back
        // so the check is against the balance before any selection in this tier.
        let held = i64::try_from(held).unwrap_or(i64::MAX);
        let balance = self.ledger.get_balance(user_id).await?;
        let available = held.checked_mul(bet).and_then(|stakes| balance.checked_add(stakes));
        let required = held.checked_add(1).and_then(|cards| cards.checked_mul(bet));
        let (Some(available), Some(required)) = (available, required) else {
            return Err(BingoError::InsufficientFunds {
                required: i64::MAX,
                available: balance,
            });
        };
        if required > available {
            return Err(BingoError::InsufficientFunds {
                required,
                available,
            });
        }

        let session = Session::new(card_number, user_id, bet);
        let stake_key = session.stake_key();
        self.registry.insert(session)?;

        if let Err(err) = self.ledger.debit(user_id, bet, stake_key).await {
            self.registry.remove(card_number);
            log::warn!(
                "Tier {}: stake for card {} by user {} failed: {}",
                bet,
                card_number,
                user_id,
                err
            );
            return Err(err.into());
        }

        let session = match self.registry.get_mut(card_number) {
            Some(session) => {
                session.advance(SessionStatus::Ready)?;
                session.clone()
            }
            None => return Err(BingoError::SessionNotFound(card_number)),
        };

        if self.tier.status() == TierStatus::Ready {
            self.tier.start_countdown(now)?;
            log::info!(
                "Tier {} round {}: countdown started ({}s)",
                bet,
                self.tier.round(),
                self.config.countdown.as_secs()
            );
        }

        log::info!("Tier {}: user {} reserved card {}", bet, user_id, card_number);
        self.push_sessions_updated();
        self.push_timer_state(now);
        Ok(session)
    }

    // ----- Release -----

    /// Give a reserved card back and refund its stake.
    pub async fn release(
        &mut self,
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
        now: Instant,
    ) -> BingoResult<()> {
        match self.recorded(user_id, operation_id.as_deref()) {
            Some(RecordedOutcome::Release(outcome)) => return outcome.clone(),
            Some(_) => return Err(BingoError::DuplicateOperation(operation_id.unwrap_or_default())),
            None => {}
        }

        let outcome = self.release_card(card_number, user_id, now).await;
        self.record(user_id, operation_id, RecordedOutcome::Release(outcome.clone()));
        outcome
    }

    async fn release_card(
        &mut self,
        card_number: CardNumber,
        user_id: UserId,
        now: Instant,
    ) -> BingoResult<()> {
        if !self.tier.status().is_open() {
            return Err(BingoError::RoundInProgress);
        }

        let bet = self.bet_amount();
        let session = self
            .registry
            .get(card_number)
            .ok_or(BingoError::SessionNotFound(card_number))?;
        if session.user_id != user_id {
            return Err(BingoError::NotSessionOwner(card_number));
        }
        let refund_key = session.refund_key();

        if let Err(err) = self.ledger.refund(user_id, bet, refund_key).await {
            log::error!(
                "Tier {}: refund for card {} to user {} failed: {}",
                bet,
                card_number,
                user_id,
                err
            );
            return Err(err.into());
        }
        self.registry.remove(card_number);
        log::info!("Tier {}: user {} released card {}", bet, user_id, card_number);

        if self.registry.is_empty() && self.tier.status() == TierStatus::CountingDown {
            self.tier.transition(TierStatus::Ready)?;
            self.operations.clear();
            log::info!("Tier {}: countdown dropped, no reservations left", bet);
        }

        self.push_sessions_updated();
        self.push_timer_state(now);
        Ok(())
    }

    // ----- Claims -----

    /// Submit a win claim for a card.
    ///
    /// The card is evaluated against the current called number. A false claim
    /// blocks the card for the rest of the round.
    pub async fn claim(
        &mut self,
        card_number: CardNumber,
        user_id: UserId,
        operation_id: Option<String>,
        now: Instant,
    ) -> BingoResult<WinClaim> {
        match self.recorded(user_id, operation_id.as_deref()) {
            Some(RecordedOutcome::Claim(outcome)) => return outcome.clone(),
            Some(_) => return Err(BingoError::DuplicateOperation(operation_id.unwrap_or_default())),
            None => {}
        }

        let outcome = self.handle_bingo(card_number, user_id, now);
        self.record(user_id, operation_id, RecordedOutcome::Claim(outcome.clone()));
        outcome
    }

    fn handle_bingo(
        &mut self,
        card_number: CardNumber,
        user_id: UserId,
        now: Instant,
    ) -> BingoResult<WinClaim> {
        let status = self.tier.status();
        if !status.is_in_play() {
            return Err(BingoError::NoActiveRound);
        }

        let bet = self.bet_amount();
        let session = self
            .registry
            .get(card_number)
            .ok_or(BingoError::SessionNotFound(card_number))?;
        if session.user_id != user_id {
            return Err(BingoError::NotSessionOwner(card_number));
        }
        if session.status.has_claimed() {
            return Err(BingoError::AlreadySubmitted(card_number));
        }

        let card = self
            .cards
            .get_card(card_number)
            .ok_or(BingoError::InvalidCard(card_number.value()))?;
        let found = self
            .called
            .current()
            .and_then(|last| evaluate(&card, &self.called, last).map(|found| (last, found)));

        let Some((winning_number, found)) = found else {
            self.set_session_status(card_number, SessionStatus::Blocked)?;
            log::warn!(
                "Tier {}: false claim on card {} by user {}, card blocked",
                bet,
                card_number,
                user_id
            );
            self.push_sessions_updated();
            return Err(BingoError::InvalidClaim(card_number));
        };

        self.set_session_status(card_number, SessionStatus::Submitted)?;
        let claim = WinClaim::new(card_number, user_id, winning_number, found);
        let round = self.tier.round();

        match self.grace.as_mut() {
            Some(grace) => grace.add(claim.clone()),
            None => {
                self.tier.transition(TierStatus::Stopped)?;
                self.next_call_at = None;
                self.grace = Some(GracePeriod::open(
                    claim.clone(),
                    now,
                    self.config.grace_period,
                ));
                log::info!(
                    "Tier {} round {}: first winner card {} on {}, grace window open",
                    bet,
                    round,
                    card_number,
                    winning_number
                );
                self.events.push_back(TierEvent::GameStopped {
                    bet_amount: bet,
                    round,
                    grace_period_secs: ceil_secs(self.config.grace_period),
                });
            }
        }

        log::info!(
            "Tier {} round {}: card {} wins with a {} on {}",
            bet,
            round,
            card_number,
            claim.pattern,
            winning_number
        );
        self.events.push_back(TierEvent::WinnerAnnounced {
            bet_amount: bet,
            round,
            claim: claim.clone(),
        });
        self.push_sessions_updated();
        self.push_timer_state(now);
        Ok(claim)
    }

    fn set_session_status(&mut self, card_number: CardNumber, next: SessionStatus) -> BingoResult<()> {
        self.registry
            .get_mut(card_number)
            .ok_or(BingoError::SessionNotFound(card_number))?
            .advance(next)
    }

    // ----- Clock -----

    /// Advance timers: start or cancel the round when the countdown runs out,
    /// call the next number when due, settle when the grace window closes.
    pub async fn tick(&mut self, now: Instant) {
        self.retry_pending_payouts(now).await;

        match self.tier.status() {
            TierStatus::CountingDown => {
                if self
                    .tier
                    .countdown_remaining(now, self.config.countdown)
                    .is_zero()
                {
                    self.start_round(now).await;
                }
            }
            TierStatus::Active => {
                if self.next_call_at.is_some_and(|due| now >= due) {
                    self.call_next(now).await;
                }
            }
            TierStatus::Stopped => {
                if self.grace.as_ref().is_some_and(|grace| grace.has_elapsed(now)) {
                    self.settle().await;
                }
            }
            TierStatus::Ready | TierStatus::Ended => {}
        }

        self.publish_timer_if_changed(now);
    }

    async fn start_round(&mut self, now: Instant) {
        let bet = self.bet_amount();
        let reserved = self.registry.player_count();
        if reserved < self.config.min_players {
            self.cancel_round(reserved).await;
            return;
        }

        for session in self.registry.iter_mut() {
            if let Err(err) = session.advance(SessionStatus::Playing) {
                log::error!("Tier {}: card {} not moved to playing: {}", bet, session.card_number, err);
            }
        }
        if let Err(err) = self.tier.transition(TierStatus::Active) {
            log::error!("Tier {}: round not started: {}", bet, err);
            return;
        }

        self.caller.reset();
        self.called.clear();
        self.grace = None;
        self.next_call_at = Some(now + self.config.call_interval);

        log::info!(
            "Tier {} round {}: started with {} cards",
            bet,
            self.tier.round(),
            reserved
        );
        self.events.push_back(TierEvent::GameStarted {
            bet_amount: bet,
            round: self.tier.round(),
            player_count: reserved,
            prize_pool: self.prize_pool(),
        });
        self.push_sessions_updated();
    }

    /// Countdown ran out short of players: refund everyone and go back to ready.
    async fn cancel_round(&mut self, reserved: usize) {
        let bet = self.bet_amount();
        let round = self.tier.round();
        let mut refunds = Vec::new();
        let mut pending_refunds = Vec::new();

        for session in self.registry.drain() {
            let payout = PendingPayout::refund(&session, bet);
            if self.pay(payout.clone()).await {
                refunds.push(Refund {
                    user_id: session.user_id,
                    card_number: session.card_number,
                    amount: bet,
                });
            } else {
                pending_refunds.push(payout);
            }
        }

        if let Err(err) = self.tier.transition(TierStatus::Ready) {
            log::error!("Tier {}: reset after cancel failed: {}", bet, err);
        }
        self.operations.clear();

        let reason = BingoError::NotEnoughPlayers {
            required: self.config.min_players,
            reserved,
        };
        log::info!("Tier {} round {}: cancelled, {}", bet, round, reason);
        self.events.push_back(TierEvent::RoundCancelled {
            bet_amount: bet,
            round,
            reason: reason.to_string(),
            refunds,
            pending_refunds,
        });
        self.push_sessions_updated();
    }

    async fn call_next(&mut self, now: Instant) {
        let bet = self.bet_amount();
        let Some(number) = self.caller.draw() else {
            self.end_without_winner().await;
            return;
        };

        self.called.append(number);
        self.next_call_at = Some(now + self.config.call_interval);
        log::debug!(
            "Tier {} round {}: called {} ({} of 75)",
            bet,
            self.tier.round(),
            number,
            self.called.len()
        );
        self.events.push_back(TierEvent::NumberCalled {
            bet_amount: bet,
            number,
            called_numbers: self.called.as_slice().to_vec(),
        });
    }

    /// Every number called and nobody won: entries go back to the players.
    async fn end_without_winner(&mut self) {
        let bet = self.bet_amount();
        if let Err(err) = self.tier.transition(TierStatus::Ended) {
            log::error!("Tier {}: no-winner end refused: {}", bet, err);
            return;
        }

        let mut result = settlement::no_winner_result(bet, self.tier.round());

        // Cards blocked by a false claim forfeit their stake
        let refundable: Vec<Session> = self
            .registry
            .list()
            .into_iter()
            .filter(|s| s.status != SessionStatus::Blocked)
            .collect();
        for session in &refundable {
            let payout = PendingPayout::refund(session, bet);
            if !self.pay(payout.clone()).await {
                result.pending_payouts.push(payout);
            }
        }

        log::info!(
            "Tier {} round {}: all numbers called without a winner, {} entries refunded",
            bet,
            self.tier.round(),
            refundable.len()
        );
        self.finish_round(result);
    }

    /// Pay the winners collected during the grace window. Runs once per round:
    /// the `stopped → ended` transition only succeeds the first time.
    async fn settle(&mut self) {
        let bet = self.bet_amount();
        if let Err(err) = self.tier.transition(TierStatus::Ended) {
            log::warn!("Tier {}: settlement skipped: {}", bet, err);
            return;
        }

        let winners = self
            .grace
            .take()
            .map(GracePeriod::into_winners)
            .unwrap_or_default();
        let mut result = settlement::settle_round(
            bet,
            self.tier.round(),
            self.registry.eligible_count(),
            &winners,
        );

        let mut prizes = Vec::new();
        for winner in result.winners.iter().filter(|w| w.amount > 0) {
            match self.registry.get(winner.card_number) {
                Some(session) => prizes.push(PendingPayout::prize(session, winner.amount)),
                None => log::error!(
                    "Tier {}: no session for winning card {}, prize not paid",
                    bet,
                    winner.card_number
                ),
            }
        }
        for prize in prizes {
            if !self.pay(prize.clone()).await {
                result.pending_payouts.push(prize);
            }
        }

        log::info!(
            "Tier {} round {}: settled, pool {} split {} across {} winner(s)",
            bet,
            result.round,
            result.prize_pool,
            result.split,
            result.total_winners
        );
        self.finish_round(result);
    }

    // ----- Payouts -----

    /// Send a refund or prize. One the ledger refuses is queued and retried
    /// from `tick`; returns whether it was paid now.
    async fn pay(&mut self, payout: PendingPayout) -> bool {
        match self.submit_payout(&payout).await {
            Ok(()) => true,
            Err(err) => {
                log::error!(
                    "Tier {}: {} of {} to user {} for card {} failed, queued for retry: {}",
                    self.bet_amount(),
                    payout.kind,
                    payout.amount,
                    payout.user_id,
                    payout.card_number,
                    err
                );
                self.pending_payouts.push(payout);
                false
            }
        }
    }

    /// An already applied key means an earlier attempt got through.
    async fn submit_payout(&self, payout: &PendingPayout) -> WalletResult<()> {
        let key = payout.idempotency_key.clone();
        let applied = match payout.kind {
            PayoutKind::Refund => self.ledger.refund(payout.user_id, payout.amount, key).await,
            PayoutKind::Prize => self.ledger.credit(payout.user_id, payout.amount, key).await,
        };
        match applied {
            Ok(_) | Err(WalletError::DuplicateTransaction(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn retry_pending_payouts(&mut self, now: Instant) {
        if self.pending_payouts.is_empty() || self.next_payout_retry.is_some_and(|at| now < at) {
            return;
        }

        for payout in std::mem::take(&mut self.pending_payouts) {
            match self.submit_payout(&payout).await {
                Ok(()) => log::info!(
                    "Tier {}: deferred {} of {} to user {} paid",
                    self.bet_amount(),
                    payout.kind,
                    payout.amount,
                    payout.user_id
                ),
                Err(err) => {
                    log::warn!(
                        "Tier {}: {} of {} to user {} still failing: {}",
                        self.bet_amount(),
                        payout.kind,
                        payout.amount,
                        payout.user_id,
                        err
                    );
                    self.pending_payouts.push(payout);
                }
            }
        }

        self.next_payout_retry = (!self.pending_payouts.is_empty()).then(|| now + PAYOUT_RETRY_INTERVAL);
    }

    /// `ended → ready`: record the result and clear the round.
    fn finish_round(&mut self, result: GameEndResult) {
        self.registry.drain();
        self.called.clear();
        self.grace = None;
        self.next_call_at = None;
        self.operations.clear();

        self.last_result = Some(result.clone());
        self.history.push_back(result.clone());
        while self.history.len() > self.config.history_len {
            self.history.pop_front();
        }

        if let Err(err) = self.tier.transition(TierStatus::Ready) {
            log::error!("Tier {}: reset after round end failed: {}", self.bet_amount(), err);
        }

        self.events.push_back(TierEvent::GameEnded(result));
        self.push_sessions_updated();
    }

    // ----- Events -----

    fn push_sessions_updated(&mut self) {
        self.events.push_back(TierEvent::SessionsUpdated {
            bet_amount: self.bet_amount(),
            sessions: self.registry.list(),
            player_count: self.registry.player_count(),
            prize_pool: self.prize_pool(),
        });
    }

    fn push_timer_state(&mut self, now: Instant) {
        let state = self.timer_state(now);
        self.last_timer = Some(state.clone());
        self.events
            .push_back(TierEvent::TimerStatesUpdate { timers: vec![state] });
    }

    fn publish_timer_if_changed(&mut self, now: Instant) {
        let state = self.timer_state(now);
        if self.last_timer.as_ref() != Some(&state) {
            self.last_timer = Some(state.clone());
            self.events
                .push_back(TierEvent::TimerStatesUpdate { timers: vec![state] });
        }
    }
}
