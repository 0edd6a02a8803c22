//! Integration tests for the round lifecycle of a single bet tier.
//!
//! Drives `TierEngine` directly with explicit instants: reservation and
//! countdown, number calling, claims and the grace window, settlement,
//! cancellation, and the no-winner end.

use async_trait::async_trait;
use bingo_engine::{
    BingoError,
    game::{BingoCard, BingoNumber, CardNumber, InMemoryCardTable, WinPattern},
    session::{SessionStatus, UserId},
    tier::{PayoutKind, RoundOutcome, TierConfig, TierEngine, TierEvent, TierStatus},
    wallet::{InMemoryLedger, WalletEntry, WalletError, WalletLedger, WalletResult},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::time::Instant;

fn card(number: u8) -> CardNumber {
    CardNumber::new(number).unwrap()
}

fn n(value: u8) -> BingoNumber {
    BingoNumber::new(value).unwrap()
}

/// Card 7 wins its top row on B-12 after the script below; card 22 completes
/// column B on the same number; card 30 never wins on the script.
fn card_table() -> Arc<InMemoryCardTable> {
    let cards = vec![
        BingoCard::new(
            card(7),
            [
                [12, 16, 31, 46, 61],
                [5, 17, 32, 47, 62],
                [6, 18, 0, 48, 63],
                [7, 19, 34, 49, 64],
                [8, 20, 35, 50, 65],
            ],
        )
        .unwrap(),
        BingoCard::new(
            card(22),
            [
                [12, 21, 36, 51, 66],
                [1, 22, 37, 52, 67],
                [2, 23, 0, 53, 68],
                [3, 24, 39, 54, 69],
                [4, 25, 40, 55, 70],
            ],
        )
        .unwrap(),
        BingoCard::new(
            card(30),
            [
                [9, 26, 41, 56, 71],
                [10, 27, 42, 57, 72],
                [11, 28, 0, 58, 73],
                [13, 29, 44, 59, 74],
                [14, 30, 45, 60, 75],
            ],
        )
        .unwrap(),
    ];
    Arc::new(InMemoryCardTable::from_cards(cards).unwrap())
}

fn script() -> Vec<BingoNumber> {
    [1, 2, 3, 4, 16, 31, 46, 61, 12].into_iter().map(n).collect()
}

fn config() -> TierConfig {
    TierConfig {
        countdown: Duration::from_secs(30),
        call_interval: Duration::from_secs(4),
        grace_period: Duration::from_secs(5),
        rng_seed: Some(7),
        scripted_calls: script(),
        ..TierConfig::default()
    }
}

async fn ledger_with_players() -> Arc<InMemoryLedger> {
    let ledger = Arc::new(InMemoryLedger::new(None));
    for user in 1..=3 {
        ledger.set_balance(user, 100).await;
    }
    ledger
}

fn engine(bet: i64, config: TierConfig, ledger: &Arc<InMemoryLedger>) -> TierEngine {
    TierEngine::new(bet, config, ledger.clone(), card_table()).unwrap()
}

fn event_names(events: &[TierEvent]) -> Vec<&'static str> {
    events.iter().map(TierEvent::name).collect()
}

/// Reserve cards 7, 22 and 30 for users 1, 2 and 3, run the countdown out and
/// call the nine scripted numbers. Returns the instant of the last call.
async fn play_to_b12(engine: &mut TierEngine, t0: Instant) -> Instant {
    engine.reserve(card(7), 1, None, t0).await.unwrap();
    engine.reserve(card(22), 2, None, t0 + Duration::from_secs(1)).await.unwrap();
    engine.reserve(card(30), 3, None, t0 + Duration::from_secs(2)).await.unwrap();

    let start = t0 + Duration::from_secs(30);
    engine.tick(start).await;
    assert_eq!(engine.status(), TierStatus::Active);

    let mut now = start;
    for _ in 0..9 {
        now += Duration::from_secs(4);
        engine.tick(now).await;
    }
    assert_eq!(engine.called_numbers().last(), Some(&n(12)));
    now
}

// ============================================================================
// Full rounds
// ============================================================================

#[tokio::test]
async fn test_two_winners_share_the_pool() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    let last_call = play_to_b12(&mut engine, t0).await;
    engine.drain_events();

    // Card 7 completes its top row on B-12
    let first = engine.claim(card(7), 1, None, last_call).await.unwrap();
    assert_eq!(first.pattern, WinPattern::Row);
    assert_eq!(first.winning_number, n(12));
    assert_eq!(engine.status(), TierStatus::Stopped);

    // Card 22 completes column B inside the grace window
    let second = engine
        .claim(card(22), 2, None, last_call + Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(second.pattern, WinPattern::Column);

    let names = event_names(&engine.drain_events());
    assert!(names.contains(&"game-stopped"));
    assert_eq!(names.iter().filter(|&&e| e == "winner-announced").count(), 2);

    // No numbers are called during the window
    engine.tick(last_call + Duration::from_secs(4)).await;
    assert_eq!(engine.called_numbers().len(), 9);
    assert_eq!(engine.status(), TierStatus::Stopped);

    engine.tick(last_call + Duration::from_secs(5)).await;
    assert_eq!(engine.status(), TierStatus::Ready);

    let result = engine.last_result().unwrap().clone();
    assert_eq!(result.outcome, RoundOutcome::Won);
    assert_eq!(result.prize_pool, 24);
    assert_eq!(result.split, 12);
    assert_eq!(result.total_winners, 2);
    assert_eq!(result.bet_amount, 10);

    assert_eq!(ledger.get_balance(1).await.unwrap(), 102);
    assert_eq!(ledger.get_balance(2).await.unwrap(), 102);
    assert_eq!(ledger.get_balance(3).await.unwrap(), 90);

    // Round state is cleared for the next round
    assert!(engine.sessions().is_empty());
    assert!(engine.called_numbers().is_empty());
    assert_eq!(engine.history().len(), 1);
    assert!(event_names(&engine.drain_events()).contains(&"game-ended"));
}

#[tokio::test]
async fn test_settlement_runs_once() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let last_call = play_to_b12(&mut engine, Instant::now()).await;

    engine.claim(card(7), 1, None, last_call).await.unwrap();
    let end = last_call + Duration::from_secs(5);
    engine.tick(end).await;
    engine.tick(end + Duration::from_secs(1)).await;
    engine.tick(end + Duration::from_secs(2)).await;

    let ended = engine
        .drain_events()
        .into_iter()
        .filter(|e| e.name() == "game-ended")
        .count();
    assert_eq!(ended, 1);
    // Single winner takes the whole 24
    assert_eq!(ledger.get_balance(1).await.unwrap(), 114);
}

#[tokio::test]
async fn test_false_claim_blocks_card() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let last_call = play_to_b12(&mut engine, Instant::now()).await;

    let err = engine.claim(card(30), 3, None, last_call).await.unwrap_err();
    assert_eq!(err, BingoError::InvalidClaim(card(30)));
    assert_eq!(engine.status(), TierStatus::Active);

    let blocked = engine
        .sessions()
        .into_iter()
        .find(|s| s.card_number == card(30))
        .unwrap();
    assert_eq!(blocked.status, SessionStatus::Blocked);

    // Blocked for the rest of the round, without re-evaluation
    let again = engine.claim(card(30), 3, None, last_call).await.unwrap_err();
    assert_eq!(again, BingoError::AlreadySubmitted(card(30)));

    // Other cards are unaffected
    assert!(engine.claim(card(7), 1, None, last_call).await.is_ok());
}

#[tokio::test]
async fn test_second_claim_on_winning_card_rejected() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let last_call = play_to_b12(&mut engine, Instant::now()).await;

    engine.claim(card(7), 1, None, last_call).await.unwrap();
    let err = engine.claim(card(7), 1, None, last_call).await.unwrap_err();
    assert_eq!(err, BingoError::AlreadySubmitted(card(7)));

    engine.tick(last_call + Duration::from_secs(5)).await;
    assert_eq!(engine.last_result().unwrap().total_winners, 1);
}

#[tokio::test]
async fn test_claim_requires_owner_and_active_round() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    assert_eq!(
        engine.claim(card(7), 1, None, t0).await,
        Err(BingoError::NoActiveRound)
    );

    let mut engine2 = self::engine(10, config(), &ledger);
    let last_call = play_to_b12(&mut engine2, t0).await;
    assert_eq!(
        engine2.claim(card(7), 2, None, last_call).await,
        Err(BingoError::NotSessionOwner(card(7)))
    );
}

// ============================================================================
// Countdown
// ============================================================================

#[tokio::test]
async fn test_too_few_players_refunds_everyone() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(20, config(), &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    engine.reserve(card(22), 2, None, t0).await.unwrap();
    assert_eq!(ledger.get_balance(1).await.unwrap(), 80);

    engine.tick(t0 + Duration::from_secs(30)).await;

    assert_eq!(engine.status(), TierStatus::Ready);
    assert!(engine.sessions().is_empty());
    assert!(engine.called_numbers().is_empty());
    assert_eq!(ledger.get_balance(1).await.unwrap(), 100);
    assert_eq!(ledger.get_balance(2).await.unwrap(), 100);

    let cancelled = engine
        .drain_events()
        .into_iter()
        .find_map(|e| match e {
            TierEvent::RoundCancelled { refunds, .. } => Some(refunds),
            _ => None,
        })
        .unwrap();
    assert_eq!(cancelled.len(), 2);
    assert!(cancelled.iter().all(|r| r.amount == 20));
}

#[tokio::test]
async fn test_timer_anchored_at_first_reservation() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    assert_eq!(engine.timer_state(t0).status, TierStatus::Ready);

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    engine
        .reserve(card(22), 2, None, t0 + Duration::from_secs(10))
        .await
        .unwrap();

    let state = engine.timer_state(t0 + Duration::from_millis(10_500));
    assert_eq!(state.status, TierStatus::CountingDown);
    assert_eq!(state.timer, 20);
    assert_eq!(state.player_count, 2);
    assert_eq!(state.prize_pool, 16);

    engine.tick(t0 + Duration::from_secs(29)).await;
    assert_eq!(engine.status(), TierStatus::CountingDown);
}

#[tokio::test]
async fn test_snapshot_carries_round_creation_time() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    assert_eq!(engine.snapshot(t0).created_at, None);

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    let created_at = engine.snapshot(t0).created_at.unwrap();

    // A later reservation keeps the round's original creation time
    engine.reserve(card(22), 2, None, t0 + Duration::from_secs(5)).await.unwrap();
    assert_eq!(engine.snapshot(t0).created_at, Some(created_at));

    engine.release(card(7), 1, None, t0 + Duration::from_secs(6)).await.unwrap();
    engine.release(card(22), 2, None, t0 + Duration::from_secs(6)).await.unwrap();
    assert_eq!(engine.snapshot(t0).created_at, None);
}

#[tokio::test]
async fn test_releasing_every_card_resets_tier() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    assert_eq!(engine.status(), TierStatus::CountingDown);

    engine.release(card(7), 1, None, t0).await.unwrap();
    assert_eq!(engine.status(), TierStatus::Ready);
    assert_eq!(ledger.get_balance(1).await.unwrap(), 100);
}

// ============================================================================
// Reservation rules
// ============================================================================

#[tokio::test]
async fn test_reservation_rules() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    assert_eq!(
        engine.reserve(card(7), 2, None, t0).await,
        Err(BingoError::CardTaken(card(7)))
    );
    assert_eq!(
        engine.reserve(card(7), 1, None, t0).await,
        Err(BingoError::CardTaken(card(7)))
    );

    engine.reserve(card(22), 1, None, t0).await.unwrap();
    assert_eq!(
        engine.reserve(card(30), 1, None, t0).await,
        Err(BingoError::SelectionLimitExceeded { limit: 2 })
    );

    assert_eq!(
        engine.reserve(card(99), 2, None, t0).await,
        Err(BingoError::InvalidCard(99))
    );
}

#[tokio::test]
async fn test_insufficient_funds_counts_existing_selections() {
    let ledger = ledger_with_players().await;
    ledger.set_balance(4, 15).await;
    ledger.set_balance(5, 20).await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 4, None, t0).await.unwrap();
    assert_eq!(
        engine.reserve(card(22), 4, None, t0).await,
        Err(BingoError::InsufficientFunds {
            required: 20,
            available: 15
        })
    );

    engine.release(card(7), 4, None, t0).await.unwrap();
    engine.reserve(card(7), 5, None, t0).await.unwrap();
    engine.reserve(card(22), 5, None, t0).await.unwrap();
    assert_eq!(ledger.get_balance(5).await.unwrap(), 0);
}

#[tokio::test]
async fn test_stake_overflow_is_insufficient_funds() {
    let bet = i64::MAX / 2 + 1;
    let ledger = Arc::new(InMemoryLedger::new(None));
    ledger.set_balance(4, i64::MAX).await;
    let mut engine = engine(bet, config(), &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 4, None, t0).await.unwrap();
    // Two stakes no longer fit in an i64
    assert_eq!(
        engine.reserve(card(22), 4, None, t0).await,
        Err(BingoError::InsufficientFunds {
            required: i64::MAX,
            available: i64::MAX - bet
        })
    );
    assert_eq!(engine.sessions().len(), 1);
    assert_eq!(ledger.get_balance(4).await.unwrap(), i64::MAX - bet);
}

#[tokio::test]
async fn test_release_rules() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    assert_eq!(
        engine.release(card(7), 2, None, t0).await,
        Err(BingoError::NotSessionOwner(card(7)))
    );
    assert_eq!(
        engine.release(card(22), 1, None, t0).await,
        Err(BingoError::SessionNotFound(card(22)))
    );

    let mut active = self::engine(10, config(), &ledger);
    play_to_b12(&mut active, t0).await;
    assert_eq!(
        active.release(card(7), 1, None, t0).await,
        Err(BingoError::RoundInProgress)
    );
    assert_eq!(
        active.reserve(card(7), 1, None, t0).await,
        Err(BingoError::RoundInProgress)
    );
}

#[tokio::test]
async fn test_operation_id_replays_outcome() {
    let ledger = ledger_with_players().await;
    let mut engine = engine(10, config(), &ledger);
    let t0 = Instant::now();

    let first = engine
        .reserve(card(7), 1, Some("op-1".to_string()), t0)
        .await
        .unwrap();
    let replay = engine
        .reserve(card(7), 1, Some("op-1".to_string()), t0)
        .await
        .unwrap();
    assert_eq!(first, replay);
    assert_eq!(ledger.get_balance(1).await.unwrap(), 90);

    assert_eq!(
        engine
            .release(card(7), 1, Some("op-1".to_string()), t0)
            .await,
        Err(BingoError::DuplicateOperation("op-1".to_string()))
    );
}

// ============================================================================
// No winner
// ============================================================================

#[tokio::test]
async fn test_all_numbers_called_without_winner() {
    let ledger = ledger_with_players().await;
    let config = TierConfig {
        call_interval: Duration::from_secs(1),
        rng_seed: Some(11),
        ..TierConfig::default()
    };
    let mut engine = engine(10, config, &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    engine.reserve(card(22), 2, None, t0).await.unwrap();
    engine.reserve(card(30), 3, None, t0).await.unwrap();

    let start = t0 + Duration::from_secs(30);
    engine.tick(start).await;
    for k in 1..=75 {
        engine.tick(start + Duration::from_secs(k)).await;
    }
    assert_eq!(engine.called_numbers().len(), 75);
    assert_eq!(engine.status(), TierStatus::Active);

    engine.tick(start + Duration::from_secs(76)).await;
    assert_eq!(engine.status(), TierStatus::Ready);

    let result = engine.last_result().unwrap();
    assert_eq!(result.outcome, RoundOutcome::NoWinner);
    assert!(result.winners.is_empty());
    assert_eq!(result.prize_pool, 0);
    for user in 1..=3 {
        assert_eq!(ledger.get_balance(user).await.unwrap(), 100);
    }
}

#[tokio::test]
async fn test_blocked_card_forfeits_stake_when_no_one_wins() {
    let ledger = ledger_with_players().await;
    let config = TierConfig {
        call_interval: Duration::from_secs(1),
        rng_seed: Some(11),
        ..TierConfig::default()
    };
    let mut engine = engine(10, config, &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    engine.reserve(card(22), 2, None, t0).await.unwrap();
    engine.reserve(card(30), 3, None, t0).await.unwrap();

    let start = t0 + Duration::from_secs(30);
    engine.tick(start).await;
    engine.tick(start + Duration::from_secs(1)).await;

    // One number cannot complete a pattern
    let err = engine
        .claim(card(30), 3, None, start + Duration::from_secs(1))
        .await
        .unwrap_err();
    assert_eq!(err, BingoError::InvalidClaim(card(30)));
    let blocked = engine
        .sessions()
        .into_iter()
        .find(|s| s.card_number == card(30))
        .unwrap();
    assert_eq!(blocked.status, SessionStatus::Blocked);

    for k in 2..=76 {
        engine.tick(start + Duration::from_secs(k)).await;
    }
    assert_eq!(engine.status(), TierStatus::Ready);
    assert_eq!(engine.last_result().unwrap().outcome, RoundOutcome::NoWinner);

    assert_eq!(ledger.get_balance(1).await.unwrap(), 100);
    assert_eq!(ledger.get_balance(2).await.unwrap(), 100);
    assert_eq!(ledger.get_balance(3).await.unwrap(), 90);
}

// ============================================================================
// Deferred payouts
// ============================================================================

/// In-memory ledger whose refunds and prizes can be made to fail.
///
/// With `lose_replies` set the payout is applied but the caller still sees an
/// error, as when the connection drops after the commit.
struct UnreliableLedger {
    inner: InMemoryLedger,
    failing: AtomicBool,
    lose_replies: AtomicBool,
}

impl UnreliableLedger {
    async fn new() -> Arc<Self> {
        let inner = InMemoryLedger::new(None);
        for user in 1..=3 {
            inner.set_balance(user, 100).await;
        }
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(true),
            lose_replies: AtomicBool::new(false),
        })
    }

    fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    async fn payout(&self, applied: WalletResult<i64>) -> WalletResult<i64> {
        if self.lose_replies.swap(false, Ordering::SeqCst) {
            applied?;
            return Err(WalletError::Database(sqlx::Error::PoolTimedOut));
        }
        applied
    }

    fn check(&self) -> WalletResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WalletError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl WalletLedger for UnreliableLedger {
    async fn debit(&self, user_id: UserId, amount: i64, key: String) -> WalletResult<i64> {
        self.inner.debit(user_id, amount, key).await
    }

    async fn credit(&self, user_id: UserId, amount: i64, key: String) -> WalletResult<i64> {
        self.check()?;
        self.payout(self.inner.credit(user_id, amount, key).await).await
    }

    async fn refund(&self, user_id: UserId, amount: i64, key: String) -> WalletResult<i64> {
        self.check()?;
        self.payout(self.inner.refund(user_id, amount, key).await).await
    }

    async fn get_balance(&self, user_id: UserId) -> WalletResult<i64> {
        self.inner.get_balance(user_id).await
    }

    async fn recent_entries(&self, user_id: UserId, limit: usize) -> WalletResult<Vec<WalletEntry>> {
        self.inner.recent_entries(user_id, limit).await
    }
}

fn unreliable_engine(bet: i64, ledger: &Arc<UnreliableLedger>) -> TierEngine {
    TierEngine::new(bet, config(), ledger.clone(), card_table()).unwrap()
}

#[tokio::test]
async fn test_failed_refunds_retried_until_accepted() {
    let ledger = UnreliableLedger::new().await;
    let mut engine = unreliable_engine(20, &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    engine.reserve(card(22), 2, None, t0).await.unwrap();

    let cancelled_at = t0 + Duration::from_secs(30);
    engine.tick(cancelled_at).await;
    assert_eq!(engine.status(), TierStatus::Ready);

    let (refunds, pending) = engine
        .drain_events()
        .into_iter()
        .find_map(|e| match e {
            TierEvent::RoundCancelled {
                refunds,
                pending_refunds,
                ..
            } => Some((refunds, pending_refunds)),
            _ => None,
        })
        .unwrap();
    assert!(refunds.is_empty());
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|p| p.kind == PayoutKind::Refund && p.amount == 20));
    assert_eq!(engine.snapshot(cancelled_at).pending_payouts.len(), 2);

    // Still failing: both stay queued
    engine.tick(cancelled_at + Duration::from_secs(2)).await;
    assert_eq!(engine.pending_payouts().len(), 2);
    assert_eq!(ledger.get_balance(1).await.unwrap(), 80);

    ledger.recover();
    // Inside the retry interval nothing is sent
    engine.tick(cancelled_at + Duration::from_secs(3)).await;
    assert_eq!(engine.pending_payouts().len(), 2);

    engine.tick(cancelled_at + Duration::from_secs(4)).await;
    assert!(engine.pending_payouts().is_empty());
    assert_eq!(ledger.get_balance(1).await.unwrap(), 100);
    assert_eq!(ledger.get_balance(2).await.unwrap(), 100);
}

#[tokio::test]
async fn test_failed_prize_reported_and_paid_later() {
    let ledger = UnreliableLedger::new().await;
    let mut engine = unreliable_engine(10, &ledger);
    let last_call = play_to_b12(&mut engine, Instant::now()).await;

    engine.claim(card(7), 1, None, last_call).await.unwrap();
    let end = last_call + Duration::from_secs(5);
    engine.tick(end).await;
    assert_eq!(engine.status(), TierStatus::Ready);

    let result = engine.last_result().unwrap().clone();
    assert_eq!(result.pending_payouts.len(), 1);
    assert_eq!(result.pending_payouts[0].kind, PayoutKind::Prize);
    assert_eq!(result.pending_payouts[0].amount, 24);
    assert_eq!(ledger.get_balance(1).await.unwrap(), 90);

    ledger.recover();
    engine.tick(end + Duration::from_secs(2)).await;
    assert!(engine.pending_payouts().is_empty());
    assert_eq!(ledger.get_balance(1).await.unwrap(), 114);
}

#[tokio::test]
async fn test_payout_applied_before_error_not_paid_twice() {
    let ledger = UnreliableLedger::new().await;
    ledger.recover();
    ledger.lose_replies.store(true, Ordering::SeqCst);
    let mut engine = unreliable_engine(20, &ledger);
    let t0 = Instant::now();

    engine.reserve(card(7), 1, None, t0).await.unwrap();
    engine.tick(t0 + Duration::from_secs(30)).await;

    // The refund landed but its reply was lost
    assert_eq!(engine.pending_payouts().len(), 1);
    assert_eq!(ledger.get_balance(1).await.unwrap(), 100);

    // The retry hits the applied key and drops the payout
    engine.tick(t0 + Duration::from_secs(32)).await;
    assert!(engine.pending_payouts().is_empty());
    assert_eq!(ledger.get_balance(1).await.unwrap(), 100);
}
