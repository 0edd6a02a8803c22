//! Integration tests for tier actors behind the manager.
//!
//! Time is paused so the actor's interval ticks advance the virtual clock
//! instead of waiting on the wall clock.

use bingo_engine::{
    BingoError,
    game::{BingoCard, BingoNumber, CardNumber, InMemoryCardTable},
    tier::{RoundOutcome, TierConfig, TierEvent, TierManager, TierStatus},
    wallet::{InMemoryLedger, WalletLedger},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

fn card(n: u8) -> CardNumber {
    CardNumber::new(n).unwrap()
}

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
                [1, 21, 36, 51, 66],
                [2, 22, 37, 52, 67],
                [3, 23, 0, 53, 68],
                [4, 24, 39, 54, 69],
                [9, 25, 40, 55, 70],
            ],
        )
        .unwrap(),
        BingoCard::new(
            card(30),
            [
                [10, 26, 41, 56, 71],
                [11, 27, 42, 57, 72],
                [13, 28, 0, 58, 73],
                [14, 29, 44, 59, 74],
                [15, 30, 45, 60, 75],
            ],
        )
        .unwrap(),
    ];
    Arc::new(InMemoryCardTable::from_cards(cards).unwrap())
}

async fn manager() -> (TierManager, Arc<InMemoryLedger>) {
    let ledger = Arc::new(InMemoryLedger::new(None));
    for user in 1..=3 {
        ledger.set_balance(user, 100).await;
    }
    let config = TierConfig {
        scripted_calls: [16, 31, 46, 61, 12]
            .into_iter()
            .map(|v| BingoNumber::new(v).unwrap())
            .collect(),
        ..TierConfig::default()
    };
    let manager = TierManager::new(config, ledger.clone(), card_table()).with_allowed_bets([10, 20, 50]);
    (manager, ledger)
}

/// Receive until an event with `name` arrives.
async fn next_named(rx: &mut mpsc::Receiver<TierEvent>, name: &str) -> TierEvent {
    loop {
        let event = rx.recv().await.expect("subscription closed");
        if event.name() == name {
            return event;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_round_over_subscription() {
    let (manager, ledger) = manager().await;
    let (tx, mut rx) = mpsc::channel(256);

    let snapshot = manager.subscribe(10, Uuid::new_v4(), tx).await.unwrap();
    assert_eq!(snapshot.status, TierStatus::Ready);
    assert!(snapshot.sessions.is_empty());

    manager.reserve(10, card(7), 1, None).await.unwrap();
    manager.reserve(10, card(22), 2, None).await.unwrap();
    manager.reserve(10, card(30), 3, None).await.unwrap();

    let started = next_named(&mut rx, "game-started").await;
    let TierEvent::GameStarted { player_count, prize_pool, .. } = started else {
        panic!("expected game-started");
    };
    assert_eq!(player_count, 3);
    assert_eq!(prize_pool, 24);

    // Wait for the number that completes card 7's top row
    loop {
        let TierEvent::NumberCalled { number, .. } = next_named(&mut rx, "number-called").await else {
            unreachable!();
        };
        if number.value() == 12 {
            break;
        }
    }

    let claim = manager.claim(10, card(7), 1, None).await.unwrap();
    assert_eq!(claim.winning_number.value(), 12);
    next_named(&mut rx, "game-stopped").await;

    let TierEvent::GameEnded(result) = next_named(&mut rx, "game-ended").await else {
        unreachable!();
    };
    assert_eq!(result.outcome, RoundOutcome::Won);
    assert_eq!(result.prize_pool, 24);
    assert_eq!(result.winners[0].amount, 24);

    assert_eq!(ledger.get_balance(1).await.unwrap(), 114);
    assert_eq!(manager.history(10).await.unwrap().len(), 1);

    let state = manager.round_state(10).await.unwrap();
    assert_eq!(state.status, TierStatus::Ready);
    assert!(state.last_result.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_snapshot_reflects_current_round() {
    let (manager, _ledger) = manager().await;

    manager.reserve(20, card(7), 1, None).await.unwrap();

    let (tx, _rx) = mpsc::channel(16);
    let snapshot = manager.subscribe(20, Uuid::new_v4(), tx).await.unwrap();
    assert_eq!(snapshot.status, TierStatus::CountingDown);
    assert_eq!(snapshot.sessions.len(), 1);
    assert_eq!(snapshot.player_count, 1);
    assert!(snapshot.timer <= 30);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_cancel_refunds_through_actor() {
    let (manager, ledger) = manager().await;
    let mut feed = manager.subscribe_feed();

    manager.reserve(20, card(7), 1, None).await.unwrap();
    manager.reserve(20, card(22), 2, None).await.unwrap();
    assert_eq!(ledger.get_balance(1).await.unwrap(), 80);

    loop {
        let event = feed.recv().await.unwrap();
        if let TierEvent::RoundCancelled { refunds, .. } = event {
            assert_eq!(refunds.len(), 2);
            break;
        }
    }

    assert_eq!(ledger.get_balance(1).await.unwrap(), 100);
    assert_eq!(ledger.get_balance(2).await.unwrap(), 100);
    assert!(manager.sessions(20).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tiers_are_independent() {
    let (manager, _ledger) = manager().await;

    manager.reserve(10, card(7), 1, None).await.unwrap();
    manager.reserve(20, card(7), 2, None).await.unwrap();

    assert_eq!(manager.tier_count().await, 2);
    assert_eq!(manager.sessions(10).await.unwrap()[0].user_id, 1);
    assert_eq!(manager.sessions(20).await.unwrap()[0].user_id, 2);

    let timers = manager.timer_states().await;
    let bets: Vec<i64> = timers.iter().map(|t| t.bet_amount).collect();
    assert_eq!(bets, vec![10, 20]);
    assert!(timers.iter().all(|t| t.status == TierStatus::CountingDown));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_bet_rejected() {
    let (manager, _ledger) = manager().await;

    assert_eq!(
        manager.reserve(15, card(7), 1, None).await,
        Err(BingoError::InvalidBetAmount(15))
    );
    assert_eq!(
        manager.reserve(-10, card(7), 1, None).await,
        Err(BingoError::InvalidBetAmount(-10))
    );
    assert_eq!(manager.tier_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_allowed_and_shutdown() {
    let (manager, _ledger) = manager().await;

    assert_eq!(manager.spawn_allowed().await.unwrap(), 3);
    assert_eq!(manager.timer_states().await.len(), 3);

    manager.shutdown().await;
    assert_eq!(manager.tier_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_reservations_on_one_card() {
    let (manager, ledger) = manager().await;
    let manager = Arc::new(manager);

    let mut handles = Vec::new();
    for user in 1..=3 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager.reserve(10, card(7), user, None).await
        }));
    }

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => won += 1,
            Err(err) => assert_eq!(err, BingoError::CardTaken(card(7))),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(ledger.total_balance().await, 290);
    assert_eq!(manager.sessions(10).await.unwrap().len(), 1);
}
