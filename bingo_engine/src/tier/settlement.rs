//! Prize pool and payout computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    game::{CardNumber, WinClaim, WinPattern, constants::PAYOUT_PERCENT},
    session::{BetAmount, Session, UserId},
};

/// How a round ended.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundOutcome {
    Won,
    /// All 75 numbers called without an accepted claim; entries refunded.
    NoWinner,
}

/// Prize paid to one winning card.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerPayout {
    pub user_id: UserId,
    pub card_number: CardNumber,
    pub pattern: WinPattern,
    pub amount: i64,
}

/// Ledger payment the engine owes a player.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayoutKind {
    Refund,
    Prize,
}

/// Refund or prize the ledger has not accepted yet.
///
/// Kept by the tier and retried with the same idempotency key until the ledger
/// applies it or reports it as already applied.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPayout {
    pub user_id: UserId,
    pub card_number: CardNumber,
    pub amount: i64,
    pub kind: PayoutKind,
    #[serde(skip)]
    pub idempotency_key: String,
}

impl PendingPayout {
    /// Stake returned for `session`, keyed by its refund key.
    #[must_use]
    pub fn refund(session: &Session, amount: i64) -> Self {
        Self {
            user_id: session.user_id,
            card_number: session.card_number,
            amount,
            kind: PayoutKind::Refund,
            idempotency_key: session.refund_key(),
        }
    }

    /// Prize share for the winning `session`, keyed by its prize key.
    #[must_use]
    pub fn prize(session: &Session, amount: i64) -> Self {
        Self {
            user_id: session.user_id,
            card_number: session.card_number,
            amount,
            kind: PayoutKind::Prize,
            idempotency_key: session.prize_key(),
        }
    }
}

impl std::fmt::Display for PayoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutKind::Refund => write!(f, "refund"),
            PayoutKind::Prize => write!(f, "prize"),
        }
    }
}

/// Immutable record of one finished round.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndResult {
    pub bet_amount: BetAmount,
    pub round: u64,
    pub outcome: RoundOutcome,
    pub winners: Vec<WinnerPayout>,
    pub prize_pool: i64,
    pub split: i64,
    pub total_winners: usize,
    /// Payouts still being retried when the round closed
    pub pending_payouts: Vec<PendingPayout>,
    pub ended_at: DateTime<Utc>,
}

/// `eligible × bet × 80%`, floored to a whole unit.
#[must_use]
pub fn prize_pool(eligible_players: usize, bet_amount: BetAmount) -> i64 {
    let eligible = i64::try_from(eligible_players).unwrap_or(i64::MAX);
    eligible.saturating_mul(bet_amount).saturating_mul(PAYOUT_PERCENT) / 100
}

/// Split `pool` across `winners` in acceptance order.
///
/// Every winner gets `pool / n`; the remainder is handed out one unit at a
/// time starting with the earliest winner, so the amounts sum to `pool`.
#[must_use]
pub fn split_pool(pool: i64, winners: &[WinClaim]) -> (i64, Vec<WinnerPayout>) {
    if winners.is_empty() {
        return (pool, Vec::new());
    }

    let n = winners.len() as i64;
    let split = pool / n;
    let remainder = pool % n;

    let payouts = winners
        .iter()
        .enumerate()
        .map(|(i, claim)| WinnerPayout {
            user_id: claim.user_id,
            card_number: claim.card_number,
            pattern: claim.pattern,
            amount: split + i64::from((i as i64) < remainder),
        })
        .collect();

    (split, payouts)
}

/// Result for a round with at least one winner.
#[must_use]
pub fn settle_round(
    bet_amount: BetAmount,
    round: u64,
    eligible_players: usize,
    winners: &[WinClaim],
) -> GameEndResult {
    let pool = prize_pool(eligible_players, bet_amount);
    let (split, payouts) = split_pool(pool, winners);

    GameEndResult {
        bet_amount,
        round,
        outcome: RoundOutcome::Won,
        total_winners: payouts.len(),
        winners: payouts,
        prize_pool: pool,
        split,
        pending_payouts: Vec::new(),
        ended_at: Utc::now(),
    }
}

/// Result for a round that ran out of numbers.
#[must_use]
pub fn no_winner_result(bet_amount: BetAmount, round: u64) -> GameEndResult {
    GameEndResult {
        bet_amount,
        round,
        outcome: RoundOutcome::NoWinner,
        winners: Vec::new(),
        prize_pool: 0,
        split: 0,
        total_winners: 0,
        pending_payouts: Vec::new(),
        ended_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{BingoNumber, PatternMatch};

    fn claims(cards: &[u8]) -> Vec<WinClaim> {
        cards
            .iter()
            .map(|&c| {
                WinClaim::new(
                    CardNumber::new(c).unwrap(),
                    i64::from(c) * 100,
                    BingoNumber::new(12).unwrap(),
                    PatternMatch {
                        pattern: WinPattern::Row,
                        winning_cells: Vec::new(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_prize_pool_keeps_house_share() {
        assert_eq!(prize_pool(3, 10), 24);
        assert_eq!(prize_pool(0, 10), 0);
        // 7 × 3 × 0.8 = 16.8, floored
        assert_eq!(prize_pool(7, 3), 16);
    }

    #[test]
    fn test_two_winners_split_evenly() {
        let result = settle_round(10, 1, 3, &claims(&[7, 22]));
        assert_eq!(result.prize_pool, 24);
        assert_eq!(result.split, 12);
        assert_eq!(result.total_winners, 2);
        assert!(result.winners.iter().all(|w| w.amount == 12));
    }

    #[test]
    fn test_remainder_goes_to_earliest_winners() {
        let (split, payouts) = split_pool(10, &claims(&[1, 2, 3]));
        assert_eq!(split, 3);
        let amounts: Vec<i64> = payouts.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![4, 3, 3]);
    }

    #[test]
    fn test_no_winner_result() {
        let result = no_winner_result(20, 4);
        assert_eq!(result.outcome, RoundOutcome::NoWinner);
        assert!(result.winners.is_empty());
        assert_eq!(result.prize_pool, 0);
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(settle_round(10, 1, 3, &claims(&[7]))).unwrap();
        assert_eq!(json["prizePool"], 24);
        assert_eq!(json["totalWinners"], 1);
        assert_eq!(json["outcome"], "won");
        assert_eq!(json["winners"][0]["cardNumber"], 7);
        assert_eq!(json["pendingPayouts"], serde_json::json!([]));
    }

    #[test]
    fn test_pending_payout_hides_key() {
        let payout = PendingPayout {
            user_id: 3,
            card_number: CardNumber::new(9).unwrap(),
            amount: 20,
            kind: PayoutKind::Refund,
            idempotency_key: "refund:abc".to_string(),
        };
        let json = serde_json::to_value(&payout).unwrap();
        assert_eq!(json["kind"], "refund");
        assert_eq!(json["cardNumber"], 9);
        assert!(json.get("idempotencyKey").is_none());
    }
}
