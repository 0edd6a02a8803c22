//! Single-flight tracking for in-progress card operations.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use super::models::{BetAmount, UserId};
use crate::game::CardNumber;

type PendingKey = (BetAmount, CardNumber, UserId);

/// Card operations in flight, per user.
///
/// A user's second request for the same card is refused until the guard of
/// the first one drops. Other users contend for the card inside the tier.
#[derive(Clone, Debug, Default)]
pub struct PendingOperations {
    inner: Arc<Mutex<HashSet<PendingKey>>>,
}

impl PendingOperations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a card busy for `user_id`. `None` if that user already has an
    /// operation on it running.
    #[must_use]
    pub fn try_acquire(
        &self,
        bet_amount: BetAmount,
        card_number: CardNumber,
        user_id: UserId,
    ) -> Option<PendingGuard> {
        let key = (bet_amount, card_number, user_id);
        if !self.lock().insert(key) {
            return None;
        }
        Some(PendingGuard {
            owner: self.clone(),
            key,
        })
    }

    #[must_use]
    pub fn is_pending(&self, bet_amount: BetAmount, card_number: CardNumber, user_id: UserId) -> bool {
        self.lock().contains(&(bet_amount, card_number, user_id))
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PendingKey>> {
        // The set stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the card when dropped.
#[derive(Debug)]
pub struct PendingGuard {
    owner: PendingOperations,
    key: PendingKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}
