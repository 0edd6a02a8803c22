//! Per-tier card reservation registry.

use std::collections::BTreeMap;

use super::models::{Session, UserId};
use crate::{
    errors::{BingoError, BingoResult},
    game::CardNumber,
};

/// Sessions of one bet tier, keyed by card number.
///
/// The map key makes card ownership exclusive; the owning tier actor makes
/// check-then-insert atomic.
#[derive(Clone, Debug)]
pub struct SessionRegistry {
    sessions: BTreeMap<CardNumber, Session>,
    max_per_user: usize,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(max_per_user: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            max_per_user,
        }
    }

    /// Check that `user_id` may take `card_number`. Returns how many cards the
    /// user already holds in this tier.
    pub fn check_reservable(&self, card_number: CardNumber, user_id: UserId) -> BingoResult<usize> {
        if self.sessions.contains_key(&card_number) {
            return Err(BingoError::CardTaken(card_number));
        }

        let held = self.count_for_user(user_id);
        if held >= self.max_per_user {
            return Err(BingoError::SelectionLimitExceeded {
                limit: self.max_per_user,
            });
        }

        Ok(held)
    }

    /// Insert a session that passed [`SessionRegistry::check_reservable`].
    pub fn insert(&mut self, session: Session) -> BingoResult<()> {
        self.check_reservable(session.card_number, session.user_id)?;
        self.sessions.insert(session.card_number, session);
        Ok(())
    }

    pub fn get(&self, card_number: CardNumber) -> Option<&Session> {
        self.sessions.get(&card_number)
    }

    pub fn get_mut(&mut self, card_number: CardNumber) -> Option<&mut Session> {
        self.sessions.get_mut(&card_number)
    }

    pub fn remove(&mut self, card_number: CardNumber) -> Option<Session> {
        self.sessions.remove(&card_number)
    }

    /// Sessions ordered by card number.
    pub fn list(&self) -> Vec<Session> {
        self.sessions.values().cloned().collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    pub fn count_for_user(&self, user_id: UserId) -> usize {
        self.sessions.values().filter(|s| s.user_id == user_id).count()
    }

    /// Reserved cards with their stake paid.
    pub fn player_count(&self) -> usize {
        self.sessions.values().filter(|s| s.status.is_paid()).count()
    }

    /// Cards that took part in the running round.
    pub fn eligible_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.status.reached_playing())
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove and return every session, ordered by card number.
    pub fn drain(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.sessions).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    fn card(n: u8) -> CardNumber {
        CardNumber::new(n).unwrap()
    }

    #[test]
    fn test_card_is_exclusive() {
        let mut registry = SessionRegistry::new(2);
        registry.insert(Session::new(card(7), 1, 10)).unwrap();
        assert_eq!(
            registry.insert(Session::new(card(7), 2, 10)),
            Err(BingoError::CardTaken(card(7)))
        );
        // Same user, same card
        assert_eq!(
            registry.check_reservable(card(7), 1),
            Err(BingoError::CardTaken(card(7)))
        );
    }

    #[test]
    fn test_selection_limit() {
        let mut registry = SessionRegistry::new(2);
        registry.insert(Session::new(card(1), 1, 10)).unwrap();
        assert_eq!(registry.check_reservable(card(2), 1), Ok(1));
        registry.insert(Session::new(card(2), 1, 10)).unwrap();
        assert_eq!(
            registry.check_reservable(card(3), 1),
            Err(BingoError::SelectionLimitExceeded { limit: 2 })
        );
        assert_eq!(registry.check_reservable(card(3), 2), Ok(0));
    }

    #[test]
    fn test_player_count_skips_selected() {
        let mut registry = SessionRegistry::new(2);
        registry.insert(Session::new(card(1), 1, 10)).unwrap();
        registry.insert(Session::new(card(2), 2, 10)).unwrap();
        assert_eq!(registry.player_count(), 0);

        registry
            .get_mut(card(1))
            .unwrap()
            .advance(SessionStatus::Ready)
            .unwrap();
        assert_eq!(registry.player_count(), 1);
        assert_eq!(registry.eligible_count(), 0);
    }

    #[test]
    fn test_list_is_ordered_and_drain_empties() {
        let mut registry = SessionRegistry::new(2);
        for n in [9, 3, 5] {
            registry.insert(Session::new(card(n), i64::from(n), 10)).unwrap();
        }
        let cards: Vec<u8> = registry.list().iter().map(|s| s.card_number.value()).collect();
        assert_eq!(cards, vec![3, 5, 9]);

        assert_eq!(registry.drain().len(), 3);
        assert!(registry.is_empty());
    }
}
