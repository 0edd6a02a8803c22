//! Read-only card table keyed by card number.

use std::{collections::HashMap, path::Path, sync::Arc};
use thiserror::Error;

use super::entities::{BingoCard, CardError, CardNumber};

/// Card table loading errors
#[derive(Debug, Error)]
pub enum CardTableError {
    #[error("failed to read card table: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed card table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid card: {0}")]
    InvalidCard(#[from] CardError),

    #[error("card {0} appears more than once")]
    DuplicateCard(CardNumber),
}

/// Source of the fixed card layouts.
///
/// Cards are generated elsewhere; the engine only looks them up.
pub trait CardTable: Send + Sync {
    fn get_card(&self, card_number: CardNumber) -> Option<Arc<BingoCard>>;

    fn card_count(&self) -> usize;
}

/// Card table held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCardTable {
    cards: HashMap<CardNumber, Arc<BingoCard>>,
}

impl InMemoryCardTable {
    pub fn from_cards(cards: impl IntoIterator<Item = BingoCard>) -> Result<Self, CardTableError> {
        let mut table = HashMap::new();
        for card in cards {
            let number = card.card_number();
            if table.insert(number, Arc::new(card)).is_some() {
                return Err(CardTableError::DuplicateCard(number));
            }
        }
        Ok(Self { cards: table })
    }

    /// Parse a JSON array of `{"card_number": n, "grid": [[..]]}` rows.
    pub fn from_json(json: &str) -> Result<Self, CardTableError> {
        let cards: Vec<BingoCard> = serde_json::from_str(json)?;
        Self::from_cards(cards)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CardTableError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Card numbers in ascending order.
    pub fn card_numbers(&self) -> Vec<CardNumber> {
        let mut numbers: Vec<_> = self.cards.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }
}

impl CardTable for InMemoryCardTable {
    fn get_card(&self, card_number: CardNumber) -> Option<Arc<BingoCard>> {
        self.cards.get(&card_number).cloned()
    }

    fn card_count(&self) -> usize {
        self.cards.len()
    }
}
