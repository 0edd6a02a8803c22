//! Per-round history of called numbers.

use super::{constants::MAX_NUMBER, entities::BingoNumber};

/// Ordered, duplicate-free history of the numbers called in one round.
///
/// Append-only until [`CalledNumberLog::clear`] starts the next round.
#[derive(Clone, Debug)]
pub struct CalledNumberLog {
    order: Vec<BingoNumber>,
    marked: [bool; MAX_NUMBER as usize + 1],
}

impl Default for CalledNumberLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CalledNumberLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: Vec::with_capacity(MAX_NUMBER as usize),
            marked: [false; MAX_NUMBER as usize + 1],
        }
    }

    /// Append a number. Returns `false` and leaves the log untouched if it was
    /// already called this round.
    pub fn append(&mut self, number: BingoNumber) -> bool {
        let slot = &mut self.marked[usize::from(number.value())];
        if *slot {
            return false;
        }
        *slot = true;
        self.order.push(number);
        true
    }

    #[must_use]
    pub fn contains(&self, number: BingoNumber) -> bool {
        self.marked[usize::from(number.value())]
    }

    /// The most recently called number.
    #[must_use]
    pub fn current(&self) -> Option<BingoNumber> {
        self.order.last().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[BingoNumber] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.order.len() == MAX_NUMBER as usize
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.marked = [false; MAX_NUMBER as usize + 1];
    }
}

impl FromIterator<BingoNumber> for CalledNumberLog {
    fn from_iter<T: IntoIterator<Item = BingoNumber>>(iter: T) -> Self {
        let mut log = Self::new();
        for number in iter {
            log.append(number);
        }
        log
    }
}
