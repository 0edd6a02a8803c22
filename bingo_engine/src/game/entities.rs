use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

use super::constants::{FREE_CELL, GRID_SIZE, MAX_CARD_NUMBER, MAX_NUMBER, NUMBERS_PER_LETTER};

/// Errors raised while building numbers and cards from raw input.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum CardError {
    #[error("card number {0} is outside 1..=100")]
    InvalidCardNumber(u8),
    #[error("number {0} is outside 1..=75")]
    InvalidNumber(u8),
    #[error("can't parse bingo number from {0:?}")]
    UnparsableNumber(String),
    #[error("centre cell must be the free cell (0)")]
    FreeCellMissing,
    #[error("cell ({row}, {col}) holds {value}, which doesn't belong in column {letter}")]
    MisplacedNumber {
        row: usize,
        col: usize,
        value: u8,
        letter: Letter,
    },
    #[error("number {0} appears more than once")]
    DuplicateNumber(u8),
}

/// Column letters of a 75-ball card.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Letter {
    B,
    I,
    N,
    G,
    O,
}

impl Letter {
    pub const ALL: [Letter; GRID_SIZE] = [Letter::B, Letter::I, Letter::N, Letter::G, Letter::O];

    /// Letter owning a number in `1..=75`.
    #[must_use]
    pub fn for_value(value: u8) -> Self {
        let idx = usize::from(value.saturating_sub(1) / NUMBERS_PER_LETTER);
        Self::ALL[idx.min(GRID_SIZE - 1)]
    }

    /// Card column this letter is printed over.
    #[must_use]
    pub const fn column(self) -> usize {
        self as usize
    }

    /// Inclusive range of numbers drawn under this letter.
    #[must_use]
    pub const fn range(self) -> (u8, u8) {
        let low = self as u8 * NUMBERS_PER_LETTER + 1;
        (low, low + NUMBERS_PER_LETTER - 1)
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'B' => Some(Self::B),
            'I' => Some(Self::I),
            'N' => Some(Self::N),
            'G' => Some(Self::G),
            'O' => Some(Self::O),
            _ => None,
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::B => "B",
            Self::I => "I",
            Self::N => "N",
            Self::G => "G",
            Self::O => "O",
        };
        write!(f, "{repr}")
    }
}

/// One ball of the 75-ball universe, rendered as `"<Letter>-<Number>"` on the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BingoNumber(u8);

impl BingoNumber {
    pub fn new(value: u8) -> Result<Self, CardError> {
        if (1..=MAX_NUMBER).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CardError::InvalidNumber(value))
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn letter(self) -> Letter {
        Letter::for_value(self.0)
    }

    /// Every ball in draw-universe order.
    pub fn all() -> impl Iterator<Item = BingoNumber> {
        (1..=MAX_NUMBER).map(Self)
    }
}

impl fmt::Display for BingoNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.letter(), self.0)
    }
}

impl FromStr for BingoNumber {
    type Err = CardError;

    /// Accepts `B-12` and `B12`. The letter must agree with the number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparsable = || CardError::UnparsableNumber(s.to_string());
        let mut chars = s.trim().chars();
        let letter = chars.next().and_then(Letter::from_char).ok_or_else(unparsable)?;
        let rest = chars.as_str();
        let digits = rest.strip_prefix('-').unwrap_or(rest);
        let value: u8 = digits.parse().map_err(|_| unparsable())?;
        let number = Self::new(value)?;
        if number.letter() != letter {
            return Err(unparsable());
        }
        Ok(number)
    }
}

impl Serialize for BingoNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BingoNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = String::deserialize(deserializer)?;
        repr.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifier of a card in the external card table.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CardNumber(u8);

impl CardNumber {
    pub fn new(value: u8) -> Result<Self, CardError> {
        if (1..=MAX_CARD_NUMBER).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CardError::InvalidCardNumber(value))
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CardNumber {
    type Error = CardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CardNumber> for u8 {
    fn from(value: CardNumber) -> Self {
        value.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Zero-based coordinates of a cell on a card.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
}

impl CellPosition {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    #[must_use]
    pub const fn is_free(self) -> bool {
        self.row == FREE_CELL.0 && self.col == FREE_CELL.1
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CardCell {
    Free,
    Number(BingoNumber),
}

/// A 5x5 card with a free centre. Columns hold numbers from their letter's range.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "RawCard", into = "RawCard")]
pub struct BingoCard {
    card_number: CardNumber,
    grid: [[CardCell; GRID_SIZE]; GRID_SIZE],
}

/// Card table row format: `0` marks the free cell.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RawCard {
    pub card_number: u8,
    pub grid: [[u8; GRID_SIZE]; GRID_SIZE],
}

impl BingoCard {
    /// Build a card from row-major values, validating layout.
    pub fn new(card_number: CardNumber, values: [[u8; GRID_SIZE]; GRID_SIZE]) -> Result<Self, CardError> {
        let mut grid = [[CardCell::Free; GRID_SIZE]; GRID_SIZE];
        let mut seen = [false; MAX_NUMBER as usize + 1];

        for (row, line) in values.iter().enumerate() {
            for (col, &value) in line.iter().enumerate() {
                let pos = CellPosition::new(row, col);
                if pos.is_free() {
                    if value != 0 {
                        return Err(CardError::FreeCellMissing);
                    }
                    continue;
                }

                let number = BingoNumber::new(value)?;
                let letter = Letter::ALL[col];
                if number.letter() != letter {
                    return Err(CardError::MisplacedNumber {
                        row,
                        col,
                        value,
                        letter,
                    });
                }
                if std::mem::replace(&mut seen[usize::from(value)], true) {
                    return Err(CardError::DuplicateNumber(value));
                }
                grid[row][col] = CardCell::Number(number);
            }
        }

        Ok(Self { card_number, grid })
    }

    #[must_use]
    pub const fn card_number(&self) -> CardNumber {
        self.card_number
    }

    #[must_use]
    pub const fn cell(&self, pos: CellPosition) -> CardCell {
        self.grid[pos.row][pos.col]
    }

    /// Where `number` is printed on this card, if anywhere.
    #[must_use]
    pub fn position_of(&self, number: BingoNumber) -> Option<CellPosition> {
        let col = number.letter().column();
        (0..GRID_SIZE)
            .map(|row| CellPosition::new(row, col))
            .find(|&pos| self.cell(pos) == CardCell::Number(number))
    }

    /// Numbers on the card in row-major order.
    pub fn numbers(&self) -> impl Iterator<Item = BingoNumber> + '_ {
        self.grid.iter().flatten().filter_map(|cell| match cell {
            CardCell::Number(n) => Some(*n),
            CardCell::Free => None,
        })
    }
}

impl TryFrom<RawCard> for BingoCard {
    type Error = CardError;

    fn try_from(raw: RawCard) -> Result<Self, Self::Error> {
        Self::new(CardNumber::new(raw.card_number)?, raw.grid)
    }
}

impl From<BingoCard> for RawCard {
    fn from(card: BingoCard) -> Self {
        let mut grid = [[0u8; GRID_SIZE]; GRID_SIZE];
        for (row, line) in card.grid.iter().enumerate() {
            for (col, cell) in line.iter().enumerate() {
                if let CardCell::Number(n) = cell {
                    grid[row][col] = n.value();
                }
            }
        }
        Self {
            card_number: card.card_number.value(),
            grid,
        }
    }
}
