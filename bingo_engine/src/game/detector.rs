//! Last-number-triggered win detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    called::CalledNumberLog,
    constants::GRID_SIZE,
    entities::{BingoCard, BingoNumber, CardCell, CardNumber, CellPosition},
};
use crate::session::UserId;

/// Winning line shapes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WinPattern {
    Row,
    Column,
    Diagonal,
    Corners,
}

impl std::fmt::Display for WinPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WinPattern::Row => write!(f, "row"),
            WinPattern::Column => write!(f, "column"),
            WinPattern::Diagonal => write!(f, "diagonal"),
            WinPattern::Corners => write!(f, "corners"),
        }
    }
}

/// A completed pattern and the cells that make it up.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub pattern: WinPattern,
    pub winning_cells: Vec<CellPosition>,
}

/// An accepted claim, recorded once per card per round.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinClaim {
    pub card_number: CardNumber,
    pub user_id: UserId,
    pub pattern: WinPattern,
    pub winning_cells: Vec<CellPosition>,
    pub winning_number: BingoNumber,
    pub claimed_at: DateTime<Utc>,
}

impl WinClaim {
    #[must_use]
    pub fn new(
        card_number: CardNumber,
        user_id: UserId,
        winning_number: BingoNumber,
        found: PatternMatch,
    ) -> Self {
        Self {
            card_number,
            user_id,
            pattern: found.pattern,
            winning_cells: found.winning_cells,
            winning_number,
            claimed_at: Utc::now(),
        }
    }
}

/// Candidate lines in evaluation order: rows top to bottom, columns left to
/// right, main diagonal, anti-diagonal, four corners.
fn candidate_lines() -> impl Iterator<Item = (WinPattern, Vec<CellPosition>)> {
    let last = GRID_SIZE - 1;
    let rows = (0..GRID_SIZE).map(|row| {
        let cells = (0..GRID_SIZE).map(|col| CellPosition::new(row, col)).collect();
        (WinPattern::Row, cells)
    });
    let cols = (0..GRID_SIZE).map(|col| {
        let cells = (0..GRID_SIZE).map(|row| CellPosition::new(row, col)).collect();
        (WinPattern::Column, cells)
    });
    let main_diag = (0..GRID_SIZE).map(|i| CellPosition::new(i, i)).collect();
    let anti_diag = (0..GRID_SIZE).map(|i| CellPosition::new(i, last - i)).collect();
    let corners = vec![
        CellPosition::new(0, 0),
        CellPosition::new(0, last),
        CellPosition::new(last, 0),
        CellPosition::new(last, last),
    ];

    rows.chain(cols).chain([
        (WinPattern::Diagonal, main_diag),
        (WinPattern::Diagonal, anti_diag),
        (WinPattern::Corners, corners),
    ])
}

/// Check whether `card` holds a pattern completed by `last_called`.
///
/// A cell counts as marked if it is the free centre or its number has been
/// called. Patterns that don't contain the cell printed with `last_called`
/// never match, so a card that missed an earlier chance can't win later on a
/// number that doesn't touch the line.
#[must_use]
pub fn evaluate(
    card: &BingoCard,
    called: &CalledNumberLog,
    last_called: BingoNumber,
) -> Option<PatternMatch> {
    let trigger = card.position_of(last_called)?;

    let is_marked = |pos: CellPosition| match card.cell(pos) {
        CardCell::Free => true,
        CardCell::Number(n) => n == last_called || called.contains(n),
    };

    candidate_lines()
        .filter(|(_, cells)| cells.contains(&trigger))
        .find(|(_, cells)| cells.iter().all(|&pos| is_marked(pos)))
        .map(|(pattern, winning_cells)| PatternMatch {
            pattern,
            winning_cells,
        })
}
