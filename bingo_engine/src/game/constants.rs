//! Fixed dimensions of the 75-ball game.

/// Cards are square grids of this many rows and columns.
pub const GRID_SIZE: usize = 5;

/// Row and column of the free centre cell.
pub const FREE_CELL: (usize, usize) = (2, 2);

/// Highest number in the draw universe (`B1` .. `O75`).
pub const MAX_NUMBER: u8 = 75;

/// Numbers per letter column.
pub const NUMBERS_PER_LETTER: u8 = 15;

/// Highest card number in the external card table.
pub const MAX_CARD_NUMBER: u8 = 100;

/// Fraction of the entry pool paid out to winners, in percent. The house keeps the rest.
pub const PAYOUT_PERCENT: i64 = 80;
