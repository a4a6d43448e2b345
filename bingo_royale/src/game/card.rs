//! Bingo cards and the generator that deals them.
//!
//! A 75-ball card is a 5x5 grid whose columns draw from disjoint 15-number
//! ranges, with a free centre cell. A 90-ball card is a 3x9 grid where every
//! row holds exactly five numbers in distinct columns.
//!
//! Cards are immutable once dealt; a new card replaces the old one wholesale.

use rand::{
    Rng, SeedableRng,
    rngs::StdRng,
    seq::{SliceRandom, index},
};
use std::fmt;

use super::mode::GameMode;

/// Value a renderer sees for the free centre cell.
pub const FREE_VALUE: i16 = 0;

/// Value a renderer sees for an empty slot on a 90-ball card.
pub const EMPTY_VALUE: i16 = -1;

/// One cell of a card.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Cell {
    Number(u8),
    /// The always-marked centre of a 75-ball card.
    Free,
    /// A blank slot on a 90-ball card.
    Empty,
}

impl Cell {
    /// Flat value used for rendering; sentinels never collide with a ball.
    pub const fn value(self) -> i16 {
        match self {
            Self::Number(number) => number as i16,
            Self::Free => FREE_VALUE,
            Self::Empty => EMPTY_VALUE,
        }
    }

    pub const fn number(self) -> Option<u8> {
        match self {
            Self::Number(number) => Some(number),
            _ => None,
        }
    }

    /// Only numbered cells can be marked or unmarked by a player.
    pub const fn is_markable(self) -> bool {
        matches!(self, Self::Number(_))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Grid {
    /// Column-major: `cells[col][row]`.
    Classic([[Cell; 5]; 5]),
    /// Row-major: `cells[row][col]`.
    European([[Cell; 9]; 3]),
}

/// A dealt bingo card.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BingoCard {
    grid: Grid,
}

impl BingoCard {
    /// Build a 75-ball card from its columns (`columns[col][row]`).
    pub fn from_columns(columns: [[Cell; 5]; 5]) -> Self {
        Self {
            grid: Grid::Classic(columns),
        }
    }

    /// Build a 90-ball card from its rows (`rows[row][col]`).
    pub fn from_rows(rows: [[Cell; 9]; 3]) -> Self {
        Self {
            grid: Grid::European(rows),
        }
    }

    pub fn mode(&self) -> GameMode {
        match self.grid {
            Grid::Classic(_) => GameMode::Classic75,
            Grid::European(_) => GameMode::European90,
        }
    }

    /// Cell at `(row, col)`, or `None` outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        match &self.grid {
            Grid::Classic(columns) => columns.get(col)?.get(row).copied(),
            Grid::European(rows) => rows.get(row)?.get(col).copied(),
        }
    }

    /// Cell at a flattened row-major index.
    pub fn cell_at(&self, index: usize) -> Option<Cell> {
        let cols = self.mode().cols();
        if index >= self.mode().cell_count() {
            return None;
        }
        self.cell(index / cols, index % cols)
    }

    /// Row-major view of the card, the order a renderer draws it in.
    pub fn flatten(&self) -> Vec<Cell> {
        let mode = self.mode();
        let mut cells = Vec::with_capacity(mode.cell_count());
        for row in 0..mode.rows() {
            for col in 0..mode.cols() {
                if let Some(cell) = self.cell(row, col) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Row-major values with the free/empty sentinels.
    pub fn flat_values(&self) -> Vec<i16> {
        self.flatten().into_iter().map(Cell::value).collect()
    }

    /// Every real number on the card.
    pub fn numbers(&self) -> Vec<u8> {
        self.flatten().into_iter().filter_map(Cell::number).collect()
    }

    /// Flattened index holding `number`, if the card has it.
    pub fn index_of(&self, number: u8) -> Option<usize> {
        self.flatten()
            .into_iter()
            .position(|cell| cell == Cell::Number(number))
    }
}

impl fmt::Display for BingoCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = self.mode();
        if mode == GameMode::Classic75 {
            for letter in super::mode::BINGO_LETTERS {
                write!(f, "{letter:>4}")?;
            }
            writeln!(f)?;
        }
        for row in 0..mode.rows() {
            for col in 0..mode.cols() {
                match self.cell(row, col) {
                    Some(Cell::Number(number)) => write!(f, "{number:>4}")?,
                    Some(Cell::Free) => write!(f, "{:>4}", "*")?,
                    _ => write!(f, "{:>4}", ".")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Deals randomized cards from an owned entropy source.
///
/// The default source is an OS-seeded [`StdRng`]. Tests pass a seeded one to
/// get reproducible cards.
pub struct CardGenerator<R = StdRng> {
    rng: R,
}

impl CardGenerator<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Generator with a fixed seed, for reproducible dealing.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for CardGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> CardGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Deal a fresh card for `mode`.
    pub fn generate(&mut self, mode: GameMode) -> BingoCard {
        match mode {
            GameMode::Classic75 => self.generate_classic(),
            GameMode::European90 => self.generate_european(),
        }
    }

    fn generate_classic(&mut self) -> BingoCard {
        let mode = GameMode::Classic75;
        let free = mode.free_index().map(|index| (index / 5, index % 5));
        let mut columns = [[Cell::Empty; 5]; 5];

        for (col, column) in columns.iter_mut().enumerate() {
            let mut pool: Vec<u8> = mode.column_range(col).collect();
            pool.shuffle(&mut self.rng);
            let mut numbers = pool.into_iter();

            for (row, cell) in column.iter_mut().enumerate() {
                *cell = if free == Some((row, col)) {
                    Cell::Free
                } else {
                    numbers.next().map_or(Cell::Empty, Cell::Number)
                };
            }
        }

        BingoCard::from_columns(columns)
    }

    fn generate_european(&mut self) -> BingoCard {
        let mode = GameMode::European90;
        let mut pools: Vec<Vec<u8>> = (0..mode.cols())
            .map(|col| {
                let mut pool: Vec<u8> = mode.column_range(col).collect();
                pool.shuffle(&mut self.rng);
                pool
            })
            .collect();
        let mut rows = [[Cell::Empty; 9]; 3];

        for row in rows.iter_mut() {
            let mut chosen = index::sample(&mut self.rng, mode.cols(), 5).into_vec();
            chosen.sort_unstable();
            for col in chosen {
                // An exhausted pool leaves the slot empty.
                if let Some(number) = pools[col].pop() {
                    row[col] = Cell::Number(number);
                }
            }
        }

        BingoCard::from_rows(rows)
    }
}
