//! Game modes and the number domain each one implies.

use serde::{Deserialize, Serialize};
use std::{fmt, ops::RangeInclusive, str::FromStr};

use super::errors::GameError;

/// Column letters of a 75-ball card.
pub const BINGO_LETTERS: [char; 5] = ['B', 'I', 'N', 'G', 'O'];

/// The two supported bingo variants.
///
/// On the wire (JSON and discovery records) a mode is the bare ball count,
/// `75` or `90`.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GameMode {
    /// USA bingo: 75 balls, 5x5 card with a free centre.
    #[default]
    Classic75,
    /// EU bingo: 90 balls, 3x9 card with 5 numbers per row.
    European90,
}

impl GameMode {
    /// Highest ball number; balls run from 1 to this value.
    pub const fn max_ball(self) -> u8 {
        match self {
            Self::Classic75 => 75,
            Self::European90 => 90,
        }
    }

    /// Every ball of the mode, in ascending order.
    pub fn balls(self) -> RangeInclusive<u8> {
        1..=self.max_ball()
    }

    pub const fn rows(self) -> usize {
        match self {
            Self::Classic75 => 5,
            Self::European90 => 3,
        }
    }

    pub const fn cols(self) -> usize {
        match self {
            Self::Classic75 => 5,
            Self::European90 => 9,
        }
    }

    /// Number of cells on a flattened card.
    pub const fn cell_count(self) -> usize {
        self.rows() * self.cols()
    }

    /// Flattened index of the free space, if the mode has one.
    pub const fn free_index(self) -> Option<usize> {
        match self {
            Self::Classic75 => Some(12),
            Self::European90 => None,
        }
    }

    /// Numbers allowed in the given card column.
    ///
    /// 75-ball columns hold 15 numbers each. 90-ball columns hold ten numbers,
    /// except the first (1-9) and the last (80-90).
    pub fn column_range(self, col: usize) -> RangeInclusive<u8> {
        match self {
            Self::Classic75 => {
                let start = (col as u8) * 15 + 1;
                start..=start + 14
            }
            Self::European90 => match col {
                0 => 1..=9,
                8 => 80..=90,
                _ => {
                    let start = (col as u8) * 10;
                    start..=start + 9
                }
            },
        }
    }

    /// Column a ball belongs to on this mode's card.
    pub fn column_for_number(self, number: u8) -> Option<usize> {
        (0..self.cols()).find(|&col| self.column_range(col).contains(&number))
    }

    /// Letter printed above a 75-ball column (`B`, `I`, `N`, `G`, `O`).
    pub fn letter_for_column(col: usize) -> Option<char> {
        BINGO_LETTERS.get(col).copied()
    }

    /// Letter a caller announces with a 75-ball number, e.g. `N` for 42.
    pub fn letter_for_number(number: u8) -> Option<char> {
        Self::Classic75
            .column_for_number(number)
            .and_then(Self::letter_for_column)
    }
}

impl TryFrom<u8> for GameMode {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            75 => Ok(Self::Classic75),
            90 => Ok(Self::European90),
            other => Err(GameError::InvalidConfiguration(format!(
                "unsupported game mode {other}, expected 75 or 90"
            ))),
        }
    }
}

impl From<GameMode> for u8 {
    fn from(mode: GameMode) -> Self {
        mode.max_ball()
    }
}

impl FromStr for GameMode {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<u8>().map_err(|_| {
            GameError::InvalidConfiguration(format!("game mode '{s}' is not a number"))
        })?;
        Self::try_from(value)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.max_ball())
    }
}
