//! Line and full-card detection.
//!
//! Evaluation is a pure function of a card and its marks. The
//! [`WinTracker`] sits on top and turns successive evaluations into one-shot
//! transitions, so a UI celebrates a line or a bingo once instead of on
//! every mark.

use super::{card::BingoCard, marks::MarkSet, mode::GameMode};

/// The 12 winning lines of a 75-ball card: 5 rows, 5 columns, 2 diagonals.
pub const CLASSIC_LINES: [[usize; 5]; 12] = [
    [0, 1, 2, 3, 4],
    [5, 6, 7, 8, 9],
    [10, 11, 12, 13, 14],
    [15, 16, 17, 18, 19],
    [20, 21, 22, 23, 24],
    [0, 5, 10, 15, 20],
    [1, 6, 11, 16, 21],
    [2, 7, 12, 17, 22],
    [3, 8, 13, 18, 23],
    [4, 9, 14, 19, 24],
    [0, 6, 12, 18, 24],
    [4, 8, 12, 16, 20],
];

/// Result of evaluating a card against its marks.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct WinStatus {
    pub has_line: bool,
    pub has_bingo: bool,
}

/// Evaluate `card` against `marks`.
///
/// 75-ball: a line is any of [`CLASSIC_LINES`], bingo is all 25 cells.
/// 90-ball: a row is complete once each of its numbers is marked (empty
/// slots are ignored); a line is one complete row, bingo is all three.
pub fn evaluate(card: &BingoCard, marks: &MarkSet) -> WinStatus {
    match card.mode() {
        GameMode::Classic75 => WinStatus {
            has_line: CLASSIC_LINES.iter().any(|line| marks.contains_all(line)),
            has_bingo: (0..GameMode::Classic75.cell_count()).all(|index| marks.contains(index)),
        },
        GameMode::European90 => {
            let cols = GameMode::European90.cols();
            let complete_rows = (0..GameMode::European90.rows())
                .filter(|row| {
                    (row * cols..(row + 1) * cols).all(|index| {
                        !card.cell_at(index).is_some_and(|cell| cell.is_markable())
                            || marks.contains(index)
                    })
                })
                .count();
            WinStatus {
                has_line: complete_rows >= 1,
                has_bingo: complete_rows == GameMode::European90.rows(),
            }
        }
    }
}

/// Flags that flipped from `false` to `true` in one update.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WinTransition {
    pub line_reached: bool,
    pub bingo_reached: bool,
}

impl WinTransition {
    pub fn any(self) -> bool {
        self.line_reached || self.bingo_reached
    }
}

/// Remembers the last [`WinStatus`] and reports rising edges.
#[derive(Clone, Debug, Default)]
pub struct WinTracker {
    last: WinStatus,
}

impl WinTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> WinStatus {
        self.last
    }

    /// Record `status`, returning which flags just became true.
    ///
    /// A flag that drops back to false re-arms its transition.
    pub fn update(&mut self, status: WinStatus) -> WinTransition {
        let transition = WinTransition {
            line_reached: status.has_line && !self.last.has_line,
            bingo_reached: status.has_bingo && !self.last.has_bingo,
        };
        self.last = status;
        transition
    }

    pub fn reset(&mut self) {
        self.last = WinStatus::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::{CardGenerator, Cell};

    fn classic_card() -> BingoCard {
        CardGenerator::seeded(21).generate(GameMode::Classic75)
    }

    fn european_card() -> BingoCard {
        CardGenerator::seeded(21).generate(GameMode::European90)
    }

    #[test]
    fn test_fresh_card_has_no_win() {
        let card = classic_card();
        let marks = MarkSet::new(GameMode::Classic75);
        assert_eq!(evaluate(&card, &marks), WinStatus::default());
    }

    #[test]
    fn test_every_classic_line_wins() {
        let card = classic_card();
        for line in CLASSIC_LINES {
            let mut marks = MarkSet::new(GameMode::Classic75);
            for index in line {
                marks.insert(index);
            }
            let status = evaluate(&card, &marks);
            assert!(status.has_line, "line {line:?} not detected");
            assert!(!status.has_bingo);
        }
    }

    #[test]
    fn test_centre_row_needs_only_four_marks() {
        let card = classic_card();
        let mut marks = MarkSet::new(GameMode::Classic75);
        for index in [10, 11, 13, 14] {
            marks.insert(index);
        }
        assert!(evaluate(&card, &marks).has_line);
    }

    #[test]
    fn test_classic_bingo_and_unmark() {
        let card = classic_card();
        let mut marks = MarkSet::new(GameMode::Classic75);
        for index in 0..25 {
            marks.insert(index);
        }
        assert_eq!(
            evaluate(&card, &marks),
            WinStatus {
                has_line: true,
                has_bingo: true
            }
        );

        marks.remove(0);
        let status = evaluate(&card, &marks);
        assert!(status.has_line);
        assert!(!status.has_bingo);
    }

    #[test]
    fn test_european_row_ignores_empty_slots() {
        let card = european_card();
        let mut marks = MarkSet::new(GameMode::European90);
        for col in 0..9 {
            if card.cell(0, col).is_some_and(Cell::is_markable) {
                marks.insert(col);
            }
        }
        let status = evaluate(&card, &marks);
        assert!(status.has_line);
        assert!(!status.has_bingo);
    }

    #[test]
    fn test_european_bingo_needs_all_rows() {
        let card = european_card();
        let mut marks = MarkSet::new(GameMode::European90);
        for (index, cell) in card.flatten().into_iter().enumerate() {
            if cell.is_markable() {
                marks.insert(index);
            }
        }
        assert!(evaluate(&card, &marks).has_bingo);

        let last = card.index_of(card.numbers()[14]).unwrap();
        marks.remove(last);
        let status = evaluate(&card, &marks);
        assert!(status.has_line);
        assert!(!status.has_bingo);
    }

    #[test]
    fn test_tracker_reports_rising_edges_once() {
        let mut tracker = WinTracker::new();
        let line = WinStatus {
            has_line: true,
            has_bingo: false,
        };

        assert_eq!(
            tracker.update(line),
            WinTransition {
                line_reached: true,
                bingo_reached: false
            }
        );
        assert!(!tracker.update(line).any());

        tracker.update(WinStatus::default());
        assert!(tracker.update(line).line_reached);

        tracker.reset();
        assert_eq!(tracker.status(), WinStatus::default());
    }
}
