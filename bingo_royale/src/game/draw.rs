use rand::{Rng, seq::SliceRandom};

use super::{
    errors::{GameError, GameResult},
    mode::GameMode,
};

/// Drawn history and the pre-shuffled balls still to come.
///
/// `drawn` and `remaining` always partition the mode's ball domain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DrawState {
    mode: GameMode,
    drawn: Vec<u8>,
    remaining: Vec<u8>,
}

impl DrawState {
    /// A fresh game with every ball shuffled into the bag.
    pub fn new<R: Rng + ?Sized>(mode: GameMode, rng: &mut R) -> Self {
        let mut remaining: Vec<u8> = mode.balls().collect();
        remaining.shuffle(rng);
        Self {
            mode,
            drawn: Vec::with_capacity(remaining.len()),
            remaining,
        }
    }

    /// Take the next ball off the end of the shuffled sequence.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NoBallsRemaining`] once the bag is empty.
    pub fn draw(&mut self) -> GameResult<u8> {
        let ball = self.remaining.pop().ok_or(GameError::NoBallsRemaining)?;
        self.drawn.push(ball);
        Ok(ball)
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Balls in the order they were drawn.
    pub fn drawn(&self) -> &[u8] {
        &self.drawn
    }

    pub fn current(&self) -> Option<u8> {
        self.drawn.last().copied()
    }

    pub fn remaining_count(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn is_drawn(&self, ball: u8) -> bool {
        self.drawn.contains(&ball)
    }
}
