//! Game error types.

use thiserror::Error;

/// Errors raised by card generation and the caller's draw state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    /// A mode value outside the supported set (75 or 90).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Every ball of the current game has already been drawn.
    #[error("No balls remaining")]
    NoBallsRemaining,
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;
