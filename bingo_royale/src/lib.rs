//! # Bingo Royale
//!
//! Local-network multiplayer bingo. One device is the caller: it draws balls
//! and broadcasts them. The others are players: they receive balls, mark
//! their cards and claim wins.
//!
//! ## Architecture
//!
//! - **Cards and rules**: 75-ball (5x5, free centre) and 90-ball (3x9, five
//!   numbers per row) cards, marks and win detection
//! - **Discovery**: players broadcast a UDP request; callers answer with
//!   their name, TCP port and mode
//! - **Sessions**: newline-delimited JSON over TCP; the caller fans records
//!   out to every player, players send win claims back
//! - **Coordinators**: own the game state on each side and turn session
//!   events into state changes
//!
//! ## Core Modules
//!
//! - [`game`]: Modes, cards, marks, win detection and the draw
//! - [`net`]: Discovery, framing, session server and client
//! - [`coordinator`]: Caller and player game coordinators
//! - [`config`]: Network settings and preferences
//!
//! ## Example
//!
//! ```
//! use bingo_royale::{CardGenerator, GameMode, MarkSet, win};
//!
//! let card = CardGenerator::seeded(7).generate(GameMode::Classic75);
//! let marks = MarkSet::new(GameMode::Classic75);
//! assert!(!win::evaluate(&card, &marks).has_line);
//! ```

/// Network settings and user preferences.
pub mod config;

/// Caller and player coordinators.
pub mod coordinator;

/// Card generation, marking and win detection.
pub mod game;
pub use game::{
    BingoCard, CardGenerator, Cell, DrawState, GameError, GameMode, GameResult, MarkSet,
    WinStatus, WinTracker, WinTransition, win,
};

/// Networking components for caller/player sessions.
pub mod net;
pub use net::{
    client::{ClientEvent, ConnectionState, SessionClient},
    discovery::ServerInfo,
    errors::{NetError, NetResult},
    messages::{self, WireMessage},
    server::{ServerEvent, SessionServer},
};

pub use coordinator::{
    CallerSnapshot, GameCoordinator, PlayerCoordinator, PlayerNotice, PlayerSnapshot,
};
