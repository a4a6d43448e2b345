use log::info;
use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::mpsc;

use crate::{
    config::NetworkConfig,
    game::{
        draw::DrawState,
        errors::GameResult,
        mode::GameMode,
    },
    net::{
        errors::NetResult,
        messages::GameEventKind,
        server::{ServerEvent, SessionServer},
    },
};

/// The caller's view of the game, for rendering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallerSnapshot {
    pub mode: GameMode,
    /// Drawn balls, oldest first
    pub drawn: Vec<u8>,
    pub remaining: usize,
    pub current_ball: Option<u8>,
    pub network_active: bool,
    pub connected_players: usize,
    /// Last player who claimed a win, until the caller dismisses it
    pub bingo_called_by: Option<String>,
    pub ended: bool,
}

impl CallerSnapshot {
    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

/// Runs the caller's side of a game: the draw and the session server.
pub struct GameCoordinator {
    /// Session hosting, stopped until the network is started
    server: SessionServer,

    /// Current game
    draw: DrawState,

    /// Shuffles every new game
    rng: StdRng,

    /// Last win claim that hasn't been dismissed
    bingo_called_by: Option<String>,

    /// Whether `end_game` was announced for the current game
    ended: bool,
}

impl GameCoordinator {
    /// Create a coordinator with an OS-seeded shuffle.
    ///
    /// # Returns
    ///
    /// * `(GameCoordinator, UnboundedReceiver<ServerEvent>)` - Coordinator and the
    ///   server events to feed back through [`Self::handle_server_event`]
    pub fn new(
        config: NetworkConfig,
        mode: GameMode,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        Self::with_rng(config, mode, StdRng::from_os_rng())
    }

    /// Create a coordinator whose draws are reproducible.
    pub fn with_seed(
        config: NetworkConfig,
        mode: GameMode,
        seed: u64,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        Self::with_rng(config, mode, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: NetworkConfig,
        mode: GameMode,
        mut rng: StdRng,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (server, events) = SessionServer::new(config);
        server.set_mode(mode);
        let draw = DrawState::new(mode, &mut rng);
        let coordinator = Self {
            server,
            draw,
            rng,
            bingo_called_by: None,
            ended: false,
        };
        (coordinator, events)
    }

    /// Draw the next ball and send it to every player.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NoBallsRemaining`](crate::game::errors::GameError::NoBallsRemaining)
    /// when the game is exhausted.
    pub fn draw_next_ball(&mut self) -> GameResult<u8> {
        let ball = self.draw.draw()?;
        let delivered = self.server.broadcast_ball(ball);
        match GameMode::letter_for_number(ball).filter(|_| self.mode() == GameMode::Classic75) {
            Some(letter) => info!("drew {letter}-{ball}, sent to {delivered} player(s)"),
            None => info!("drew {ball}, sent to {delivered} player(s)"),
        }
        Ok(ball)
    }

    /// Start over with a freshly shuffled game and announce it.
    pub fn start_new_game(&mut self, mode: GameMode) {
        self.draw = DrawState::new(mode, &mut self.rng);
        self.bingo_called_by = None;
        self.ended = false;
        self.server.set_mode(mode);
        self.server.broadcast_event(GameEventKind::NewGame(mode));
        info!("started a new {mode}-ball game");
    }

    /// Switch modes, starting a new game only if the mode changes.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether a new game was started
    pub fn set_mode(&mut self, mode: GameMode) -> bool {
        if mode == self.mode() {
            return false;
        }
        self.start_new_game(mode);
        true
    }

    /// Reshuffle the current mode and tell players to clear their marks.
    pub fn reset_game(&mut self) {
        self.draw = DrawState::new(self.mode(), &mut self.rng);
        self.bingo_called_by = None;
        self.ended = false;
        self.server.broadcast_event(GameEventKind::Reset);
        info!("reset the game");
    }

    /// Announce the end of the current game. The draw history is kept.
    pub fn end_game(&mut self) {
        self.ended = true;
        self.server.broadcast_event(GameEventKind::End);
        info!("ended the game after {} ball(s)", self.draw.drawn().len());
    }

    /// Open the session to players.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is running or can't bind its sockets.
    pub async fn start_network(&mut self, name: &str) -> NetResult<()> {
        let mode = self.mode();
        self.server.start(name, mode).await
    }

    pub async fn stop_network(&mut self) {
        self.server.stop().await;
    }

    /// Stop the session if it runs, otherwise start it.
    ///
    /// # Returns
    ///
    /// * `NetResult<bool>` - Whether the session is running afterwards
    pub async fn toggle_network(&mut self, name: &str) -> NetResult<bool> {
        if self.server.is_running() {
            self.stop_network().await;
            Ok(false)
        } else {
            self.start_network(name).await?;
            Ok(true)
        }
    }

    /// Record what a server event means for the game.
    ///
    /// # Returns
    ///
    /// * `Option<&str>` - The claimant, if the event is a win claim
    pub fn handle_server_event(&mut self, event: &ServerEvent) -> Option<&str> {
        match event {
            ServerEvent::BingoClaimed { player, .. } => {
                self.bingo_called_by = Some(player.clone());
                self.bingo_called_by.as_deref()
            }
            ServerEvent::ClientConnected { .. } | ServerEvent::ClientDisconnected { .. } => None,
        }
    }

    pub fn clear_bingo_notification(&mut self) {
        self.bingo_called_by = None;
    }

    pub fn mode(&self) -> GameMode {
        self.draw.mode()
    }

    pub fn server(&self) -> &SessionServer {
        &self.server
    }

    pub fn snapshot(&self) -> CallerSnapshot {
        CallerSnapshot {
            mode: self.mode(),
            drawn: self.draw.drawn().to_vec(),
            remaining: self.draw.remaining_count(),
            current_ball: self.draw.current(),
            network_active: self.server.is_running(),
            connected_players: self.server.connected_count(),
            bingo_called_by: self.bingo_called_by.clone(),
            ended: self.ended,
        }
    }
}
