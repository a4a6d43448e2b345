use log::{debug, info};
use std::collections::BTreeSet;
use tokio::sync::mpsc;

use crate::{
    config::NetworkConfig,
    game::{
        card::{BingoCard, CardGenerator},
        marks::MarkSet,
        mode::GameMode,
        win::{self, WinStatus, WinTracker, WinTransition},
    },
    net::{
        client::{ClientEvent, ConnectionState, SessionClient},
        discovery::ServerInfo,
        errors::NetResult,
    },
};

/// One-time feedback a UI can turn into sound, vibration or a banner.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlayerNotice {
    /// The caller introduced itself.
    Joined { server: Option<String> },
    BallReceived { number: u8, marked: bool },
    CardRegenerated { mode: GameMode },
    LineAchieved,
    BingoAchieved,
    /// Someone, possibly this player, claimed a win.
    BingoCalled { player: String },
    GameReset,
    GameEnded,
    PongReceived,
    Disconnected,
}

/// The player's view of the game, for rendering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayerSnapshot {
    pub mode: GameMode,
    /// Row-major cell values; see [`crate::game::card::Cell::value`]
    pub cells: Vec<i16>,
    pub marks: Vec<usize>,
    pub connected: bool,
    pub server: Option<String>,
    pub last_ball: Option<u8>,
    /// Balls received this game, ascending
    pub drawn: Vec<u8>,
    pub status: WinStatus,
}

/// Runs a player's side of a game: the card, its marks and the client.
pub struct PlayerCoordinator {
    /// Connection to the caller
    client: SessionClient,

    /// Deals this player's cards
    generator: CardGenerator,

    card: BingoCard,

    marks: MarkSet,

    /// Turns win evaluations into one-shot notices
    tracker: WinTracker,

    last_ball: Option<u8>,

    /// Balls received since the current card was dealt
    drawn: BTreeSet<u8>,

    /// Mark received balls automatically
    auto_mark: bool,

    /// Name sent with win claims
    player_name: String,
}

impl PlayerCoordinator {
    /// Create a coordinator holding a fresh card for `mode`.
    ///
    /// # Returns
    ///
    /// * `(PlayerCoordinator, UnboundedReceiver<ClientEvent>)` - Coordinator and the
    ///   client events to feed back through [`Self::handle_event`]
    pub fn new(
        config: NetworkConfig,
        mode: GameMode,
        player_name: &str,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        Self::with_generator(config, mode, player_name, CardGenerator::new())
    }

    /// Create a coordinator dealing from `generator`.
    pub fn with_generator(
        config: NetworkConfig,
        mode: GameMode,
        player_name: &str,
        mut generator: CardGenerator,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (client, events) = SessionClient::new(config);
        let card = generator.generate(mode);
        let coordinator = Self {
            client,
            generator,
            card,
            marks: MarkSet::new(mode),
            tracker: WinTracker::new(),
            last_ball: None,
            drawn: BTreeSet::new(),
            auto_mark: false,
            player_name: player_name.to_string(),
        };
        (coordinator, events)
    }

    pub fn set_auto_mark(&mut self, auto_mark: bool) {
        self.auto_mark = auto_mark;
    }

    pub fn set_player_name(&mut self, name: &str) {
        self.player_name = name.to_string();
    }

    /// Apply one client event.
    ///
    /// # Returns
    ///
    /// * `Vec<PlayerNotice>` - Feedback for the UI, in the order it happened
    pub fn handle_event(&mut self, event: ClientEvent) -> Vec<PlayerNotice> {
        let mut notices = Vec::new();
        match event {
            ClientEvent::Welcome { mode, server } => {
                notices.push(PlayerNotice::Joined { server });
                if mode != self.card.mode() {
                    self.generate_new_card(mode);
                    notices.push(PlayerNotice::CardRegenerated { mode });
                } else {
                    // Balls from an earlier session don't count in this one.
                    self.last_ball = None;
                    self.drawn.clear();
                }
            }
            ClientEvent::Ball(number) => {
                self.last_ball = Some(number);
                self.drawn.insert(number);

                let index = self.card.index_of(number).filter(|_| self.auto_mark);
                let marked = index.is_some_and(|index| self.marks.insert(index));
                notices.push(PlayerNotice::BallReceived { number, marked });
                if marked {
                    push_transition(&mut notices, self.reevaluate());
                }
            }
            ClientEvent::NewGame { mode } => {
                self.generate_new_card(mode);
                notices.push(PlayerNotice::CardRegenerated { mode });
            }
            ClientEvent::GameReset => {
                self.clear_all_marks();
                self.drawn.clear();
                notices.push(PlayerNotice::GameReset);
            }
            ClientEvent::GameEnd => notices.push(PlayerNotice::GameEnded),
            ClientEvent::BingoCalled { player } => {
                notices.push(PlayerNotice::BingoCalled { player });
            }
            ClientEvent::Pong => notices.push(PlayerNotice::PongReceived),
            ClientEvent::Disconnected => notices.push(PlayerNotice::Disconnected),
        }
        notices
    }

    /// Mark or unmark the cell at a flattened index.
    ///
    /// Free and empty cells never change. While connected, only cells whose
    /// number has been received can be toggled.
    ///
    /// # Returns
    ///
    /// * `Some(WinTransition)` - The cell was toggled; any newly reached wins
    /// * `None` - The toggle was refused
    pub fn toggle_mark(&mut self, index: usize) -> Option<WinTransition> {
        let number = self.card.cell_at(index)?.number()?;
        if self.client.is_connected() && !self.drawn.contains(&number) {
            debug!("refusing to mark {number}: not drawn yet");
            return None;
        }
        self.marks.toggle(index);
        Some(self.reevaluate())
    }

    /// Deal a new card for `mode`, dropping all marks and received balls.
    pub fn generate_new_card(&mut self, mode: GameMode) {
        self.card = self.generator.generate(mode);
        self.marks = MarkSet::new(mode);
        self.tracker.reset();
        self.last_ball = None;
        self.drawn.clear();
        info!("dealt a new {mode}-ball card");
    }

    /// Remove every mark except the free space.
    pub fn clear_all_marks(&mut self) {
        self.marks.clear();
        self.last_ball = None;
        self.tracker.update(win::evaluate(&self.card, &self.marks));
    }

    /// Claim a win under this player's name.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NotConnected`](crate::net::errors::NetError::NotConnected)
    /// when there is no caller to tell.
    pub async fn call_bingo(&mut self) -> NetResult<()> {
        info!("calling bingo as {}", self.player_name);
        self.client.send_win_claim(&self.player_name).await
    }

    pub async fn ping(&mut self) -> NetResult<()> {
        self.client.send_ping().await
    }

    pub async fn discover_and_connect(&mut self) -> NetResult<Option<ServerInfo>> {
        self.client.discover_and_connect().await
    }

    pub async fn connect_by_address(&mut self, host: &str, port: u16) -> NetResult<()> {
        self.client.connect_by_address(host, port).await
    }

    pub async fn disconnect(&mut self) {
        self.client.disconnect().await;
    }

    pub async fn release(&mut self) {
        self.client.release().await;
    }

    pub fn card(&self) -> &BingoCard {
        &self.card
    }

    pub fn marks(&self) -> &MarkSet {
        &self.marks
    }

    pub fn mode(&self) -> GameMode {
        self.card.mode()
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let server = match self.client.state() {
            ConnectionState::Connected { server } => Some(server),
            _ => None,
        };
        PlayerSnapshot {
            mode: self.card.mode(),
            cells: self.card.flat_values(),
            marks: self.marks.to_vec(),
            connected: server.is_some(),
            server,
            last_ball: self.last_ball,
            drawn: self.drawn.iter().copied().collect(),
            status: self.tracker.status(),
        }
    }

    fn reevaluate(&mut self) -> WinTransition {
        self.tracker.update(win::evaluate(&self.card, &self.marks))
    }
}

fn push_transition(notices: &mut Vec<PlayerNotice>, transition: WinTransition) {
    if transition.line_reached {
        notices.push(PlayerNotice::LineAchieved);
    }
    if transition.bingo_reached {
        notices.push(PlayerNotice::BingoAchieved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::Cell;

    fn player(mode: GameMode) -> PlayerCoordinator {
        PlayerCoordinator::with_generator(
            NetworkConfig::loopback(),
            mode,
            "Ada",
            CardGenerator::seeded(17),
        )
        .0
    }

    fn first_number_index(player: &PlayerCoordinator) -> (usize, u8) {
        player
            .card()
            .flatten()
            .into_iter()
            .enumerate()
            .find_map(|(index, cell)| cell.number().map(|number| (index, number)))
            .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let player = player(GameMode::Classic75);
        let snapshot = player.snapshot();
        assert_eq!(snapshot.mode, GameMode::Classic75);
        assert_eq!(snapshot.cells.len(), 25);
        assert_eq!(snapshot.marks, vec![12]);
        assert!(!snapshot.connected);
        assert_eq!(snapshot.last_ball, None);
    }

    #[test]
    fn test_toggle_free_and_empty_cells_refused() {
        let mut classic = player(GameMode::Classic75);
        assert_eq!(classic.toggle_mark(12), None);
        assert!(classic.marks().contains(12));
        assert_eq!(classic.toggle_mark(25), None);

        let mut european = player(GameMode::European90);
        let empty = european
            .card()
            .flatten()
            .iter()
            .position(|cell| *cell == Cell::Empty)
            .unwrap();
        assert_eq!(european.toggle_mark(empty), None);
        assert!(european.marks().is_empty());
    }

    #[test]
    fn test_toggle_while_offline_is_free() {
        let mut player = player(GameMode::Classic75);
        let (index, _) = first_number_index(&player);
        assert!(player.toggle_mark(index).is_some());
        assert!(player.marks().contains(index));
        assert!(player.toggle_mark(index).is_some());
        assert!(!player.marks().contains(index));
    }

    #[test]
    fn test_line_reported_once() {
        let mut player = player(GameMode::Classic75);
        // Centre row: indices 10, 11, 13, 14 plus the free space.
        for index in [10, 11, 13] {
            assert_eq!(player.toggle_mark(index), Some(WinTransition::default()));
        }
        let transition = player.toggle_mark(14).unwrap();
        assert!(transition.line_reached);
        assert!(!transition.bingo_reached);
        assert!(player.snapshot().status.has_line);

        // Marking more keeps the line without reporting it again.
        assert!(!player.toggle_mark(0).unwrap().line_reached);
    }

    #[test]
    fn test_ball_updates_last_and_drawn() {
        let mut player = player(GameMode::Classic75);
        let notices = player.handle_event(ClientEvent::Ball(42));
        assert_eq!(
            notices,
            vec![PlayerNotice::BallReceived {
                number: 42,
                marked: false
            }]
        );
        let snapshot = player.snapshot();
        assert_eq!(snapshot.last_ball, Some(42));
        assert_eq!(snapshot.drawn, vec![42]);
    }

    #[test]
    fn test_welcome_forgets_previous_session_balls() {
        let mut player = player(GameMode::Classic75);
        let card_before = player.snapshot().cells;
        player.handle_event(ClientEvent::Ball(42));
        player.handle_event(ClientEvent::Ball(7));

        let notices = player.handle_event(ClientEvent::Welcome {
            mode: GameMode::Classic75,
            server: Some("Hall".to_string()),
        });
        assert_eq!(
            notices,
            vec![PlayerNotice::Joined {
                server: Some("Hall".to_string())
            }]
        );
        let snapshot = player.snapshot();
        assert_eq!(snapshot.cells, card_before);
        assert_eq!(snapshot.last_ball, None);
        assert!(snapshot.drawn.is_empty());
    }

    #[test]
    fn test_auto_mark() {
        let mut player = player(GameMode::Classic75);
        player.set_auto_mark(true);
        let (index, number) = first_number_index(&player);

        let notices = player.handle_event(ClientEvent::Ball(number));
        assert_eq!(
            notices[0],
            PlayerNotice::BallReceived {
                number,
                marked: true
            }
        );
        assert!(player.marks().contains(index));
    }

    #[test]
    fn test_auto_mark_completes_line() {
        let mut player = player(GameMode::Classic75);
        player.set_auto_mark(true);
        let row: Vec<u8> = [10, 11, 13, 14]
            .iter()
            .map(|&index| player.card().cell_at(index).unwrap().number().unwrap())
            .collect();

        let mut notices = Vec::new();
        for number in row {
            notices.extend(player.handle_event(ClientEvent::Ball(number)));
        }
        assert_eq!(
            notices
                .iter()
                .filter(|notice| **notice == PlayerNotice::LineAchieved)
                .count(),
            1
        );
        assert_eq!(notices.last(), Some(&PlayerNotice::LineAchieved));
    }

    #[test]
    fn test_welcome_with_other_mode_regenerates() {
        let mut player = player(GameMode::Classic75);
        let notices = player.handle_event(ClientEvent::Welcome {
            mode: GameMode::European90,
            server: Some("Hall".to_string()),
        });
        assert_eq!(
            notices,
            vec![
                PlayerNotice::Joined {
                    server: Some("Hall".to_string())
                },
                PlayerNotice::CardRegenerated {
                    mode: GameMode::European90
                },
            ]
        );
        assert_eq!(player.mode(), GameMode::European90);
        assert_eq!(player.snapshot().cells.len(), 27);
        assert!(player.marks().is_empty());
    }

    #[test]
    fn test_welcome_with_same_mode_keeps_card() {
        let mut player = player(GameMode::Classic75);
        let card = player.card().clone();
        player.handle_event(ClientEvent::Welcome {
            mode: GameMode::Classic75,
            server: None,
        });
        assert_eq!(player.card(), &card);
    }

    #[test]
    fn test_new_game_always_deals() {
        let mut player = player(GameMode::Classic75);
        let card = player.card().clone();
        player.handle_event(ClientEvent::Ball(5));
        let notices = player.handle_event(ClientEvent::NewGame {
            mode: GameMode::Classic75,
        });
        assert_eq!(
            notices,
            vec![PlayerNotice::CardRegenerated {
                mode: GameMode::Classic75
            }]
        );
        assert_ne!(player.card(), &card);
        assert!(player.snapshot().drawn.is_empty());
        assert_eq!(player.snapshot().last_ball, None);
    }

    #[test]
    fn test_reset_clears_marks() {
        let mut player = player(GameMode::Classic75);
        player.toggle_mark(0);
        player.handle_event(ClientEvent::Ball(3));
        assert_eq!(
            player.handle_event(ClientEvent::GameReset),
            vec![PlayerNotice::GameReset]
        );
        assert_eq!(player.marks().to_vec(), vec![12]);
        assert!(player.snapshot().drawn.is_empty());
    }

    #[test]
    fn test_clear_all_marks_rearms_line() {
        let mut player = player(GameMode::Classic75);
        for index in [10, 11, 13, 14] {
            player.toggle_mark(index);
        }
        player.clear_all_marks();
        assert!(!player.snapshot().status.has_line);
        for index in [10, 11, 13] {
            player.toggle_mark(index);
        }
        assert!(player.toggle_mark(14).unwrap().line_reached);
    }

    #[test]
    fn test_passthrough_notices() {
        let mut player = player(GameMode::Classic75);
        assert_eq!(
            player.handle_event(ClientEvent::BingoCalled {
                player: "Bob".to_string()
            }),
            vec![PlayerNotice::BingoCalled {
                player: "Bob".to_string()
            }]
        );
        assert_eq!(
            player.handle_event(ClientEvent::GameEnd),
            vec![PlayerNotice::GameEnded]
        );
        assert_eq!(
            player.handle_event(ClientEvent::Disconnected),
            vec![PlayerNotice::Disconnected]
        );
    }

    #[tokio::test]
    async fn test_call_bingo_offline_fails() {
        let mut player = player(GameMode::Classic75);
        assert!(player.call_bingo().await.is_err());
    }
}
