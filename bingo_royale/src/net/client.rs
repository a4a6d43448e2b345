//! Player-side session client.
//!
//! The client drives a small connection state machine:
//!
//! ```text
//! Disconnected -> Scanning -> Connecting -> Connected
//!                      \            \
//!                       +-> Error <--+ -> (delay) -> Disconnected
//! ```
//!
//! While connected, a background listener reads records from the caller and
//! publishes them. State is observable through a `watch` channel (latest
//! state wins) and every record is delivered on an unbounded event stream.

use log::{debug, info, warn};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{mpsc, watch},
    task::JoinHandle,
};

use super::{
    discovery::{self, ServerInfo},
    errors::{NetError, NetResult},
    messages::WireMessage,
    utils::{read_delimited, write_delimited},
};
use crate::{config::NetworkConfig, game::mode::GameMode};

/// Reason shown while discovery found nobody.
pub const NO_SERVER_FOUND: &str = "no server found";

/// Where the client is in its connection lifecycle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Scanning,
    Connecting,
    /// Connected to the named caller (its address until it introduces itself).
    Connected { server: String },
    /// A transient failure; reverts to `Disconnected` after a delay.
    Error { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Scanning => write!(f, "scanning"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected { server } => write!(f, "connected to {server}"),
            Self::Error { reason } => write!(f, "error: {reason}"),
        }
    }
}

/// A record from the caller, or the loss of the connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientEvent {
    Welcome {
        mode: GameMode,
        server: Option<String>,
    },
    Ball(u8),
    NewGame {
        mode: GameMode,
    },
    GameReset,
    GameEnd,
    BingoCalled {
        player: String,
    },
    Pong,
    /// The caller went away. Not emitted for [`SessionClient::disconnect`].
    Disconnected,
}

/// State shared with the listener and the error-revert timer.
struct Shared {
    state: watch::Sender<ConnectionState>,
    mode: watch::Sender<GameMode>,
    events: mpsc::UnboundedSender<ClientEvent>,
    /// Id of the live connection, 0 when there is none. Whoever swaps it
    /// out owns the disconnect.
    current: AtomicU64,
}

impl Shared {
    fn is_current(&self, id: u64) -> bool {
        self.current.load(Ordering::Acquire) == id
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

struct Connection {
    id: u64,
    writer: OwnedWriteHalf,
    listener: JoinHandle<()>,
}

/// Connects a player to a caller.
pub struct SessionClient {
    /// Discovery target and timeouts
    config: NetworkConfig,

    shared: Arc<Shared>,

    /// Live connection, if any
    connection: Option<Connection>,

    next_id: u64,

    /// Pending `Error -> Disconnected` transition
    revert_task: Option<JoinHandle<()>>,

    released: bool,
}

impl SessionClient {
    /// Create a disconnected client.
    ///
    /// # Returns
    ///
    /// * `(SessionClient, UnboundedReceiver<ClientEvent>)` - Client and its event stream
    pub fn new(config: NetworkConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (mode, _) = watch::channel(GameMode::default());
        let client = Self {
            config,
            shared: Arc::new(Shared {
                state,
                mode,
                events,
                current: AtomicU64::new(0),
            }),
            connection: None,
            next_id: 1,
            revert_task: None,
            released: false,
        };
        (client, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Mode announced by the caller, updated on welcome and new game.
    pub fn mode(&self) -> GameMode {
        *self.shared.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<GameMode> {
        self.shared.mode.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| self.shared.is_current(conn.id))
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Look for a caller and connect to the first one that answers.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ServerInfo))` - Connected to this caller
    /// * `Ok(None)` - Nobody answered; the state shows [`NO_SERVER_FOUND`] for a while
    ///
    /// # Errors
    ///
    /// Returns an error if discovery can't run or the connect fails. The
    /// state shows the failure and reverts to `Disconnected` after the
    /// configured delay.
    pub async fn discover_and_connect(&mut self) -> NetResult<Option<ServerInfo>> {
        self.begin()?;
        self.shared.state.send_replace(ConnectionState::Scanning);

        let servers = match discovery::discover(&self.config).await {
            Ok(servers) => servers,
            Err(error) => {
                let error = NetError::Io(error);
                self.fail(error.to_string());
                return Err(error);
            }
        };

        let Some(server) = servers.into_iter().next() else {
            info!("discovery finished without an answer");
            self.fail(NO_SERVER_FOUND.to_string());
            return Ok(None);
        };

        self.connect_to(&server.addr.to_string(), server.name.clone())
            .await?;
        Ok(Some(server))
    }

    /// Connect straight to a known caller.
    ///
    /// # Errors
    ///
    /// - [`NetError::Released`] after [`Self::release`]
    /// - [`NetError::ConnectTimeout`] or [`NetError::Connect`] if the caller can't be reached
    pub async fn connect_by_address(&mut self, host: &str, port: u16) -> NetResult<()> {
        self.begin()?;
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        self.connect_to(&addr, addr.clone()).await
    }

    /// Send a win claim to the caller.
    ///
    /// # Errors
    ///
    /// - [`NetError::NotConnected`] if there is no live connection
    /// - [`NetError::MessageTooLarge`] if the name doesn't fit in a record
    pub async fn send_win_claim(&mut self, player: &str) -> NetResult<()> {
        self.send(&WireMessage::Bingo {
            player: player.to_string(),
        })
        .await
    }

    /// Ask the caller for a `pong`.
    pub async fn send_ping(&mut self) -> NetResult<()> {
        self.send(&WireMessage::Ping).await
    }

    /// Close the connection, if any, and settle in `Disconnected`.
    ///
    /// Safe from any state. The socket is closed and the listener has
    /// stopped by the time this returns.
    pub async fn disconnect(&mut self) {
        self.cancel_revert();
        self.close_connection().await;
        self.shared
            .state
            .send_replace(ConnectionState::Disconnected);
    }

    /// Disconnect and stop all background activity for good.
    pub async fn release(&mut self) {
        self.disconnect().await;
        self.released = true;
    }

    /// Shared preamble of every connect attempt.
    fn begin(&mut self) -> NetResult<()> {
        if self.released {
            return Err(NetError::Released);
        }
        self.cancel_revert();
        if let Some(conn) = self.connection.take() {
            self.shared.current.store(0, Ordering::Release);
            conn.listener.abort();
        }
        Ok(())
    }

    async fn connect_to(&mut self, addr: &str, server: String) -> NetResult<()> {
        self.shared.state.send_replace(ConnectionState::Connecting);
        debug!("connecting to {addr}");

        let timeout = self.config.connect_timeout;
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(self.fail_with(NetError::Connect {
                    addr: addr.to_string(),
                    source,
                }));
            }
            Err(_) => {
                return Err(self.fail_with(NetError::ConnectTimeout {
                    addr: addr.to_string(),
                    timeout,
                }));
            }
        };
        if let Err(error) = stream.set_nodelay(true) {
            debug!("failed to set TCP_NODELAY: {error}");
        }

        let id = self.next_id;
        self.next_id += 1;
        let (read_half, writer) = stream.into_split();

        // Publish `Connected` before the listener can report anything newer.
        self.shared.current.store(id, Ordering::Release);
        self.shared
            .state
            .send_replace(ConnectionState::Connected { server });
        let listener = tokio::spawn(listen(id, read_half, Arc::clone(&self.shared)));

        info!("connected to {addr}");
        self.connection = Some(Connection {
            id,
            writer,
            listener,
        });
        Ok(())
    }

    async fn send(&mut self, msg: &WireMessage) -> NetResult<()> {
        if self.released {
            return Err(NetError::Released);
        }
        if !self.is_connected() {
            // The listener already saw the caller leave; drop the stale half.
            self.connection = None;
            return Err(NetError::NotConnected);
        }
        let conn = self.connection.as_mut().ok_or(NetError::NotConnected)?;
        write_delimited(&mut conn.writer, msg).await
    }

    async fn close_connection(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };
        // Claim the disconnect so the listener stays quiet.
        self.shared.current.store(0, Ordering::Release);
        let _ = conn.writer.shutdown().await;
        conn.listener.abort();
        let _ = conn.listener.await;
        info!("disconnected");
    }

    fn fail_with(&mut self, error: NetError) -> NetError {
        warn!("{error}");
        self.fail(error.to_string());
        error
    }

    /// Show `reason`, then fall back to `Disconnected` after the delay.
    fn fail(&mut self, reason: String) {
        self.shared
            .state
            .send_replace(ConnectionState::Error { reason });

        let shared = Arc::clone(&self.shared);
        let delay = self.config.error_revert_delay;
        self.revert_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.state.send_if_modified(|state| {
                if matches!(state, ConnectionState::Error { .. }) {
                    *state = ConnectionState::Disconnected;
                    true
                } else {
                    false
                }
            });
        }));
    }

    fn cancel_revert(&mut self) {
        if let Some(task) = self.revert_task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.cancel_revert();
        if let Some(conn) = self.connection.take() {
            self.shared.current.store(0, Ordering::Release);
            conn.listener.abort();
        }
    }
}

/// Read records until the caller goes away, publishing each one.
async fn listen(id: u64, stream: OwnedReadHalf, shared: Arc<Shared>) {
    let mut reader = BufReader::new(stream);
    loop {
        let line = match read_delimited(&mut reader).await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("caller closed the connection");
                break;
            }
            Err(error) => {
                warn!("connection lost: {error}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg = match WireMessage::decode(&line) {
            Ok(msg) => msg,
            Err(error) => {
                debug!("discarding malformed record: {error}");
                continue;
            }
        };

        match msg {
            WireMessage::Welcome { mode, server } => {
                shared.mode.send_replace(mode);
                if let Some(name) = &server {
                    shared.state.send_if_modified(|state| {
                        if shared.is_current(id) && state.is_connected() {
                            *state = ConnectionState::Connected {
                                server: name.clone(),
                            };
                            true
                        } else {
                            false
                        }
                    });
                }
                shared.emit(ClientEvent::Welcome { mode, server });
            }
            WireMessage::Ball { number } if number > 0 => shared.emit(ClientEvent::Ball(number)),
            WireMessage::NewGame { mode } => {
                shared.mode.send_replace(mode);
                shared.emit(ClientEvent::NewGame { mode });
            }
            WireMessage::GameReset => shared.emit(ClientEvent::GameReset),
            WireMessage::GameEnd => shared.emit(ClientEvent::GameEnd),
            WireMessage::BingoCalled { player } => shared.emit(ClientEvent::BingoCalled { player }),
            WireMessage::Pong => shared.emit(ClientEvent::Pong),
            WireMessage::ServerClosed => {
                info!("caller ended the session");
                break;
            }
            other => debug!("ignoring unexpected {other}"),
        }
    }

    // Exactly one side owns the disconnect: here, or an explicit disconnect.
    if shared
        .current
        .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        shared.state.send_replace(ConnectionState::Disconnected);
        shared.emit(ClientEvent::Disconnected);
    }
}
