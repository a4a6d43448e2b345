//! Caller-side session server.
//!
//! The server owns a TCP listener for the game channel and a UDP socket for
//! discovery. Every accepted player gets a reader task and a writer task;
//! the writer drains an unbounded FIFO queue so broadcasts never block the
//! caller and each player sees records in the order they were queued. A
//! player that stops reading is dropped once a single write outlasts the
//! configured write timeout.
//!
//! The client registry is the only shared mutable state. It is guarded by a
//! `std::sync::Mutex` that is never held across an `.await`.

use log::{debug, info, warn};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt, BufReader},
    net::{
        TcpListener, TcpStream, UdpSocket,
        tcp::OwnedReadHalf,
    },
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};

use super::{
    discovery,
    errors::{NetError, NetResult},
    messages::{GameEventKind, WireMessage},
    utils::{read_delimited, write_delimited},
};
use crate::{config::NetworkConfig, game::mode::GameMode};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Something the caller should react to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerEvent {
    /// A player claims a win. Claims are self-reported.
    BingoClaimed { player: String, addr: SocketAddr },
    ClientConnected { addr: SocketAddr },
    ClientDisconnected { addr: SocketAddr },
}

/// Connected player count, stamped with the registry generation that
/// produced it.
///
/// Observers only ever see generations increase, so a late notification
/// can't overwrite a newer count.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClientCount {
    pub count: usize,
    pub generation: u64,
}

type ClientId = u64;

struct ClientEntry {
    addr: SocketAddr,
    outbox: mpsc::UnboundedSender<WireMessage>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: ClientId,
    generation: u64,
    clients: HashMap<ClientId, ClientEntry>,
}

impl RegistryInner {
    fn bump(&mut self) -> ClientCount {
        self.generation += 1;
        ClientCount {
            count: self.clients.len(),
            generation: self.generation,
        }
    }
}

/// Tracked player connections plus the observable count.
struct Registry {
    inner: Mutex<RegistryInner>,
    count: watch::Sender<ClientCount>,
}

impl Registry {
    fn new() -> Self {
        let (count, _) = watch::channel(ClientCount::default());
        Self {
            inner: Mutex::new(RegistryInner::default()),
            count,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A panic while holding the lock leaves the map itself consistent.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish outside the lock; stale generations are dropped.
    fn publish(&self, next: ClientCount) {
        self.count.send_if_modified(|current| {
            if next.generation > current.generation {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    fn insert(&self, addr: SocketAddr, outbox: mpsc::UnboundedSender<WireMessage>) -> ClientId {
        let (id, count) = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.clients.insert(
                id,
                ClientEntry {
                    addr,
                    outbox,
                    reader: None,
                    writer: None,
                },
            );
            (id, inner.bump())
        };
        self.publish(count);
        id
    }

    /// Hand the connection's tasks to the registry so `stop` can cancel them.
    ///
    /// If the client already left, the tasks have finished or are about to.
    fn attach_tasks(&self, id: ClientId, reader: JoinHandle<()>, writer: JoinHandle<()>) {
        let mut inner = self.lock();
        if let Some(entry) = inner.clients.get_mut(&id) {
            entry.reader = Some(reader);
            entry.writer = Some(writer);
        }
    }

    /// Returns the removed client's address, or `None` if it was already gone.
    fn remove(&self, id: ClientId) -> Option<SocketAddr> {
        let (entry, count) = {
            let mut inner = self.lock();
            let entry = inner.clients.remove(&id)?;
            (entry, inner.bump())
        };
        self.publish(count);
        Some(entry.addr)
    }

    fn send_to(&self, id: ClientId, msg: WireMessage) -> bool {
        let outbox = self.lock().clients.get(&id).map(|entry| entry.outbox.clone());
        outbox.is_some_and(|outbox| outbox.send(msg).is_ok())
    }

    /// Queue `msg` for every client, returning how many accepted it.
    ///
    /// Senders are copied out under the lock and used outside it. A client
    /// whose queue is closed is dropped from the registry.
    fn broadcast(&self, msg: &WireMessage) -> usize {
        let targets: Vec<(ClientId, mpsc::UnboundedSender<WireMessage>)> = self
            .lock()
            .clients
            .iter()
            .map(|(id, entry)| (*id, entry.outbox.clone()))
            .collect();

        let mut delivered = 0;
        for (id, outbox) in targets {
            if outbox.send(msg.clone()).is_ok() {
                delivered += 1;
            } else if let Some(addr) = self.remove(id) {
                debug!("dropped {addr}: outbound queue closed");
            }
        }
        delivered
    }

    /// Remove every client at once.
    fn drain(&self) -> Vec<ClientEntry> {
        let (entries, count) = {
            let mut inner = self.lock();
            let entries: Vec<ClientEntry> = inner.clients.drain().map(|(_, entry)| entry).collect();
            (entries, inner.bump())
        };
        self.publish(count);
        entries
    }

    fn len(&self) -> usize {
        self.lock().clients.len()
    }
}

struct RunningServer {
    name: String,
    local_addr: SocketAddr,
    discovery_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    discovery_task: JoinHandle<()>,
}

/// Hosts a bingo session for the local network.
///
/// Created stopped; [`SessionServer::start`] binds the sockets and
/// [`SessionServer::stop`] tears everything down. A stopped server can be
/// started again.
pub struct SessionServer {
    /// Ports, bind address and shutdown grace
    config: NetworkConfig,

    /// Connected players
    registry: Arc<Registry>,

    /// Outbound events for the caller
    events: mpsc::UnboundedSender<ServerEvent>,

    /// Mode announced in welcomes and discovery responses
    mode: watch::Sender<GameMode>,

    /// Present while started
    running: Option<RunningServer>,
}

impl SessionServer {
    /// Create a stopped server.
    ///
    /// # Returns
    ///
    /// * `(SessionServer, UnboundedReceiver<ServerEvent>)` - Server and its event stream
    pub fn new(config: NetworkConfig) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (mode, _) = watch::channel(GameMode::default());
        let server = Self {
            config,
            registry: Arc::new(Registry::new()),
            events,
            mode,
            running: None,
        };
        (server, events_rx)
    }

    /// Bind the game listener and the discovery socket, then start serving.
    ///
    /// # Arguments
    ///
    /// * `name` - Name advertised to players
    /// * `mode` - Mode announced until [`Self::set_mode`] changes it
    ///
    /// # Errors
    ///
    /// - [`NetError::AlreadyRunning`] if the server is started
    /// - [`NetError::Bind`] if either socket can't be bound
    pub async fn start(&mut self, name: &str, mode: GameMode) -> NetResult<()> {
        if self.running.is_some() {
            return Err(NetError::AlreadyRunning);
        }

        let game_addr = SocketAddr::new(self.config.bind_ip, self.config.game_port);
        let listener = TcpListener::bind(game_addr)
            .await
            .map_err(|source| NetError::Bind {
                addr: game_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let discovery_bind = SocketAddr::new(self.config.bind_ip, self.config.discovery_port);
        let socket = UdpSocket::bind(discovery_bind)
            .await
            .map_err(|source| NetError::Bind {
                addr: discovery_bind,
                source,
            })?;
        socket.set_broadcast(true)?;
        let discovery_addr = socket.local_addr()?;

        self.mode.send_replace(mode);

        let discovery_task = tokio::spawn(discovery::run_responder(
            socket,
            name.to_string(),
            local_addr.port(),
            self.mode.subscribe(),
        ));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.registry),
            self.events.clone(),
            self.mode.subscribe(),
            name.to_string(),
            self.config.write_timeout,
        ));

        info!(
            "session '{name}' serving {mode}-ball games on {local_addr}, discovery on {discovery_addr}"
        );
        self.running = Some(RunningServer {
            name: name.to_string(),
            local_addr,
            discovery_addr,
            accept_task,
            discovery_task,
        });
        Ok(())
    }

    /// Say goodbye to every player and close all sockets.
    ///
    /// Queued records, including `server_closed`, get the configured grace
    /// period to flush. Calling `stop` on a stopped server does nothing.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        // Both sockets are owned by these tasks and close once they finish.
        running.accept_task.abort();
        running.discovery_task.abort();
        let _ = running.accept_task.await;
        let _ = running.discovery_task.await;

        let entries = self.registry.drain();
        let mut writers = Vec::with_capacity(entries.len());
        for entry in entries {
            let _ = entry.outbox.send(WireMessage::ServerClosed);
            if let Some(reader) = entry.reader {
                reader.abort();
            }
            if let Some(writer) = entry.writer {
                writers.push(writer);
            }
            // Dropping the last sender lets the writer finish after the goodbye.
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        for mut writer in writers {
            if tokio::time::timeout_at(deadline, &mut writer).await.is_err() {
                writer.abort();
            }
        }

        info!("session '{}' stopped", running.name);
    }

    /// Queue a drawn ball for every player.
    ///
    /// # Returns
    ///
    /// * `usize` - Number of players the ball was queued for
    pub fn broadcast_ball(&self, number: u8) -> usize {
        self.broadcast(&WireMessage::Ball { number })
    }

    /// Queue a lifecycle announcement for every player.
    pub fn broadcast_event(&self, kind: GameEventKind) -> usize {
        self.broadcast(&WireMessage::from(kind))
    }

    pub fn broadcast(&self, msg: &WireMessage) -> usize {
        let delivered = self.registry.broadcast(msg);
        debug!("broadcast {msg} to {delivered} player(s)");
        delivered
    }

    /// Change the mode announced to players who join from now on.
    pub fn set_mode(&self, mode: GameMode) {
        self.mode.send_replace(mode);
    }

    pub fn mode(&self) -> GameMode {
        *self.mode.borrow()
    }

    pub fn connected_count(&self) -> usize {
        self.registry.len()
    }

    /// Watch the connected count; see [`ClientCount`].
    pub fn subscribe_count(&self) -> watch::Receiver<ClientCount> {
        self.registry.count.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.running.as_ref().map(|running| running.name.as_str())
    }

    /// Bound game listener address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Bound discovery socket address while running.
    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.discovery_addr)
    }
}

impl Drop for SessionServer {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.accept_task.abort();
            running.discovery_task.abort();
            for entry in self.registry.drain() {
                if let Some(reader) = entry.reader {
                    reader.abort();
                }
                if let Some(writer) = entry.writer {
                    writer.abort();
                }
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<Registry>,
    events: mpsc::UnboundedSender<ServerEvent>,
    mode: watch::Receiver<GameMode>,
    name: String,
    write_timeout: Duration,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let welcome = WireMessage::Welcome {
                    mode: *mode.borrow(),
                    server: Some(name.clone()),
                };
                spawn_client(stream, addr, welcome, write_timeout, &registry, &events);
            }
            Err(error) => {
                warn!("accept failed: {error}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

fn spawn_client(
    stream: TcpStream,
    addr: SocketAddr,
    welcome: WireMessage,
    write_timeout: Duration,
    registry: &Arc<Registry>,
    events: &mpsc::UnboundedSender<ServerEvent>,
) {
    if let Err(error) = stream.set_nodelay(true) {
        debug!("failed to set TCP_NODELAY for {addr}: {error}");
    }
    let (read_half, write_half) = stream.into_split();

    // The welcome is queued before the client is visible to broadcasts.
    let (outbox, inbox) = mpsc::unbounded_channel();
    let _ = outbox.send(welcome);
    let id = registry.insert(addr, outbox);

    info!("player connected from {addr}");
    let _ = events.send(ServerEvent::ClientConnected { addr });

    let writer = tokio::spawn(write_loop(
        id,
        write_half,
        inbox,
        write_timeout,
        Arc::clone(registry),
        events.clone(),
    ));
    let reader = tokio::spawn(read_loop(
        id,
        addr,
        read_half,
        Arc::clone(registry),
        events.clone(),
    ));
    registry.attach_tasks(id, reader, writer);
}

fn disconnect(
    id: ClientId,
    registry: &Registry,
    events: &mpsc::UnboundedSender<ServerEvent>,
    reason: &str,
) {
    if let Some(addr) = registry.remove(id) {
        info!("player {addr} disconnected: {reason}");
        let _ = events.send(ServerEvent::ClientDisconnected { addr });
    }
}

async fn write_loop<W>(
    id: ClientId,
    mut stream: W,
    mut inbox: mpsc::UnboundedReceiver<WireMessage>,
    write_timeout: Duration,
    registry: Arc<Registry>,
    events: mpsc::UnboundedSender<ServerEvent>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = inbox.recv().await {
        let write = write_delimited(&mut stream, &msg);
        let failure = match tokio::time::timeout(write_timeout, write).await {
            Ok(Ok(())) => continue,
            Ok(Err(error)) => format!("write failed: {error}"),
            Err(_) => format!("write stalled for {write_timeout:?}"),
        };
        // Closing the queue makes later broadcasts skip this client.
        inbox.close();
        disconnect(id, &registry, &events, &failure);
        return;
    }
    let _ = stream.shutdown().await;
}

async fn read_loop(
    id: ClientId,
    addr: SocketAddr,
    stream: OwnedReadHalf,
    registry: Arc<Registry>,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let mut reader = BufReader::new(stream);
    let reason = loop {
        let line = match read_delimited(&mut reader).await {
            Ok(Some(line)) => line,
            Ok(None) => break "end of stream".to_string(),
            Err(error) => break format!("read failed: {error}"),
        };
        if line.trim().is_empty() {
            continue;
        }

        match WireMessage::decode(&line) {
            Ok(WireMessage::Bingo { player }) => {
                info!("{player} ({addr}) called bingo");
                registry.broadcast(&WireMessage::BingoCalled {
                    player: player.clone(),
                });
                let _ = events.send(ServerEvent::BingoClaimed { player, addr });
            }
            Ok(WireMessage::Ping) => {
                registry.send_to(id, WireMessage::Pong);
            }
            Ok(other) => debug!("ignoring unexpected {other} from {addr}"),
            Err(error) => debug!("discarding malformed record from {addr}: {error}"),
        }
    };
    disconnect(id, &registry, &events, &reason);
}
