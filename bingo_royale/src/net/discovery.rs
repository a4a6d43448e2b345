//! UDP discovery of callers on the local network.
//!
//! A player broadcasts [`DISCOVER_REQUEST`] to the discovery port. Every
//! caller that hears it answers the sender directly with
//! `BINGO_SERVER:<name>:<tcp port>:<mode>`. Discovery is advisory; a player
//! that already knows the caller's address can connect straight away.

use log::{debug, info, warn};
use std::{
    collections::HashSet,
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};
use tokio::{net::UdpSocket, sync::watch, time::Instant};

use crate::{config::NetworkConfig, game::mode::GameMode};

/// Datagram a player broadcasts to find callers.
pub const DISCOVER_REQUEST: &str = "BINGO_DISCOVER";

/// First field of every discovery response.
pub const RESPONSE_PREFIX: &str = "BINGO_SERVER";

const MAX_DATAGRAM_SIZE: usize = 512;

/// A caller found through discovery.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ServerInfo {
    pub name: String,
    /// Responder IP combined with the advertised TCP port.
    pub addr: SocketAddr,
    pub mode: GameMode,
}

/// Build the response a caller sends back.
///
/// Colons in `name` would shift the positional fields, so they are replaced.
pub fn format_response(name: &str, game_port: u16, mode: GameMode) -> String {
    let name = name.replace([':', '\n', '\r'], "-");
    format!("{RESPONSE_PREFIX}:{name}:{game_port}:{mode}")
}

/// Parse a response received from `source`.
///
/// Fewer than three fields, a foreign prefix, or an unparseable port discard
/// the response. A missing or unknown mode falls back to the default mode.
pub fn parse_response(payload: &str, source: IpAddr) -> Option<ServerInfo> {
    let parts: Vec<&str> = payload.trim().split(':').collect();
    if parts.len() < 3 || parts[0] != RESPONSE_PREFIX {
        return None;
    }

    let port = parts[2].parse::<u16>().ok()?;
    let mode = parts
        .get(3)
        .and_then(|mode| mode.parse::<GameMode>().ok())
        .unwrap_or_default();

    Some(ServerInfo {
        name: parts[1].to_string(),
        addr: SocketAddr::new(source, port),
        mode,
    })
}

/// Answer discovery requests until the task is aborted.
///
/// The advertised mode is read from `mode` on every request so a caller that
/// switches games is announced correctly.
pub async fn run_responder(
    socket: UdpSocket,
    name: String,
    game_port: u16,
    mode: watch::Receiver<GameMode>,
) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    loop {
        let (n, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(error) => {
                // Transient on some platforms (e.g. ICMP resets); keep serving.
                debug!("discovery receive failed: {error}");
                continue;
            }
        };

        let request = String::from_utf8_lossy(&buf[..n]);
        if request.trim() != DISCOVER_REQUEST {
            debug!("ignoring {n}-byte datagram from {peer}");
            continue;
        }

        let response = format_response(&name, game_port, *mode.borrow());
        match socket.send_to(response.as_bytes(), peer).await {
            Ok(_) => debug!("answered discovery from {peer}"),
            Err(error) => warn!("failed to answer discovery from {peer}: {error}"),
        }
    }
}

/// Broadcast a discovery request and collect responses until the timeout.
///
/// Responses are deduplicated by responder address and returned in arrival
/// order. An empty result means no caller answered.
///
/// # Errors
///
/// Returns an error if the UDP socket can't be opened or the request can't
/// be sent.
pub async fn discover(config: &NetworkConfig) -> io::Result<Vec<ServerInfo>> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;

    let target = SocketAddr::new(config.broadcast_addr, config.discovery_port);
    socket.send_to(DISCOVER_REQUEST.as_bytes(), target).await?;
    debug!("sent discovery request to {target}");

    let deadline = Instant::now() + config.discovery_timeout;
    let mut seen = HashSet::new();
    let mut servers = Vec::new();
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (n, peer) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(Ok(received)) => received,
            Ok(Err(error)) => {
                debug!("discovery receive failed: {error}");
                continue;
            }
            Err(_) => break,
        };

        let payload = String::from_utf8_lossy(&buf[..n]);
        match parse_response(&payload, peer.ip()) {
            Some(server) if seen.insert(server.addr) => {
                info!(
                    "found caller {} at {} ({}-ball)",
                    server.name, server.addr, server.mode
                );
                servers.push(server);
            }
            Some(_) => {}
            None => debug!("discarding malformed discovery response from {peer}"),
        }
    }

    Ok(servers)
}

/// Best guess at this host's LAN address, for display.
///
/// Connecting a UDP socket sends nothing; it only selects the outbound
/// interface.
pub fn local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
