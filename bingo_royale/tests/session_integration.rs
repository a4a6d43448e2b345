//! Integration tests for caller/player sessions over loopback.
//!
//! Tests bind ephemeral ports, or fixed ports reserved from the OS first,
//! so they can run in parallel.

use bingo_royale::{
    config::NetworkConfig,
    game::mode::GameMode,
    net::{
        client::{ClientEvent, ConnectionState, SessionClient},
        messages::{GameEventKind, WireMessage},
        server::{ServerEvent, SessionServer},
        utils::{MAX_RECORD_SIZE, read_delimited, write_delimited},
    },
};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{
        TcpListener, TcpStream, UdpSocket,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};

const WAIT: Duration = Duration::from_secs(3);

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

async fn start_server(mode: GameMode) -> (SessionServer, mpsc::UnboundedReceiver<ServerEvent>) {
    let (mut server, events) = SessionServer::new(NetworkConfig::loopback());
    server.start("Hall", mode).await.unwrap();
    (server, events)
}

fn client_config(server: &SessionServer) -> NetworkConfig {
    NetworkConfig {
        discovery_port: server.discovery_addr().unwrap().port(),
        ..NetworkConfig::loopback()
    }
}

/// Connect a client straight to `server` and consume its welcome.
async fn join(server: &SessionServer) -> (SessionClient, mpsc::UnboundedReceiver<ClientEvent>) {
    let (mut client, mut events) = SessionClient::new(client_config(server));
    let port = server.local_addr().unwrap().port();
    client.connect_by_address("127.0.0.1", port).await.unwrap();
    assert!(matches!(next(&mut events).await, ClientEvent::Welcome { .. }));
    (client, events)
}

/// Raw TCP peer speaking the wire protocol by hand.
async fn raw_peer(addr: SocketAddr) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, write) = stream.into_split();
    (BufReader::new(read), write)
}

async fn read_message<R>(reader: &mut R) -> Option<WireMessage>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let line = tokio::time::timeout(WAIT, read_delimited(reader))
        .await
        .expect("timed out waiting for a record")
        .ok()??;
    Some(WireMessage::decode(&line).unwrap())
}

async fn wait_for_count(server: &SessionServer, count: usize) {
    let mut rx = server.subscribe_count();
    tokio::time::timeout(WAIT, rx.wait_for(|current| current.count == count))
        .await
        .expect("timed out waiting for player count")
        .unwrap();
}

// === Discovery and delivery ===

#[tokio::test]
async fn discover_connect_and_receive_ball() {
    let (server, _events) = start_server(GameMode::Classic75).await;

    let (mut client, mut events) = SessionClient::new(client_config(&server));
    let found = client.discover_and_connect().await.unwrap().unwrap();
    assert_eq!(found.name, "Hall");
    assert_eq!(found.mode, GameMode::Classic75);
    assert_eq!(found.addr.port(), server.local_addr().unwrap().port());

    assert_eq!(
        next(&mut events).await,
        ClientEvent::Welcome {
            mode: GameMode::Classic75,
            server: Some("Hall".to_string())
        }
    );
    assert_eq!(
        client.state(),
        ConnectionState::Connected {
            server: "Hall".to_string()
        }
    );

    assert_eq!(server.broadcast_ball(42), 1);
    assert_eq!(next(&mut events).await, ClientEvent::Ball(42));
}

#[tokio::test]
async fn records_arrive_in_order() {
    let (server, _events) = start_server(GameMode::European90).await;
    let (_client, mut events) = join(&server).await;

    server.broadcast_event(GameEventKind::NewGame(GameMode::European90));
    for number in 1..=20 {
        server.broadcast_ball(number);
    }
    server.broadcast_event(GameEventKind::End);

    assert_eq!(
        next(&mut events).await,
        ClientEvent::NewGame {
            mode: GameMode::European90
        }
    );
    for number in 1..=20 {
        assert_eq!(next(&mut events).await, ClientEvent::Ball(number));
    }
    assert_eq!(next(&mut events).await, ClientEvent::GameEnd);
}

#[tokio::test]
async fn mode_change_is_announced_to_new_players() {
    let (server, _events) = start_server(GameMode::Classic75).await;
    server.set_mode(GameMode::European90);

    let (mut client, mut events) = SessionClient::new(client_config(&server));
    let found = client.discover_and_connect().await.unwrap().unwrap();
    assert_eq!(found.mode, GameMode::European90);
    assert_eq!(
        next(&mut events).await,
        ClientEvent::Welcome {
            mode: GameMode::European90,
            server: Some("Hall".to_string())
        }
    );
    assert_eq!(client.mode(), GameMode::European90);
}

// === Win claims and liveness ===

#[tokio::test]
async fn win_claim_is_relayed_to_everyone() {
    let (server, mut server_events) = start_server(GameMode::Classic75).await;
    let (mut ada, mut ada_events) = join(&server).await;
    let (_bob, mut bob_events) = join(&server).await;
    wait_for_count(&server, 2).await;

    ada.send_win_claim("Ada").await.unwrap();

    let claim = loop {
        if let ServerEvent::BingoClaimed { player, .. } = next(&mut server_events).await {
            break player;
        }
    };
    assert_eq!(claim, "Ada");

    let relayed = ClientEvent::BingoCalled {
        player: "Ada".to_string(),
    };
    assert_eq!(next(&mut ada_events).await, relayed);
    assert_eq!(next(&mut bob_events).await, relayed);
}

#[tokio::test]
async fn ping_gets_pong() {
    let (server, _events) = start_server(GameMode::Classic75).await;
    let (mut client, mut events) = join(&server).await;

    client.send_ping().await.unwrap();
    assert_eq!(next(&mut events).await, ClientEvent::Pong);
}

// === Disconnects ===

#[tokio::test]
async fn abrupt_close_fires_one_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (mut client, mut events) = SessionClient::new(NetworkConfig::loopback());
    let mut state = client.subscribe_state();
    client.connect_by_address("127.0.0.1", port).await.unwrap();
    assert!(client.state().is_connected());

    let (stream, _) = listener.accept().await.unwrap();
    drop(stream);

    assert_eq!(next(&mut events).await, ClientEvent::Disconnected);
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Disconnected))
        .await
        .unwrap()
        .unwrap();

    // Nothing else follows, not even after an explicit disconnect.
    client.disconnect().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn stop_closes_players_and_is_idempotent() {
    let (mut server, _events) = start_server(GameMode::Classic75).await;
    let (mut client, mut events) = join(&server).await;
    wait_for_count(&server, 1).await;

    server.stop().await;
    assert_eq!(server.connected_count(), 0);
    assert!(!server.is_running());
    assert_eq!(server.subscribe_count().borrow().count, 0);

    assert_eq!(next(&mut events).await, ClientEvent::Disconnected);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(
        client.send_win_claim("Ada").await,
        Err(bingo_royale::NetError::NotConnected)
    ));

    server.stop().await;
    assert!(!server.is_running());
}

#[tokio::test]
async fn server_can_restart_after_stop() {
    let (mut server, _events) = start_server(GameMode::Classic75).await;
    server.stop().await;
    server.start("Hall", GameMode::European90).await.unwrap();

    let (client, _events) = join(&server).await;
    assert_eq!(client.mode(), GameMode::European90);
    assert_eq!(server.mode(), GameMode::European90);
    server.stop().await;
}

#[tokio::test]
async fn server_restarts_on_fixed_ports() {
    // Reserve a free port pair, then hand it to the server.
    let game_port = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let discovery_port = UdpSocket::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = NetworkConfig {
        game_port,
        discovery_port,
        ..NetworkConfig::loopback()
    };
    let (mut server, _events) = SessionServer::new(config);

    for round in 0..20 {
        server
            .start("Hall", GameMode::Classic75)
            .await
            .unwrap_or_else(|e| panic!("restart {round} failed: {e}"));
        assert_eq!(server.local_addr().unwrap().port(), game_port);
        assert_eq!(server.discovery_addr().unwrap().port(), discovery_port);

        // A player arriving right before stop must not outlive it.
        let _peer = TcpStream::connect(("127.0.0.1", game_port)).await.unwrap();
        server.stop().await;
        assert_eq!(server.connected_count(), 0);
    }

    server.start("Hall", GameMode::European90).await.unwrap();
    let (client, _events) = join(&server).await;
    assert_eq!(client.mode(), GameMode::European90);
    server.stop().await;
}

#[tokio::test]
async fn broadcast_survives_a_failed_player() {
    let (server, _events) = start_server(GameMode::Classic75).await;
    let (_ada, mut ada_events) = join(&server).await;
    let (_bob, mut bob_events) = join(&server).await;
    let (mut reader, writer) = raw_peer(server.local_addr().unwrap()).await;
    assert!(read_message(&mut reader).await.is_some());
    wait_for_count(&server, 3).await;

    drop(reader);
    drop(writer);
    server.broadcast_ball(42);
    wait_for_count(&server, 2).await;

    assert_eq!(server.broadcast_ball(43), 2);
    for events in [&mut ada_events, &mut bob_events] {
        assert_eq!(next(events).await, ClientEvent::Ball(42));
        assert_eq!(next(events).await, ClientEvent::Ball(43));
    }
    assert_eq!(server.connected_count(), 2);
}

#[tokio::test]
async fn player_leaving_updates_count() {
    let (server, mut server_events) = start_server(GameMode::Classic75).await;
    let (mut client, _events) = join(&server).await;
    wait_for_count(&server, 1).await;
    assert!(matches!(
        next(&mut server_events).await,
        ServerEvent::ClientConnected { .. }
    ));

    client.disconnect().await;
    wait_for_count(&server, 0).await;
    assert!(matches!(
        next(&mut server_events).await,
        ServerEvent::ClientDisconnected { .. }
    ));
    assert_eq!(server.broadcast_ball(7), 0);
}

// === Malformed input ===

#[tokio::test]
async fn server_ignores_malformed_records() {
    let (server, _events) = start_server(GameMode::Classic75).await;
    let (mut reader, mut writer) = raw_peer(server.local_addr().unwrap()).await;

    assert!(matches!(
        read_message(&mut reader).await,
        Some(WireMessage::Welcome { .. })
    ));

    writer.write_all(b"this is not json\n").await.unwrap();
    writer.write_all(&[0xff, 0xfe, b'\n']).await.unwrap();
    writer.write_all(b"{\"type\":\"teleport\"}\n").await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    write_delimited(&mut writer, &WireMessage::Ping).await.unwrap();

    assert_eq!(read_message(&mut reader).await, Some(WireMessage::Pong));
    assert_eq!(server.connected_count(), 1);
}

#[tokio::test]
async fn server_drops_player_sending_oversized_record() {
    let (server, mut server_events) = start_server(GameMode::Classic75).await;
    let (mut reader, mut writer) = raw_peer(server.local_addr().unwrap()).await;
    assert!(read_message(&mut reader).await.is_some());
    wait_for_count(&server, 1).await;

    let mut payload = vec![b'x'; MAX_RECORD_SIZE * 2];
    payload.push(b'\n');
    writer.write_all(&payload).await.unwrap();

    wait_for_count(&server, 0).await;
    let disconnected = loop {
        if let ServerEvent::ClientDisconnected { addr } = next(&mut server_events).await {
            break addr;
        }
    };
    assert_eq!(disconnected.ip().to_string(), "127.0.0.1");
}

#[tokio::test]
async fn client_ignores_malformed_records() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (mut client, mut events) = SessionClient::new(NetworkConfig::loopback());
    client.connect_by_address("127.0.0.1", port).await.unwrap();
    let (mut stream, _) = listener.accept().await.unwrap();

    stream.write_all(b"garbage\n{\"type\":\"ball\"}\n").await.unwrap();
    stream.write_all(&[0xc3, 0x28, b'\n']).await.unwrap();
    write_delimited(&mut stream, &WireMessage::Ball { number: 17 })
        .await
        .unwrap();

    assert_eq!(next(&mut events).await, ClientEvent::Ball(17));
    assert!(client.is_connected());
}

#[tokio::test]
async fn server_closed_message_disconnects_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (mut client, mut events) = SessionClient::new(NetworkConfig::loopback());
    client.connect_by_address("127.0.0.1", port).await.unwrap();
    let (mut stream, _) = listener.accept().await.unwrap();

    write_delimited(&mut stream, &WireMessage::ServerClosed)
        .await
        .unwrap();

    assert_eq!(next(&mut events).await, ClientEvent::Disconnected);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    // The socket stays open on our side; the client still won't report twice.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());
}
