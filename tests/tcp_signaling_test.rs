//! Signaling over the TCP server, from raw frames up to full room sessions

use roomcall::config::RoomCallConfig;
use roomcall::peer::PeerBroker;
use roomcall::session::{RoomSession, SessionTransports};
use roomcall::signaling::{
    ClientMessage, ServerEvent, SignalingHub, SignalingServer, SignalingTransport,
    TcpSignalingClient, MAX_FRAME_LEN,
};
use roomcall::testing::SyntheticMediaDevices;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(capacity: usize) -> (String, SignalingHub) {
    let hub = SignalingHub::new(capacity);
    let server = SignalingServer::bind("127.0.0.1:0", hub.clone()).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run());
    (addr, hub)
}

async fn wait_for_size(hub: &SignalingHub, room: &str, size: usize) {
    let reached = tokio::time::timeout(TIMEOUT, async {
        while hub.room_size(room).await != size {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "room {} never reached {} members", room, size);
}

async fn next(client: &TcpSignalingClient) -> Option<ServerEvent> {
    tokio::time::timeout(TIMEOUT, client.next_event())
        .await
        .expect("no signaling event in time")
}

fn join(room: &str, peer_id: &str) -> ClientMessage {
    ClientMessage::JoinRoom {
        room: room.to_string(),
        peer_id: peer_id.to_string(),
    }
}

#[tokio::test]
async fn test_presence_over_tcp() {
    let (addr, hub) = start_server(2).await;
    let a = TcpSignalingClient::connect(&addr, TIMEOUT).await.unwrap();
    let b = TcpSignalingClient::connect(&addr, TIMEOUT).await.unwrap();
    let c = TcpSignalingClient::connect(&addr, TIMEOUT).await.unwrap();

    a.emit(join("r", "peer-a")).await.unwrap();
    wait_for_size(&hub, "r", 1).await;
    b.emit(join("r", "peer-b")).await.unwrap();
    assert_eq!(next(&a).await, Some(ServerEvent::UserConnected("peer-b".to_string())));

    c.emit(join("r", "peer-c")).await.unwrap();
    assert_eq!(next(&c).await, Some(ServerEvent::Full));
    assert_eq!(hub.room_size("r").await, 2);

    b.disconnect().await;
    b.disconnect().await;
    assert!(b.emit(join("r", "peer-b")).await.is_err());
    assert_eq!(next(&a).await, Some(ServerEvent::UserDisconnected("peer-b".to_string())));
    wait_for_size(&hub, "r", 1).await;
}

#[tokio::test]
async fn test_bad_frames_are_ignored() {
    let (addr, hub) = start_server(4).await;
    let mut raw = TcpStream::connect(&addr).await.unwrap();
    raw.write_all(b"not json\n\n[\"unknown-event\"]\n").await.unwrap();
    raw.write_all(b"[\"join-room\",\"r\",\"raw\"]\n").await.unwrap();
    raw.flush().await.unwrap();

    wait_for_size(&hub, "r", 1).await;

    drop(raw);
    wait_for_size(&hub, "r", 0).await;
    assert!(hub.rooms().await.is_empty());
}

#[tokio::test]
async fn test_oversized_frame_drops_the_connection() {
    let (addr, hub) = start_server(4).await;
    let mut raw = TcpStream::connect(&addr).await.unwrap();
    raw.write_all(b"[\"join-room\",\"r\",\"chatty\"]\n").await.unwrap();
    wait_for_size(&hub, "r", 1).await;

    // no newline, so the server can never finish the frame
    let flood = vec![b'x'; MAX_FRAME_LEN + 1];
    let _ = raw.write_all(&flood).await;
    let _ = raw.flush().await;

    wait_for_size(&hub, "r", 0).await;
    assert!(hub.rooms().await.is_empty());

    // a well-behaved client is unaffected
    let ok = TcpSignalingClient::connect(&addr, TIMEOUT).await.unwrap();
    ok.emit(join("r", "quiet")).await.unwrap();
    wait_for_size(&hub, "r", 1).await;
}

#[tokio::test]
async fn test_client_gives_up_on_oversized_frame() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut frame = b"[\"user-connected\",\"".to_vec();
        frame.extend(vec![b'a'; MAX_FRAME_LEN]);
        frame.extend_from_slice(b"\"]\n");
        let _ = socket.write_all(&frame).await;
        socket
    });

    let client = TcpSignalingClient::connect(&addr, TIMEOUT).await.unwrap();
    assert_eq!(next(&client).await, None);
    let _socket = server.await.unwrap();
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let result = TcpSignalingClient::connect(&addr, Duration::from_millis(500)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_sessions_meet_through_tcp_server() {
    let (addr, hub) = start_server(4).await;
    let broker = PeerBroker::new();

    let mut sessions = Vec::new();
    for _ in 0..2 {
        let transports = SessionTransports {
            devices: Arc::new(SyntheticMediaDevices::new()),
            peer: Arc::new(broker.open().await.unwrap()),
            signaling: Arc::new(TcpSignalingClient::connect(&addr, TIMEOUT).await.unwrap()),
        };
        let session = RoomSession::join("tcp-room", RoomCallConfig::default(), transports)
            .await
            .unwrap();
        sessions.push(session);
        wait_for_size(&hub, "tcp-room", sessions.len()).await;
    }

    let (a, b) = (&sessions[0], &sessions[1]);
    let connected = tokio::time::timeout(TIMEOUT, async {
        loop {
            if a.connected_peers().await == vec![b.peer_id().to_string()]
                && b.connected_peers().await == vec![a.peer_id().to_string()]
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(connected.is_ok());

    b.leave().await;
    wait_for_size(&hub, "tcp-room", 1).await;
    let dropped = tokio::time::timeout(TIMEOUT, async {
        while !a.connected_peers().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(dropped.is_ok());
    a.leave().await;
}
