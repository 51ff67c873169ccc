use crate::errors::VideoChatError;
use crate::signaling::protocol::{ClientMessage, ServerEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub type SocketId = u64;

/// Room registry shared by every connected socket
#[derive(Clone)]
pub struct SignalingHub {
    capacity: Arc<AtomicUsize>,
    inner: Arc<RwLock<HubState>>,
}

#[derive(Default)]
struct HubState {
    next_socket: SocketId,
    sockets: HashMap<SocketId, SocketEntry>,
    rooms: HashMap<String, Vec<Member>>,
}

struct SocketEntry {
    outbound: mpsc::UnboundedSender<String>,
    membership: Option<(String, String)>,
}

#[derive(Clone)]
struct Member {
    socket: SocketId,
    peer_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room: String,
    pub peer_ids: Vec<String>,
}

impl HubState {
    fn send(&self, socket: SocketId, event: &ServerEvent) {
        if let Some(entry) = self.sockets.get(&socket) {
            if entry.outbound.send(event.encode()).is_err() {
                log::debug!("Socket {} went away before '{}'", socket, event.event_name());
            }
        }
    }

    /// Remove `socket` from its room and tell whoever is left
    fn leave_room(&mut self, socket: SocketId) {
        let Some((room, peer_id)) = self
            .sockets
            .get_mut(&socket)
            .and_then(|entry| entry.membership.take())
        else {
            return;
        };

        let remaining: Vec<SocketId> = match self.rooms.get_mut(&room) {
            Some(members) => {
                members.retain(|m| m.socket != socket);
                members.iter().map(|m| m.socket).collect()
            }
            None => Vec::new(),
        };
        if remaining.is_empty() {
            self.rooms.remove(&room);
        }

        log::info!("Peer {} left room {} ({} remaining)", peer_id, room, remaining.len());
        let event = ServerEvent::UserDisconnected(peer_id);
        for other in remaining {
            self.send(other, &event);
        }
    }
}

impl SignalingHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: Arc::new(AtomicUsize::new(capacity)),
            inner: Arc::new(RwLock::new(HubState::default())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// Change the limit for later joins. Members already present stay.
    pub fn set_capacity(&self, capacity: usize) {
        let previous = self.capacity.swap(capacity, Ordering::SeqCst);
        if previous != capacity {
            log::info!("Room capacity changed from {} to {}", previous, capacity);
        }
    }

    /// Accept a new socket. Frames for it arrive on the returned receiver,
    /// which ends once the socket is disconnected.
    pub async fn register(&self) -> (SocketId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.write().await;
        let socket = state.next_socket;
        state.next_socket += 1;
        state.sockets.insert(
            socket,
            SocketEntry {
                outbound: tx,
                membership: None,
            },
        );
        log::debug!("Socket {} registered", socket);
        (socket, rx)
    }

    pub async fn handle_frame(&self, socket: SocketId, frame: &str) -> Result<(), VideoChatError> {
        match ClientMessage::decode(frame)? {
            ClientMessage::JoinRoom { room, peer_id } => self.join(socket, &room, &peer_id).await,
        }
    }

    pub async fn join(&self, socket: SocketId, room: &str, peer_id: &str) -> Result<(), VideoChatError> {
        let mut state = self.inner.write().await;

        let current = match state.sockets.get(&socket) {
            Some(entry) => entry.membership.clone(),
            None => {
                return Err(VideoChatError::SignalingError(format!(
                    "Socket {} is not registered",
                    socket
                )))
            }
        };
        match current {
            Some((joined, _)) if joined == room => {
                log::debug!("Socket {} already in room {}", socket, room);
                return Ok(());
            }
            Some(_) => state.leave_room(socket),
            None => {}
        }

        let occupants = state.rooms.get(room).map_or(0, Vec::len);
        if occupants >= self.capacity() {
            log::info!("Room {} is full, refusing peer {}", room, peer_id);
            state.send(socket, &ServerEvent::Full);
            return Ok(());
        }

        let event = ServerEvent::UserConnected(peer_id.to_string());
        let others: Vec<SocketId> = state
            .rooms
            .get(room)
            .map(|members| members.iter().map(|m| m.socket).collect())
            .unwrap_or_default();
        for other in others {
            state.send(other, &event);
        }

        state.rooms.entry(room.to_string()).or_default().push(Member {
            socket,
            peer_id: peer_id.to_string(),
        });
        if let Some(entry) = state.sockets.get_mut(&socket) {
            entry.membership = Some((room.to_string(), peer_id.to_string()));
        }
        log::info!("Peer {} joined room {} ({} present)", peer_id, room, occupants + 1);
        Ok(())
    }

    /// Drop the socket. Safe to call for unknown or already removed sockets.
    pub async fn disconnect(&self, socket: SocketId) {
        let mut state = self.inner.write().await;
        state.leave_room(socket);
        if state.sockets.remove(&socket).is_some() {
            log::debug!("Socket {} disconnected", socket);
        }
    }

    pub async fn room_size(&self, room: &str) -> usize {
        self.inner.read().await.rooms.get(room).map_or(0, Vec::len)
    }

    pub async fn rooms(&self) -> Vec<RoomSummary> {
        let state = self.inner.read().await;
        let mut rooms: Vec<RoomSummary> = state
            .rooms
            .iter()
            .map(|(room, members)| RoomSummary {
                room: room.clone(),
                peer_ids: members.iter().map(|m| m.peer_id.clone()).collect(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.cmp(&b.room));
        rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(ServerEvent::decode(&frame).unwrap());
        }
        events
    }

    #[tokio::test]
    async fn existing_members_hear_about_newcomers() {
        let hub = SignalingHub::new(4);
        let (a, mut rx_a) = hub.register().await;
        let (b, mut rx_b) = hub.register().await;

        hub.join(a, "room-1", "alice").await.unwrap();
        hub.join(b, "room-1", "bob").await.unwrap();

        assert_eq!(drain(&mut rx_a), vec![ServerEvent::UserConnected("bob".into())]);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(hub.room_size("room-1").await, 2);
    }

    #[tokio::test]
    async fn full_room_refuses_only_the_newcomer() {
        let hub = SignalingHub::new(2);
        let (a, mut rx_a) = hub.register().await;
        let (b, _rx_b) = hub.register().await;
        let (c, mut rx_c) = hub.register().await;

        hub.join(a, "r", "a").await.unwrap();
        hub.join(b, "r", "b").await.unwrap();
        drain(&mut rx_a);

        hub.join(c, "r", "c").await.unwrap();
        assert_eq!(drain(&mut rx_c), vec![ServerEvent::Full]);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(hub.room_size("r").await, 2);
    }

    #[tokio::test]
    async fn rejoining_same_room_is_a_no_op() {
        let hub = SignalingHub::new(4);
        let (a, _rx_a) = hub.register().await;
        let (b, mut rx_b) = hub.register().await;
        hub.join(b, "r", "b").await.unwrap();
        hub.join(a, "r", "a").await.unwrap();
        hub.join(a, "r", "a").await.unwrap();

        assert_eq!(drain(&mut rx_b), vec![ServerEvent::UserConnected("a".into())]);
        assert_eq!(hub.room_size("r").await, 2);
    }

    #[tokio::test]
    async fn switching_rooms_leaves_the_old_one() {
        let hub = SignalingHub::new(4);
        let (a, _rx_a) = hub.register().await;
        let (b, mut rx_b) = hub.register().await;
        hub.join(b, "one", "b").await.unwrap();
        hub.join(a, "one", "a").await.unwrap();
        hub.join(a, "two", "a").await.unwrap();

        assert_eq!(
            drain(&mut rx_b),
            vec![
                ServerEvent::UserConnected("a".into()),
                ServerEvent::UserDisconnected("a".into())
            ]
        );
        assert_eq!(hub.room_size("one").await, 1);
        assert_eq!(hub.room_size("two").await, 1);
    }

    #[tokio::test]
    async fn disconnect_notifies_and_drops_empty_rooms() {
        let hub = SignalingHub::new(4);
        let (a, mut rx_a) = hub.register().await;
        let (b, _rx_b) = hub.register().await;
        hub.join(a, "r", "a").await.unwrap();
        hub.join(b, "r", "b").await.unwrap();
        drain(&mut rx_a);

        hub.disconnect(b).await;
        assert_eq!(drain(&mut rx_a), vec![ServerEvent::UserDisconnected("b".into())]);

        hub.disconnect(a).await;
        hub.disconnect(a).await;
        assert!(hub.rooms().await.is_empty());
        // outbound channel closes with the socket
        assert!(rx_a.recv().await.is_none());
    }

    #[tokio::test]
    async fn frames_are_decoded_before_dispatch() {
        let hub = SignalingHub::new(4);
        let (a, _rx) = hub.register().await;

        assert!(hub.handle_frame(a, r#"["join-room","9","x"]"#).await.is_ok());
        assert_eq!(
            hub.rooms().await,
            vec![RoomSummary {
                room: "9".into(),
                peer_ids: vec!["x".into()]
            }]
        );
        assert!(matches!(
            hub.handle_frame(a, "nonsense").await,
            Err(VideoChatError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn capacity_changes_apply_to_later_joins() {
        let hub = SignalingHub::new(4);
        let (a, _rx_a) = hub.register().await;
        let (b, _rx_b) = hub.register().await;
        let (c, mut rx_c) = hub.register().await;
        hub.join(a, "r", "a").await.unwrap();
        hub.join(b, "r", "b").await.unwrap();

        hub.clone().set_capacity(2);
        hub.join(c, "r", "c").await.unwrap();
        assert_eq!(drain(&mut rx_c), vec![ServerEvent::Full]);

        hub.set_capacity(3);
        hub.join(c, "r", "c").await.unwrap();
        assert_eq!(hub.room_size("r").await, 3);
    }

    #[tokio::test]
    async fn unknown_socket_cannot_join() {
        let hub = SignalingHub::new(4);
        assert!(hub.join(99, "r", "p").await.is_err());
    }
}
