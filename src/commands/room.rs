use crate::commands::config::current_config;
use crate::config::{RoomCallConfig, SignalingMode};
use crate::media::{MediaDevices, NativeMediaDevices};
use crate::peer::PeerBroker;
use crate::session::{
    RoomSession, SessionEvent, SessionPhase, SessionTransports, ToggleOutcome, VideoChatSnapshot,
};
use crate::signaling::{HubConnection, SignalingHub, SignalingTransport, TcpSignalingClient};
use crate::testing::SyntheticMediaDevices;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tauri::command;
use tokio::sync::{broadcast, Mutex, RwLock};

/// Which capture devices a session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaMode {
    #[default]
    Native,
    /// No hardware; for demos and tests
    Synthetic,
}

struct ActiveRoom {
    session: RoomSession,
    events: Mutex<broadcast::Receiver<SessionEvent>>,
}

// Global room state management
lazy_static::lazy_static! {
    static ref ROOMS: RwLock<HashMap<String, ActiveRoom>> = RwLock::new(HashMap::new());
    static ref PEER_BROKER: PeerBroker = PeerBroker::new();
    static ref LOCAL_HUB: RwLock<Option<SignalingHub>> = RwLock::new(None);
}

/// The process-wide hub, with its capacity following the current config
async fn local_hub(capacity: usize) -> SignalingHub {
    let mut hub = LOCAL_HUB.write().await;
    let hub = hub.get_or_insert_with(|| SignalingHub::new(capacity));
    hub.set_capacity(capacity);
    hub.clone()
}

/// Drop a registry entry whose session already ended on its own (for example
/// after a full-room redirect). Returns whether the room is still occupied.
async fn evict_finished(room: &str) -> bool {
    let finished = {
        let mut rooms = ROOMS.write().await;
        let Some(active) = rooms.get(room) else {
            return false;
        };
        match active.session.phase().await {
            SessionPhase::RoomFull | SessionPhase::Closed => rooms.remove(room),
            SessionPhase::Joining | SessionPhase::Joined => return true,
        }
    };
    if let Some(active) = finished {
        log::info!("Clearing finished session for video room {}", room);
        active.session.leave().await;
    }
    false
}

async fn connect_signaling(config: &RoomCallConfig) -> Result<Arc<dyn SignalingTransport>, String> {
    match config.signaling.mode {
        SignalingMode::InProcess => {
            let hub = local_hub(config.room.capacity).await;
            Ok(Arc::new(HubConnection::connect(&hub).await))
        }
        SignalingMode::Tcp => {
            let client = TcpSignalingClient::connect(
                &config.signaling.server_addr,
                config.signaling.connect_timeout(),
            )
            .await
            .map_err(|e| e.to_string())?;
            Ok(Arc::new(client))
        }
    }
}

async fn with_room<T, F, Fut>(room: &str, f: F) -> Result<T, String>
where
    F: FnOnce(RoomSession) -> Fut,
    Fut: std::future::Future<Output = Result<T, String>>,
{
    let session = {
        let rooms = ROOMS.read().await;
        match rooms.get(room) {
            Some(active) => active.session.clone(),
            None => return Err(format!("Not in video room {}", room)),
        }
    };
    f(session).await
}

/// Join a video room: opens devices, signaling and a peer identity
#[command]
pub async fn join_video_room(
    room: String,
    mode: Option<MediaMode>,
) -> Result<VideoChatSnapshot, String> {
    log::info!("Joining video room {}", room);

    if evict_finished(&room).await {
        return Err(format!("Already in video room {}", room));
    }

    let config = current_config()?;
    let devices: Arc<dyn MediaDevices> = match mode.unwrap_or_default() {
        MediaMode::Native => Arc::new(NativeMediaDevices::new()),
        MediaMode::Synthetic => Arc::new(SyntheticMediaDevices::new()),
    };
    let signaling = connect_signaling(&config).await?;
    let peer = match PEER_BROKER.open().await {
        Ok(peer) => Arc::new(peer),
        Err(e) => {
            signaling.disconnect().await;
            return Err(e.to_string());
        }
    };

    let session = RoomSession::join(
        &room,
        config,
        SessionTransports {
            devices,
            peer,
            signaling,
        },
    )
    .await
    .map_err(|e| e.to_string())?;

    let snapshot = session.snapshot().await;
    let mut rooms = ROOMS.write().await;
    if rooms.contains_key(&room) {
        // lost a race with a concurrent join of the same room
        drop(rooms);
        session.leave().await;
        return Err(format!("Already in video room {}", room));
    }
    let events = Mutex::new(session.subscribe());
    rooms.insert(room, ActiveRoom { session, events });
    Ok(snapshot)
}

/// Leave a video room and release everything it holds
#[command]
pub async fn leave_video_room(room: String) -> Result<String, String> {
    log::info!("Leaving video room {}", room);

    let removed = ROOMS.write().await.remove(&room);
    match removed {
        Some(active) => {
            active.session.leave().await;
            Ok(format!("Left video room {}", room))
        }
        None => Err(format!("Not in video room {}", room)),
    }
}

#[command]
pub async fn toggle_camera(room: String) -> Result<ToggleOutcome, String> {
    with_room(&room, |session| async move {
        session.toggle_camera().await.map_err(|e| e.to_string())
    })
    .await
}

#[command]
pub async fn toggle_microphone(room: String) -> Result<ToggleOutcome, String> {
    with_room(&room, |session| async move {
        session.toggle_microphone().await.map_err(|e| e.to_string())
    })
    .await
}

#[command]
pub async fn get_video_chat_state(room: String) -> Result<VideoChatSnapshot, String> {
    with_room(&room, |session| async move { Ok(session.snapshot().await) }).await
}

/// Poll for the next session event (non-blocking)
#[command]
pub async fn poll_video_chat_event(room: String) -> Result<Option<SessionEvent>, String> {
    let rooms = ROOMS.read().await;
    let Some(active) = rooms.get(&room) else {
        return Err(format!("Not in video room {}", room));
    };

    let mut events = active.events.lock().await;
    loop {
        match events.try_recv() {
            Ok(event) => return Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                log::warn!("Room {} event poller skipped {} events", room, skipped);
            }
            Err(broadcast::error::TryRecvError::Empty)
            | Err(broadcast::error::TryRecvError::Closed) => return Ok(None),
        }
    }
}

/// List rooms this process has joined
#[command]
pub async fn list_video_rooms() -> Result<Vec<String>, String> {
    let mut rooms: Vec<String> = ROOMS.read().await.keys().cloned().collect();
    rooms.sort();
    Ok(rooms)
}
