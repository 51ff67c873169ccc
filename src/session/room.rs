use crate::config::RoomCallConfig;
use crate::errors::VideoChatError;
use crate::media::{MediaConstraints, MediaDevices, MediaStream};
use crate::peer::{CallEvent, MediaCall, PeerTransport};
use crate::session::state::{
    SessionEvent, SessionPhase, SessionState, ToggleOutcome, VideoChatSnapshot,
    ROOM_FULL_MESSAGE, WAIT_NOTICE,
};
use crate::signaling::{ClientMessage, ServerEvent, SignalingTransport};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

/// The collaborators a session orchestrates
pub struct SessionTransports {
    pub devices: Arc<dyn MediaDevices>,
    pub peer: Arc<dyn PeerTransport>,
    pub signaling: Arc<dyn SignalingTransport>,
}

#[derive(Debug, Clone, Copy)]
enum MediaToggle {
    Camera,
    Microphone,
}

type CallUpdate = (Arc<MediaCall>, CallEvent);

/// A participant's membership in one room
#[derive(Clone)]
pub struct RoomSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    room: String,
    config: RoomCallConfig,
    devices: Arc<dyn MediaDevices>,
    peer: Arc<dyn PeerTransport>,
    signaling: Arc<dyn SignalingTransport>,
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    call_updates: mpsc::UnboundedSender<CallUpdate>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    helpers: Mutex<Vec<JoinHandle<()>>>,
}

impl RoomSession {
    /// Enter `room`: acquire camera and microphone, announce our peer id and
    /// start reacting to presence and call events.
    pub async fn join(
        room: &str,
        config: RoomCallConfig,
        transports: SessionTransports,
    ) -> Result<Self, VideoChatError> {
        let SessionTransports {
            devices,
            peer,
            signaling,
        } = transports;

        if room.trim().is_empty() {
            peer.destroy().await;
            signaling.disconnect().await;
            return Err(VideoChatError::SessionError("Room id must not be empty".to_string()));
        }

        let constraints = MediaConstraints::initial(config.media.video_size());
        let stream = match devices.get_user_media(&constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Could not acquire local media for room {}: {}", room, e);
                peer.destroy().await;
                signaling.disconnect().await;
                return Err(e);
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (call_updates, call_rx) = mpsc::unbounded_channel();

        let mut state = SessionState::new();
        state.my_id = Some(peer.id().to_string());
        state.local_stream = Some(stream);
        state.video_on = true;
        state.mic_on = true;

        let inner = Arc::new(SessionInner {
            room: room.to_string(),
            config,
            devices,
            peer,
            signaling,
            state: RwLock::new(state),
            events,
            call_updates,
            event_loop: Mutex::new(None),
            helpers: Mutex::new(Vec::new()),
        });

        let join = ClientMessage::JoinRoom {
            room: inner.room.clone(),
            peer_id: inner.peer.id().to_string(),
        };
        if let Err(e) = inner.signaling.emit(join).await {
            log::warn!("Failed to announce ourselves in room {}: {}", room, e);
            inner.shutdown(SessionPhase::Closed).await;
            return Err(e);
        }

        inner.state.write().await.phase = SessionPhase::Joined;
        log::info!("Joined room {} as {}", inner.room, inner.peer.id());
        inner.publish(SessionEvent::Joined {
            peer_id: inner.peer.id().to_string(),
        });

        let handle = tokio::spawn(Arc::clone(&inner).run(call_rx));
        *inner.event_loop.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Ok(Self { inner })
    }

    pub fn room(&self) -> &str {
        &self.inner.room
    }

    pub fn peer_id(&self) -> &str {
        self.inner.peer.id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> VideoChatSnapshot {
        self.inner.state.read().await.snapshot(&self.inner.room)
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.state.read().await.phase
    }

    /// Ids of peers we currently receive media from, in id order
    pub async fn connected_peers(&self) -> Vec<String> {
        self.inner.state.read().await.peers.keys().cloned().collect()
    }

    pub async fn toggle_camera(&self) -> Result<ToggleOutcome, VideoChatError> {
        Arc::clone(&self.inner).toggle(MediaToggle::Camera).await
    }

    pub async fn toggle_microphone(&self) -> Result<ToggleOutcome, VideoChatError> {
        Arc::clone(&self.inner).toggle(MediaToggle::Microphone).await
    }

    /// Hang up every call and release devices, identity and signaling
    pub async fn leave(&self) {
        self.inner.abort_tasks().await;
        self.inner.shutdown(SessionPhase::Closed).await;
    }
}

impl SessionInner {
    fn publish(&self, event: SessionEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    fn keep(&self, handle: JoinHandle<()>) {
        let mut helpers = self.helpers.lock().unwrap_or_else(|e| e.into_inner());
        helpers.retain(|h| !h.is_finished());
        helpers.push(handle);
    }

    /// Cancel the event loop and call watchers and wait until they are gone,
    /// so nothing holds the peer or signaling receivers afterwards.
    async fn abort_tasks(&self) {
        let mut handles: Vec<JoinHandle<()>> = self
            .event_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .into_iter()
            .collect();
        handles.extend(self.helpers.lock().unwrap_or_else(|e| e.into_inner()).drain(..));

        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            // cancelled or already finished
            let _ = handle.await;
        }
    }

    async fn run(self: Arc<Self>, mut call_rx: mpsc::UnboundedReceiver<CallUpdate>) {
        let mut signaling_open = true;
        let mut peer_open = true;

        loop {
            tokio::select! {
                event = self.signaling.next_event(), if signaling_open => match event {
                    Some(ServerEvent::UserConnected(peer_id)) => self.on_user_connected(peer_id).await,
                    Some(ServerEvent::UserDisconnected(peer_id)) => {
                        self.on_user_disconnected(&peer_id).await
                    }
                    Some(ServerEvent::Full) => {
                        self.on_room_full().await;
                        return;
                    }
                    None => {
                        log::info!("Signaling for room {} closed", self.room);
                        signaling_open = false;
                    }
                },
                call = self.peer.next_incoming(), if peer_open => match call {
                    Some(call) => self.on_incoming_call(call).await,
                    None => {
                        log::info!("Peer {} stopped accepting calls", self.peer.id());
                        peer_open = false;
                    }
                },
                Some((call, event)) = call_rx.recv() => self.on_call_event(call, event).await,
            }
        }
    }

    async fn on_incoming_call(self: &Arc<Self>, call: Arc<MediaCall>) {
        log::info!("Answering call from {}", call.remote_peer());
        let local = self.state.read().await.local_stream.clone();
        match call.answer(local) {
            Ok(()) => self.watch(call),
            Err(e) => log::warn!("Could not answer call from {}: {}", call.remote_peer(), e),
        }
    }

    async fn on_user_connected(self: &Arc<Self>, peer_id: String) {
        log::info!("User {} connected to room {}", peer_id, self.room);
        if peer_id == self.peer.id() {
            return;
        }
        let Some(local) = self.state.read().await.local_stream.clone() else {
            log::debug!("No local media, not calling {}", peer_id);
            return;
        };
        self.place_call(&peer_id, local).await;
    }

    async fn on_user_disconnected(&self, peer_id: &str) {
        log::info!("User {} disconnected from room {}", peer_id, self.room);
        let removed = self.state.write().await.peers.remove(peer_id);
        if let Some(call) = removed {
            call.close();
            self.publish(SessionEvent::PeerLeft {
                peer_id: peer_id.to_string(),
            });
        }
    }

    async fn on_call_event(&self, call: Arc<MediaCall>, event: CallEvent) {
        let peer_id = call.remote_peer().to_string();
        match event {
            CallEvent::Stream(_) => {
                let mut state = self.state.write().await;
                let newer = state.peers.get(&peer_id).filter(|&stored| {
                    !Arc::ptr_eq(stored, &call)
                        && stored.is_open()
                        && stored.generation() > call.generation()
                });
                if let Some(stored) = newer {
                    // both ends settle on the newest call of a crossed pair
                    log::debug!(
                        "Call {} with {} is older than call {}, hanging up",
                        call.id(),
                        peer_id,
                        stored.id()
                    );
                    drop(state);
                    call.close();
                    return;
                }

                let replaced = state.peers.insert(peer_id.clone(), Arc::clone(&call));
                drop(state);
                if let Some(previous) = replaced {
                    if !Arc::ptr_eq(&previous, &call) {
                        log::debug!("Call {} to {} superseded", previous.id(), peer_id);
                        previous.close();
                    }
                }
                log::info!("Receiving media from {}", peer_id);
                self.publish(SessionEvent::PeerStreamReady { peer_id });
            }
            CallEvent::Closed => {
                log::info!("Call {} with {} closed", call.id(), peer_id);
                let mut state = self.state.write().await;
                let current = state
                    .peers
                    .get(&peer_id)
                    .is_some_and(|stored| Arc::ptr_eq(stored, &call));
                if current {
                    state.peers.remove(&peer_id);
                    drop(state);
                    self.publish(SessionEvent::PeerLeft { peer_id });
                }
            }
        }
    }

    async fn on_room_full(&self) {
        log::warn!("Room {} is full", self.room);
        self.state.write().await.phase = SessionPhase::RoomFull;
        self.publish(SessionEvent::RoomFull {
            room: self.room.clone(),
            message: ROOM_FULL_MESSAGE.to_string(),
            redirect: self.config.room.home_route.clone(),
        });
        self.shutdown(SessionPhase::RoomFull).await;
    }

    async fn place_call(self: &Arc<Self>, peer_id: &str, stream: MediaStream) {
        match self.peer.call(peer_id, stream).await {
            Ok(call) => self.watch(call),
            Err(e) => log::warn!("Failed to call {}: {}", peer_id, e),
        }
    }

    /// Forward the call's events into the session loop
    fn watch(&self, call: Arc<MediaCall>) {
        let updates = self.call_updates.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = call.next_event().await {
                let closed = matches!(event, CallEvent::Closed);
                if updates.send((Arc::clone(&call), event)).is_err() || closed {
                    break;
                }
            }
        });
        self.keep(handle);
    }

    async fn toggle(self: Arc<Self>, which: MediaToggle) -> Result<ToggleOutcome, VideoChatError> {
        let notice_duration = self.config.controls.notice_duration();
        let constraints = {
            let mut state = self.state.write().await;
            match state.phase {
                SessionPhase::Joined => {}
                SessionPhase::RoomFull => return Err(VideoChatError::RoomFull(self.room.clone())),
                SessionPhase::Joining | SessionPhase::Closed => {
                    return Err(VideoChatError::SessionError(format!(
                        "Not in room {}",
                        self.room
                    )))
                }
            }
            if state.toggle_busy {
                state.set_notice(WAIT_NOTICE, notice_duration);
                return Ok(ToggleOutcome::Busy);
            }
            state.toggle_busy = true;

            let size = self.config.media.video_size();
            match which {
                MediaToggle::Camera => {
                    state.video_on = !state.video_on;
                    let text = if state.video_on { "Camera ON" } else { "Camera OFF" };
                    state.set_notice(text, notice_duration);
                }
                MediaToggle::Microphone => {
                    state.mic_on = !state.mic_on;
                    let text = if state.mic_on { "Microphone ON" } else { "Microphone OFF" };
                    state.set_notice(text, notice_duration);
                }
            }
            log::info!("{:?} toggled in room {}", which, self.room);
            MediaConstraints::new(state.video_on, state.mic_on, size)
        };

        let stream_acquired = self.renegotiate(&constraints).await;
        self.release_toggle_after_cooldown();

        let state = self.state.read().await;
        Ok(ToggleOutcome::Applied {
            video_on: state.video_on,
            mic_on: state.mic_on,
            stream_acquired,
        })
    }

    /// Replace the outgoing stream and call every connected peer with it
    async fn renegotiate(self: &Arc<Self>, constraints: &MediaConstraints) -> bool {
        let acquired = match self.devices.get_user_media(constraints).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                log::warn!("Renegotiation in room {} without media: {}", self.room, e);
                None
            }
        };

        let (previous, targets) = {
            let mut state = self.state.write().await;
            if state.phase != SessionPhase::Joined {
                // left while the devices were opening
                if let Some(stream) = &acquired {
                    stream.stop_all();
                }
                return false;
            }
            let previous = std::mem::replace(&mut state.local_stream, acquired.clone());
            let targets: Vec<String> = state.peers.keys().cloned().collect();
            (previous, targets)
        };
        if let Some(previous) = previous {
            previous.stop_all();
        }

        let outgoing = acquired.clone().unwrap_or_else(MediaStream::empty);
        for peer_id in targets {
            self.place_call(&peer_id, outgoing.clone()).await;
        }

        let active = acquired.is_some();
        self.publish(SessionEvent::LocalStreamChanged { active });
        active
    }

    fn release_toggle_after_cooldown(self: &Arc<Self>) {
        let cooldown = self.config.controls.toggle_cooldown();
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            inner.state.write().await.toggle_busy = false;
        });
        self.keep(handle);
    }

    async fn shutdown(&self, phase: SessionPhase) {
        let (calls, local, announce) = {
            let mut state = self.state.write().await;
            if state.phase != SessionPhase::RoomFull {
                state.phase = phase;
            }
            state.toggle_busy = false;
            let calls: Vec<Arc<MediaCall>> =
                std::mem::take(&mut state.peers).into_values().collect();
            let local = state.local_stream.take();
            let announce = !state.closed_announced;
            state.closed_announced = true;
            (calls, local, announce)
        };

        for call in calls {
            call.close();
        }
        self.peer.destroy().await;
        self.signaling.disconnect().await;
        if let Some(stream) = local {
            stream.stop_all();
        }

        if announce {
            log::info!("Left room {}", self.room);
            self.publish(SessionEvent::Closed);
        }
    }
}
