use crate::errors::VideoChatError;
use crate::media::MediaStream;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The other side's media became available
    Stream(MediaStream),
    Closed,
}

#[derive(Debug)]
enum CallSignal {
    Stream(MediaStream),
    Close,
}

/// One media call between two peers, seen from one side
pub struct MediaCall {
    id: String,
    generation: u64,
    remote_peer: String,
    direction: CallDirection,
    offered: Option<MediaStream>,
    local_stream: RwLock<Option<MediaStream>>,
    remote_stream: RwLock<Option<MediaStream>>,
    to_remote: mpsc::UnboundedSender<CallSignal>,
    to_self: mpsc::UnboundedSender<CallSignal>,
    inbound: Mutex<mpsc::UnboundedReceiver<CallSignal>>,
    answered: AtomicBool,
    open: AtomicBool,
    close_delivered: AtomicBool,
}

impl std::fmt::Debug for MediaCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCall")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("remote_peer", &self.remote_peer)
            .field("direction", &self.direction)
            .field("open", &self.is_open())
            .finish()
    }
}

impl MediaCall {
    /// Build both ends of a call from `caller` to `callee`.
    /// Returns `(outgoing, incoming)`.
    pub fn pair(caller: &str, callee: &str, stream: MediaStream) -> (Arc<Self>, Arc<Self>) {
        let id = uuid::Uuid::new_v4().to_string();
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::SeqCst);
        let (caller_tx, caller_rx) = mpsc::unbounded_channel();
        let (callee_tx, callee_rx) = mpsc::unbounded_channel();

        let outgoing = Self {
            id: id.clone(),
            generation,
            remote_peer: callee.to_string(),
            direction: CallDirection::Outgoing,
            offered: None,
            local_stream: RwLock::new(Some(stream.clone())),
            remote_stream: RwLock::new(None),
            to_remote: callee_tx.clone(),
            to_self: caller_tx.clone(),
            inbound: Mutex::new(caller_rx),
            answered: AtomicBool::new(false),
            open: AtomicBool::new(true),
            close_delivered: AtomicBool::new(false),
        };
        let incoming = Self {
            id,
            generation,
            remote_peer: caller.to_string(),
            direction: CallDirection::Incoming,
            offered: Some(stream),
            local_stream: RwLock::new(None),
            remote_stream: RwLock::new(None),
            to_remote: caller_tx,
            to_self: callee_tx,
            inbound: Mutex::new(callee_rx),
            answered: AtomicBool::new(false),
            open: AtomicBool::new(true),
            close_delivered: AtomicBool::new(false),
        };
        (Arc::new(outgoing), Arc::new(incoming))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation order shared by both ends. When two peers call each other at
    /// the same time, both keep the call with the higher generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Identity of the peer on the other end
    pub fn remote_peer(&self) -> &str {
        &self.remote_peer
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn local_stream(&self) -> Option<MediaStream> {
        self.local_stream
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn remote_stream(&self) -> Option<MediaStream> {
        self.remote_stream
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Accept an incoming call. Without local media an empty stream is sent,
    /// so the caller still receives a `Stream` event.
    pub fn answer(&self, stream: Option<MediaStream>) -> Result<(), VideoChatError> {
        if self.direction != CallDirection::Incoming {
            return Err(VideoChatError::PeerError(
                "Only incoming calls can be answered".to_string(),
            ));
        }
        if !self.is_open() {
            return Err(VideoChatError::PeerError(format!("Call {} is closed", self.id)));
        }
        if self.answered.swap(true, Ordering::SeqCst) {
            return Err(VideoChatError::PeerError(format!(
                "Call {} was already answered",
                self.id
            )));
        }

        let stream = stream.unwrap_or_else(MediaStream::empty);
        *self.local_stream.write().unwrap_or_else(|e| e.into_inner()) = Some(stream.clone());

        self.to_remote
            .send(CallSignal::Stream(stream))
            .map_err(|_| VideoChatError::PeerError("Caller is gone".to_string()))?;
        if let Some(offered) = &self.offered {
            let _ = self.to_self.send(CallSignal::Stream(offered.clone()));
        }
        Ok(())
    }

    /// Next event on this call. Yields `Closed` once, then `None`.
    pub async fn next_event(&self) -> Option<CallEvent> {
        let mut inbound = self.inbound.lock().await;
        loop {
            if self.close_delivered.load(Ordering::SeqCst) {
                return None;
            }
            match inbound.recv().await? {
                CallSignal::Stream(stream) => {
                    if !self.is_open() {
                        continue;
                    }
                    *self.remote_stream.write().unwrap_or_else(|e| e.into_inner()) =
                        Some(stream.clone());
                    return Some(CallEvent::Stream(stream));
                }
                CallSignal::Close => {
                    self.open.store(false, Ordering::SeqCst);
                    self.close_delivered.store(true, Ordering::SeqCst);
                    return Some(CallEvent::Closed);
                }
            }
        }
    }

    /// Hang up. Both ends observe `Closed`; closing twice does nothing.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        log::debug!("Closing call {} with {}", self.id, self.remote_peer);
        let _ = self.to_remote.send(CallSignal::Close);
        let _ = self.to_self.send(CallSignal::Close);
    }
}
