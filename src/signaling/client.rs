use crate::errors::VideoChatError;
use crate::signaling::hub::{SignalingHub, SocketId};
use crate::signaling::protocol::{ClientMessage, ServerEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};

/// Client side of a signaling connection
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn emit(&self, message: ClientMessage) -> Result<(), VideoChatError>;

    /// Next event from the hub; `None` once the connection is gone.
    /// Undecodable frames are skipped.
    async fn next_event(&self) -> Option<ServerEvent>;

    /// Close the connection. Calling it again does nothing.
    async fn disconnect(&self);
}

/// Connection to a hub living in the same process
pub struct HubConnection {
    hub: SignalingHub,
    socket: SocketId,
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    closed: AtomicBool,
}

impl HubConnection {
    pub async fn connect(hub: &SignalingHub) -> Self {
        let (socket, inbound) = hub.register().await;
        Self {
            hub: hub.clone(),
            socket,
            inbound: Mutex::new(inbound),
            closed: AtomicBool::new(false),
        }
    }

    pub fn socket_id(&self) -> SocketId {
        self.socket
    }
}

#[async_trait]
impl SignalingTransport for HubConnection {
    async fn emit(&self, message: ClientMessage) -> Result<(), VideoChatError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(VideoChatError::SignalingError(
                "Signaling connection is closed".to_string(),
            ));
        }
        log::debug!("Socket {} emits '{}'", self.socket, message.event_name());
        self.hub.handle_frame(self.socket, &message.encode()).await
    }

    async fn next_event(&self) -> Option<ServerEvent> {
        let mut inbound = self.inbound.lock().await;
        while let Some(frame) = inbound.recv().await {
            match ServerEvent::decode(&frame) {
                Ok(event) => return Some(event),
                Err(e) => log::warn!("Dropping signaling frame {:?}: {}", frame, e),
            }
        }
        None
    }

    async fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.hub.disconnect(self.socket).await;
        }
    }
}
