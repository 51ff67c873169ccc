use crate::errors::VideoChatError;
use crate::media::MediaStream;
use crate::peer::call::MediaCall;
use crate::peer::PeerTransport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};

type IncomingSender = mpsc::UnboundedSender<Arc<MediaCall>>;

/// Hands out peer identities and routes calls between peers of one process
#[derive(Clone, Default)]
pub struct PeerBroker {
    registry: Arc<RwLock<HashMap<String, IncomingSender>>>,
}

impl PeerBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a peer with a freshly generated identity
    pub async fn open(&self) -> Result<LoopbackPeer, VideoChatError> {
        self.open_with_id(&uuid::Uuid::new_v4().to_string()).await
    }

    pub async fn open_with_id(&self, id: &str) -> Result<LoopbackPeer, VideoChatError> {
        if id.is_empty() {
            return Err(VideoChatError::PeerError("Peer id must not be empty".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut registry = self.registry.write().await;
            if registry.contains_key(id) {
                return Err(VideoChatError::PeerError(format!("ID \"{}\" is taken", id)));
            }
            registry.insert(id.to_string(), tx);
        }
        log::info!("Peer {} opened", id);

        Ok(LoopbackPeer {
            id: id.to_string(),
            broker: self.clone(),
            incoming: Mutex::new(rx),
            calls: std::sync::Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        })
    }

    pub async fn peer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn route(
        &self,
        from: &str,
        to: &str,
        stream: MediaStream,
    ) -> Result<Arc<MediaCall>, VideoChatError> {
        let registry = self.registry.read().await;
        let Some(callee) = registry.get(to) else {
            return Err(VideoChatError::PeerError(format!(
                "Could not connect to peer {}",
                to
            )));
        };

        let (outgoing, incoming) = MediaCall::pair(from, to, stream);
        callee
            .send(incoming)
            .map_err(|_| VideoChatError::PeerError(format!("Peer {} is gone", to)))?;
        Ok(outgoing)
    }

    async fn release(&self, id: &str) {
        if self.registry.write().await.remove(id).is_some() {
            log::info!("Peer {} released", id);
        }
    }
}

/// Peer registered with a `PeerBroker`
pub struct LoopbackPeer {
    id: String,
    broker: PeerBroker,
    incoming: Mutex<mpsc::UnboundedReceiver<Arc<MediaCall>>>,
    calls: std::sync::Mutex<Vec<Arc<MediaCall>>>,
    destroyed: AtomicBool,
}

impl LoopbackPeer {
    fn track(&self, call: &Arc<MediaCall>) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.retain(|c| c.is_open());
        calls.push(Arc::clone(call));
    }

    pub fn open_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.is_open())
            .count()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerTransport for LoopbackPeer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(
        &self,
        remote_peer: &str,
        stream: MediaStream,
    ) -> Result<Arc<MediaCall>, VideoChatError> {
        if self.is_destroyed() {
            return Err(VideoChatError::PeerError(format!(
                "Peer {} is destroyed",
                self.id
            )));
        }
        log::debug!("Peer {} calling {}", self.id, remote_peer);
        let call = self.broker.route(&self.id, remote_peer, stream).await?;
        self.track(&call);
        Ok(call)
    }

    async fn next_incoming(&self) -> Option<Arc<MediaCall>> {
        if self.is_destroyed() {
            return None;
        }
        let call = self.incoming.lock().await.recv().await?;
        log::debug!("Peer {} received call {} from {}", self.id, call.id(), call.remote_peer());
        self.track(&call);
        Some(call)
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.broker.release(&self.id).await;

        // calls that were routed to us but never picked up
        if let Ok(mut incoming) = self.incoming.try_lock() {
            while let Ok(call) = incoming.try_recv() {
                call.close();
            }
        }

        let calls = std::mem::take(&mut *self.calls.lock().unwrap_or_else(|e| e.into_inner()));
        for call in calls {
            call.close();
        }
        log::info!("Peer {} destroyed", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::CallEvent;

    #[tokio::test]
    async fn calls_are_routed_to_the_callee() {
        let broker = PeerBroker::new();
        let alice = broker.open().await.unwrap();
        let bob = broker.open().await.unwrap();
        assert_ne!(alice.id(), bob.id());

        let outgoing = alice.call(bob.id(), MediaStream::empty()).await.unwrap();
        let incoming = bob.next_incoming().await.unwrap();
        assert_eq!(incoming.remote_peer(), alice.id());
        assert_eq!(incoming.id(), outgoing.id());
    }

    #[tokio::test]
    async fn duplicate_and_unknown_ids_fail() {
        let broker = PeerBroker::new();
        let _first = broker.open_with_id("same").await.unwrap();
        assert!(broker.open_with_id("same").await.is_err());

        let caller = broker.open().await.unwrap();
        let err = caller.call("nobody", MediaStream::empty()).await.unwrap_err();
        assert!(matches!(err, VideoChatError::PeerError(_)));
    }

    #[tokio::test]
    async fn destroy_closes_calls_and_releases_identity() {
        let broker = PeerBroker::new();
        let alice = broker.open_with_id("alice").await.unwrap();
        let bob = broker.open_with_id("bob").await.unwrap();

        let outgoing = alice.call("bob", MediaStream::empty()).await.unwrap();
        let incoming = bob.next_incoming().await.unwrap();
        incoming.answer(None).unwrap();
        assert_eq!(alice.open_calls(), 1);

        alice.destroy().await;
        alice.destroy().await;
        assert!(!outgoing.is_open());
        assert_eq!(broker.peer_ids().await, vec!["bob".to_string()]);

        // bob sees the stream then the hang-up
        assert!(matches!(incoming.next_event().await, Some(CallEvent::Stream(_))));
        assert!(matches!(incoming.next_event().await, Some(CallEvent::Closed)));
        assert!(alice.call("bob", MediaStream::empty()).await.is_err());
        assert!(alice.next_incoming().await.is_none());
    }
}
