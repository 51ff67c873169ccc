//! Peer-to-peer media calls
//!
//! A peer owns an identity, places calls to other identities and receives
//! calls from them. The broker here connects peers living in one process;
//! other transports plug in through `PeerTransport`.

pub mod broker;
pub mod call;

pub use broker::{LoopbackPeer, PeerBroker};
pub use call::{CallDirection, CallEvent, MediaCall};

use crate::errors::VideoChatError;
use crate::media::MediaStream;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Identity other participants use to call us
    fn id(&self) -> &str;

    /// Call `remote_peer`, offering `stream`
    async fn call(
        &self,
        remote_peer: &str,
        stream: MediaStream,
    ) -> Result<Arc<MediaCall>, VideoChatError>;

    /// Next call placed to us; `None` once the peer is destroyed
    async fn next_incoming(&self) -> Option<Arc<MediaCall>>;

    /// Close every call and give up the identity
    async fn destroy(&self);
}
