//! Room signaling
//!
//! Clients announce themselves with `join-room` and learn about other
//! participants through `user-connected` / `user-disconnected`. The hub holds
//! the room registry; transports carry encoded frames to and from it.

pub mod client;
pub mod hub;
pub mod protocol;
pub mod server;
pub mod tcp;

pub use client::{HubConnection, SignalingTransport};
pub use hub::{RoomSummary, SignalingHub, SocketId};
pub use protocol::{ClientMessage, ServerEvent, MAX_FRAME_LEN};
pub use server::SignalingServer;
pub use tcp::TcpSignalingClient;
