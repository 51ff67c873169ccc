//! Room session: the video chat widget's orchestration
//!
//! A session acquires local media, announces itself through signaling,
//! keeps one call per remote participant and renegotiates outgoing media
//! when the camera or microphone is toggled.

pub mod room;
pub mod state;

pub use room::{RoomSession, SessionTransports};
pub use state::{
    ControlIcons, Notice, RemotePeerView, SessionEvent, SessionPhase, ToggleOutcome,
    VideoChatSnapshot,
};
