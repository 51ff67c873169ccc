//! RoomCall: peer-to-peer video chat rooms for Tauri applications
//!
//! Backs the video strip shown on a collaborative problem page. Every
//! participant of a room sees and hears every other participant; camera and
//! microphone can be toggled at any time and the change is pushed to all
//! connected peers.
//!
//! # Features
//! - Room presence over a small event protocol (`join-room`, `user-connected`,
//!   `user-disconnected`, `full`)
//! - One media call per remote participant, set up and torn down on presence
//! - Camera/microphone toggles with renegotiation and a retry cooldown
//! - A standalone TCP signaling server (`roomcall-signal`)
//!
//! # Usage
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(roomcall::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//! The frontend then calls `join_video_room`, polls `poll_video_chat_event`
//! and renders `get_video_chat_state`.
pub mod commands;
pub mod config;
pub mod errors;
pub mod media;
pub mod peer;
pub mod permissions;
pub mod session;
pub mod signaling;

// Testing utilities - synthetic devices for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::RoomCallConfig;
pub use errors::VideoChatError;
pub use media::{MediaConstraints, MediaDevices, MediaStream};
pub use peer::{MediaCall, PeerBroker, PeerTransport};
pub use session::{RoomSession, SessionEvent, SessionTransports, ToggleOutcome, VideoChatSnapshot};
pub use signaling::{SignalingHub, SignalingServer, SignalingTransport};

use tauri::{
    plugin::{Builder, TauriPlugin},
    Runtime,
};

/// Initialize the RoomCall plugin with all commands
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("roomcall")
        .invoke_handler(tauri::generate_handler![
            // Room commands
            commands::room::join_video_room,
            commands::room::leave_video_room,
            commands::room::toggle_camera,
            commands::room::toggle_microphone,
            commands::room::get_video_chat_state,
            commands::room::poll_video_chat_event,
            commands::room::list_video_rooms,
            // Permission commands
            commands::permissions::check_media_permission_status,
            commands::permissions::request_media_permission,
            // Configuration commands
            commands::config::get_config,
            commands::config::update_config,
            commands::config::reset_config,
        ])
        .build()
}

/// Initialize logging
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "roomcall=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
