use crate::media::{MediaStream, StreamInfo};
use crate::peer::MediaCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const WAIT_NOTICE: &str = "Please wait a moment";
pub const ROOM_FULL_MESSAGE: &str = "The room is full.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Joining,
    Joined,
    RoomFull,
    Closed,
}

/// Events published to the frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Joined { peer_id: String },
    PeerStreamReady { peer_id: String },
    PeerLeft { peer_id: String },
    LocalStreamChanged { active: bool },
    RoomFull { room: String, message: String, redirect: String },
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// A renegotiation is still in flight; nothing changed
    Busy,
    Applied {
        video_on: bool,
        mic_on: bool,
        /// false when the devices refused and media is now off entirely
        stream_acquired: bool,
    },
}

/// Short-lived status text shown under the local preview
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    expires_at: Instant,
}

impl Notice {
    pub fn new(text: impl Into<String>, duration: Duration) -> Self {
        Self {
            text: text.into(),
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_visible(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlIcons {
    pub microphone: String,
    pub camera: String,
}

impl ControlIcons {
    pub fn for_state(video_on: bool, mic_on: bool) -> Self {
        Self {
            microphone: if mic_on { "🔊" } else { "🔇" }.to_string(),
            camera: if video_on { "⬛️" } else { "🔴" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePeerView {
    pub peer_id: String,
    pub stream: Option<StreamInfo>,
}

/// Everything the widget renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoChatSnapshot {
    pub room: String,
    pub phase: SessionPhase,
    pub my_id: Option<String>,
    pub video_on: bool,
    pub mic_on: bool,
    pub toggle_busy: bool,
    pub notice: Option<String>,
    pub local_stream: Option<StreamInfo>,
    pub peers: Vec<RemotePeerView>,
    pub controls: ControlIcons,
    pub joined_at: DateTime<Utc>,
}

pub(crate) struct SessionState {
    pub phase: SessionPhase,
    pub my_id: Option<String>,
    pub local_stream: Option<MediaStream>,
    /// remote peer id -> the call currently carrying its media
    pub peers: BTreeMap<String, Arc<MediaCall>>,
    pub video_on: bool,
    pub mic_on: bool,
    pub toggle_busy: bool,
    pub notice: Option<Notice>,
    pub closed_announced: bool,
    pub joined_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Joining,
            my_id: None,
            local_stream: None,
            peers: BTreeMap::new(),
            video_on: false,
            mic_on: false,
            toggle_busy: false,
            notice: None,
            closed_announced: false,
            joined_at: Utc::now(),
        }
    }

    pub fn set_notice(&mut self, text: impl Into<String>, duration: Duration) {
        self.notice = Some(Notice::new(text, duration));
    }

    pub fn visible_notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| n.is_visible())
            .map(|n| n.text.as_str())
    }

    pub fn snapshot(&self, room: &str) -> VideoChatSnapshot {
        VideoChatSnapshot {
            room: room.to_string(),
            phase: self.phase,
            my_id: self.my_id.clone(),
            video_on: self.video_on,
            mic_on: self.mic_on,
            toggle_busy: self.toggle_busy,
            notice: self.visible_notice().map(str::to_string),
            local_stream: self.local_stream.as_ref().map(MediaStream::info),
            peers: self
                .peers
                .iter()
                .map(|(peer_id, call)| RemotePeerView {
                    peer_id: peer_id.clone(),
                    stream: call.remote_stream().map(|s| s.info()),
                })
                .collect(),
            controls: ControlIcons::for_state(self.video_on, self.mic_on),
            joined_at: self.joined_at,
        }
    }
}
