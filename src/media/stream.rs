use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

/// An open capture device backing a track
pub trait DeviceLease: Send + Sync {
    /// Close the device. Called once, when the track stops.
    fn release(&self);
}

/// A single captured track. Clones share the same liveness flag and device.
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    label: String,
    live: Arc<AtomicBool>,
    device: Option<Arc<dyn DeviceLease>>,
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("live", &self.is_live())
            .field("has_device", &self.device.is_some())
            .finish()
    }
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
            device: None,
        }
    }

    /// A track holding `device` open until it is stopped
    pub fn with_device(
        kind: TrackKind,
        label: impl Into<String>,
        device: Arc<dyn DeviceLease>,
    ) -> Self {
        Self {
            device: Some(device),
            ..Self::new(kind, label)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Stop the track and release its device, if it holds one.
    /// Stopping twice is harmless.
    pub fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            if let Some(device) = &self.device {
                device.release();
            }
            log::debug!("Stopped {:?} track {} ({})", self.kind, self.id, self.label);
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

/// Serializable view of a stream for the frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub id: String,
    pub audio: bool,
    pub video: bool,
    pub active: bool,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// A stream without tracks, sent when there is nothing to share
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    pub fn has_audio(&self) -> bool {
        self.tracks_of(TrackKind::Audio).any(MediaTrack::is_live)
    }

    pub fn has_video(&self) -> bool {
        self.tracks_of(TrackKind::Video).any(MediaTrack::is_live)
    }

    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            id: self.id.clone(),
            audio: self.has_audio(),
            video: self.has_video(),
            active: self.is_active(),
        }
    }
}
