use serde::{Deserialize, Serialize};

/// Ideal capture size; devices may deliver something else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl VideoSize {
    pub fn new(ideal_width: u32, ideal_height: u32) -> Self {
        Self {
            ideal_width,
            ideal_height,
        }
    }
}

impl Default for VideoSize {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// What to request from the capture devices. `video: None` means no video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: Option<VideoSize>,
}

impl MediaConstraints {
    /// Constraints used when entering a room: camera and microphone both on
    pub fn initial(size: VideoSize) -> Self {
        Self {
            audio: true,
            video: Some(size),
        }
    }

    pub fn new(video_on: bool, mic_on: bool, size: VideoSize) -> Self {
        Self {
            audio: mic_on,
            video: video_on.then_some(size),
        }
    }

    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn wants_audio(&self) -> bool {
        self.audio
    }

    pub fn requests_nothing(&self) -> bool {
        !self.audio && self.video.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_requests_everything() {
        let c = MediaConstraints::initial(VideoSize::default());
        assert!(c.wants_audio());
        assert_eq!(c.video, Some(VideoSize::new(1280, 720)));
        assert!(!c.requests_nothing());
    }

    #[test]
    fn both_off_requests_nothing() {
        let c = MediaConstraints::new(false, false, VideoSize::default());
        assert!(c.requests_nothing());

        let audio_only = MediaConstraints::new(false, true, VideoSize::default());
        assert!(!audio_only.wants_video());
        assert!(!audio_only.requests_nothing());
    }
}
