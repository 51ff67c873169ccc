use crate::errors::VideoChatError;
use crate::media::devices::reject_empty;
use crate::media::{MediaConstraints, MediaDevices, MediaStream, MediaTrack, TrackKind};
use crate::permissions::PermissionStatus;
use async_trait::async_trait;
use std::sync::Mutex;

pub const SYNTHETIC_CAMERA: &str = "Synthetic Camera";
pub const SYNTHETIC_MICROPHONE: &str = "Synthetic Microphone";

/// In-memory capture devices with configurable availability.
/// Every request and every stream handed out is recorded.
pub struct SyntheticMediaDevices {
    camera_available: bool,
    microphone_available: bool,
    permission: PermissionStatus,
    requests: Mutex<Vec<MediaConstraints>>,
    issued: Mutex<Vec<MediaStream>>,
}

impl Default for SyntheticMediaDevices {
    fn default() -> Self {
        Self {
            camera_available: true,
            microphone_available: true,
            permission: PermissionStatus::Granted,
            requests: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }
}

impl SyntheticMediaDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_camera(mut self) -> Self {
        self.camera_available = false;
        self
    }

    pub fn without_microphone(mut self) -> Self {
        self.microphone_available = false;
        self
    }

    pub fn with_permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }

    pub fn requests(&self) -> Vec<MediaConstraints> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn issued_streams(&self) -> Vec<MediaStream> {
        self.issued.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MediaDevices for SyntheticMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, VideoChatError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*constraints);

        reject_empty(constraints)?;
        if matches!(self.permission, PermissionStatus::Denied | PermissionStatus::Restricted) {
            return Err(VideoChatError::PermissionDenied(format!(
                "Media access is {}",
                self.permission
            )));
        }

        let mut tracks = Vec::new();
        if constraints.wants_video() {
            if !self.camera_available {
                return Err(VideoChatError::MediaUnavailable(
                    "Requested camera not found".to_string(),
                ));
            }
            tracks.push(MediaTrack::new(TrackKind::Video, SYNTHETIC_CAMERA));
        }
        if constraints.wants_audio() {
            if !self.microphone_available {
                return Err(VideoChatError::MediaUnavailable(
                    "Requested microphone not found".to_string(),
                ));
            }
            tracks.push(MediaTrack::new(TrackKind::Audio, SYNTHETIC_MICROPHONE));
        }

        let stream = MediaStream::new(tracks);
        self.issued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(stream.clone());
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VideoSize;

    #[tokio::test]
    async fn grants_requested_kinds() {
        let devices = SyntheticMediaDevices::new();
        let stream = devices
            .get_user_media(&MediaConstraints::new(false, true, VideoSize::default()))
            .await
            .unwrap();

        assert!(stream.has_audio());
        assert!(!stream.has_video());
        assert_eq!(devices.issued_streams().len(), 1);
    }

    #[tokio::test]
    async fn refuses_like_a_browser() {
        let devices = SyntheticMediaDevices::new().without_camera();
        let size = VideoSize::default();

        assert!(devices.get_user_media(&MediaConstraints::new(false, false, size)).await.is_err());
        assert!(matches!(
            devices.get_user_media(&MediaConstraints::initial(size)).await,
            Err(VideoChatError::MediaUnavailable(_))
        ));

        let denied = SyntheticMediaDevices::new().with_permission(PermissionStatus::Denied);
        assert!(matches!(
            denied.get_user_media(&MediaConstraints::initial(size)).await,
            Err(VideoChatError::PermissionDenied(_))
        ));
        assert_eq!(devices.requests().len(), 2);
        assert!(devices.issued_streams().is_empty());
    }
}
