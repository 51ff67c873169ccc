use crate::errors::VideoChatError;
use crate::media::{
    DeviceLease, MediaConstraints, MediaStream, MediaTrack, TrackKind, VideoSize,
};
use crate::permissions::{self, PermissionInfo, PermissionStatus};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::CallbackCamera;
use std::sync::{Arc, Mutex};

/// Source of local media. Mirrors the browser's `getUserMedia` contract.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Open the devices named by `constraints`.
    ///
    /// Fails when nothing is requested, when permission for a requested kind
    /// is refused, or when a requested kind has no device.
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, VideoChatError>;
}

pub(crate) fn reject_empty(constraints: &MediaConstraints) -> Result<(), VideoChatError> {
    if constraints.requests_nothing() {
        return Err(VideoChatError::MediaUnavailable(
            "At least one of audio and video must be requested".to_string(),
        ));
    }
    Ok(())
}

fn ensure_permitted(kind: TrackKind, info: &PermissionInfo) -> Result<(), VideoChatError> {
    match info.status {
        PermissionStatus::Denied | PermissionStatus::Restricted => Err(
            VideoChatError::PermissionDenied(format!("{:?}: {}", kind, info.message)),
        ),
        PermissionStatus::Granted | PermissionStatus::NotDetermined => Ok(()),
    }
}

/// Camera opened through nokhwa, streaming until released
struct CameraLease {
    camera: Mutex<CallbackCamera>,
}

// nokhwa backends keep raw platform handles; every access goes through the mutex
unsafe impl Send for CameraLease {}
unsafe impl Sync for CameraLease {}

impl DeviceLease for CameraLease {
    fn release(&self) {
        let mut camera = self.camera.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {}", e);
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        let camera = self.camera.get_mut().unwrap_or_else(|e| e.into_inner());
        if camera.is_stream_open().unwrap_or(false) {
            let _ = camera.stop_stream();
        }
    }
}

/// Open the first camera at the format closest to `size`
fn open_camera(size: VideoSize) -> Result<MediaTrack, VideoChatError> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| VideoChatError::MediaUnavailable(format!("Failed to query cameras: {}", e)))?;
    let info = cameras
        .first()
        .ok_or_else(|| VideoChatError::MediaUnavailable("Requested camera not found".to_string()))?;

    let closest = CameraFormat::new(
        Resolution::new(size.ideal_width, size.ideal_height),
        FrameFormat::MJPEG,
        30,
    );
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(closest));

    let mut camera = CallbackCamera::new(info.index().clone(), requested, |_| {}).map_err(|e| {
        VideoChatError::MediaUnavailable(format!(
            "Failed to open camera {}: {}",
            info.human_name(),
            e
        ))
    })?;
    camera.open_stream().map_err(|e| {
        VideoChatError::MediaUnavailable(format!(
            "Failed to start camera {}: {}",
            info.human_name(),
            e
        ))
    })?;

    log::info!(
        "Opened camera '{}' (ideal {}x{})",
        info.human_name(),
        size.ideal_width,
        size.ideal_height
    );
    let lease = Arc::new(CameraLease {
        camera: Mutex::new(camera),
    });
    Ok(MediaTrack::with_device(TrackKind::Video, info.human_name(), lease))
}

/// Name of the default input device, if the host has one
fn default_microphone() -> Option<String> {
    let device = cpal::default_host().default_input_device()?;
    Some(
        device
            .name()
            .unwrap_or_else(|_| "Default microphone".to_string()),
    )
}

fn microphone_track(default_input: Option<String>) -> Result<MediaTrack, VideoChatError> {
    let name = default_input.ok_or_else(|| {
        VideoChatError::MediaUnavailable("Requested microphone not found".to_string())
    })?;
    log::info!("Using microphone '{}'", name);
    Ok(MediaTrack::new(TrackKind::Audio, name))
}

/// Devices of the host machine
#[derive(Debug, Default, Clone)]
pub struct NativeMediaDevices;

impl NativeMediaDevices {
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(what: &str, f: F) -> Result<T, VideoChatError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, VideoChatError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VideoChatError::MediaUnavailable(format!("{} task failed: {}", what, e)))?
}

#[async_trait]
impl MediaDevices for NativeMediaDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, VideoChatError> {
        reject_empty(constraints)?;

        let mut tracks = Vec::new();

        if constraints.audio {
            ensure_permitted(TrackKind::Audio, &permissions::check_microphone_permission())?;
            let default_input = blocking("Microphone lookup", || Ok(default_microphone())).await?;
            tracks.push(microphone_track(default_input)?);
        }

        if let Some(size) = constraints.video {
            ensure_permitted(TrackKind::Video, &permissions::check_camera_permission())?;
            tracks.push(blocking("Camera open", move || open_camera(size)).await?);
        }

        Ok(MediaStream::new(tracks))
    }
}
