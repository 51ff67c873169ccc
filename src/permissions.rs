//! Camera and microphone permission probing
//!
//! There is no portable permission prompt on desktop platforms, so each
//! platform is queried the way its users grant access.

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

impl PermissionInfo {
    fn new(status: PermissionStatus, message: impl Into<String>, can_request: bool) -> Self {
        Self {
            status,
            message: message.into(),
            can_request,
        }
    }
}

/// Permissions for both capture kinds used by a call
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MediaPermissions {
    pub camera: PermissionInfo,
    pub microphone: PermissionInfo,
}

impl MediaPermissions {
    pub fn all_granted(&self) -> bool {
        self.camera.status == PermissionStatus::Granted
            && self.microphone.status == PermissionStatus::Granted
    }
}

pub fn check_media_permissions() -> MediaPermissions {
    MediaPermissions {
        camera: check_camera_permission(),
        microphone: check_microphone_permission(),
    }
}

pub fn check_camera_permission() -> PermissionInfo {
    #[cfg(target_os = "windows")]
    {
        windows_camera()
    }

    #[cfg(target_os = "macos")]
    {
        macos_authorization("vide", "Camera")
    }

    #[cfg(target_os = "linux")]
    {
        linux::camera()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        PermissionInfo::new(PermissionStatus::NotDetermined, "Platform not supported", false)
    }
}

pub fn check_microphone_permission() -> PermissionInfo {
    #[cfg(target_os = "windows")]
    {
        // Desktop apps are governed by a single privacy toggle with no query API
        PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "Microphone access is controlled in Windows Settings > Privacy > Microphone",
            false,
        )
    }

    #[cfg(target_os = "macos")]
    {
        macos_authorization("soun", "Microphone")
    }

    #[cfg(target_os = "linux")]
    {
        linux::microphone()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        PermissionInfo::new(PermissionStatus::NotDetermined, "Platform not supported", false)
    }
}

#[cfg(target_os = "windows")]
fn windows_camera() -> PermissionInfo {
    use nokhwa::query;

    match query(nokhwa::utils::ApiBackend::Auto) {
        Ok(devices) if !devices.is_empty() => PermissionInfo::new(
            PermissionStatus::Granted,
            "Camera access granted via Windows Privacy settings",
            false,
        ),
        Ok(_) => PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "No cameras found - permission may not be granted",
            true,
        ),
        Err(e) => PermissionInfo::new(
            PermissionStatus::Denied,
            format!("Camera access denied: {}", e),
            true,
        ),
    }
}

#[cfg(target_os = "macos")]
fn macos_authorization(media_type_code: &str, what: &str) -> PermissionInfo {
    use objc::runtime::{Class, Object};
    use objc::{msg_send, sel, sel_impl};
    use std::ffi::CString;

    let Some(device_class) = Class::get("AVCaptureDevice") else {
        return PermissionInfo::new(
            PermissionStatus::NotDetermined,
            "AVFoundation not available",
            false,
        );
    };
    let Ok(code) = CString::new(media_type_code) else {
        return PermissionInfo::new(PermissionStatus::NotDetermined, "Invalid media type", false);
    };

    // AVAuthorizationStatus: 0 NotDetermined, 1 Restricted, 2 Denied, 3 Authorized
    let auth_status: i64 = unsafe {
        let media_type: *mut Object = msg_send![device_class, mediaTypeForString: code.as_ptr()];
        msg_send![device_class, authorizationStatusForMediaType: media_type]
    };

    match auth_status {
        3 => PermissionInfo::new(PermissionStatus::Granted, format!("{} access authorized", what), false),
        2 => PermissionInfo::new(
            PermissionStatus::Denied,
            format!("{} access denied - enable in System Settings > Privacy & Security", what),
            false,
        ),
        1 => PermissionInfo::new(
            PermissionStatus::Restricted,
            format!("{} access restricted by system policy", what),
            false,
        ),
        _ => PermissionInfo::new(
            PermissionStatus::NotDetermined,
            format!("{} permission not yet requested", what),
            true,
        ),
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::{PermissionInfo, PermissionStatus};
    use std::path::Path;
    use std::process::Command;

    pub(super) fn camera() -> PermissionInfo {
        let video_devices: Vec<_> = (0..10)
            .map(|i| format!("/dev/video{}", i))
            .filter(|path| Path::new(path).exists())
            .collect();

        let Some(first_device) = video_devices.first() else {
            return PermissionInfo::new(
                PermissionStatus::NotDetermined,
                "No video devices found at /dev/video*",
                false,
            );
        };

        if in_any_group(&["video", "plugdev"]) {
            PermissionInfo::new(
                PermissionStatus::Granted,
                format!("Camera access granted (user in video group, {} found)", first_device),
                false,
            )
        } else {
            PermissionInfo::new(
                PermissionStatus::Denied,
                format!(
                    "Camera device {} exists but user not in video group - run: sudo usermod -a -G video $USER",
                    first_device
                ),
                true,
            )
        }
    }

    pub(super) fn microphone() -> PermissionInfo {
        if !Path::new("/dev/snd").exists() {
            return PermissionInfo::new(
                PermissionStatus::NotDetermined,
                "No sound devices found at /dev/snd",
                false,
            );
        }

        if in_any_group(&["audio"]) {
            PermissionInfo::new(PermissionStatus::Granted, "Microphone access granted (user in audio group)", false)
        } else {
            // PipeWire/PulseAudio hand out access without group membership
            PermissionInfo::new(
                PermissionStatus::NotDetermined,
                "Microphone access is mediated by the sound server",
                false,
            )
        }
    }

    fn in_any_group(names: &[&str]) -> bool {
        Command::new("groups")
            .output()
            .ok()
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|groups| groups.split_whitespace().any(|g| names.contains(&g)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(PermissionStatus::Granted.to_string(), "granted");
        assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
        assert_eq!(PermissionStatus::Restricted.to_string(), "restricted");
    }

    #[test]
    fn all_granted_needs_both() {
        let granted = PermissionInfo::new(PermissionStatus::Granted, "", false);
        let denied = PermissionInfo::new(PermissionStatus::Denied, "", true);
        let perms = MediaPermissions {
            camera: granted.clone(),
            microphone: denied,
        };
        assert!(!perms.all_granted());

        let perms = MediaPermissions {
            camera: granted.clone(),
            microphone: granted,
        };
        assert!(perms.all_granted());
    }

    #[test]
    #[ignore = "Requires camera hardware and OS permissions - run manually"]
    fn permission_check_reports_a_message() {
        let perms = check_media_permissions();
        assert!(!perms.camera.message.is_empty());
        assert!(!perms.microphone.message.is_empty());
    }
}
