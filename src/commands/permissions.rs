use crate::permissions::{check_media_permissions, MediaPermissions, PermissionStatus};
use tauri::command;

/// Check camera and microphone permission status
#[command]
pub async fn check_media_permission_status() -> Result<MediaPermissions, String> {
    log::debug!("Checking media permission status");
    tokio::task::spawn_blocking(check_media_permissions)
        .await
        .map_err(|e| e.to_string())
}

/// Request media permissions. Desktop platforms cannot prompt from here, so
/// anything not yet granted comes back with instructions in its message.
#[command]
pub async fn request_media_permission() -> Result<MediaPermissions, String> {
    log::info!("Requesting media permission");
    let permissions = check_media_permission_status().await?;

    for (what, info) in [("camera", &permissions.camera), ("microphone", &permissions.microphone)] {
        if info.status != PermissionStatus::Granted {
            log::warn!("{} permission is {}: {}", what, info.status, info.message);
        }
    }
    Ok(permissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires camera hardware and OS permissions - run manually"]
    async fn test_request_is_consistent_with_check() {
        let requested = request_media_permission().await.unwrap();
        let checked = check_media_permission_status().await.unwrap();
        assert_eq!(requested.camera.status, checked.camera.status);
        assert_eq!(requested.microphone.status, checked.microphone.status);
    }
}
