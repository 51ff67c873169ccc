//! Room call settings shared by every command in the process.
//!
//! Loaded once from `RoomCallConfig::default_path()` and written back there on
//! every change. Sessions already in a room keep the settings they joined with.

use crate::config::RoomCallConfig;
use std::sync::{Arc, RwLock};
use tauri::command;

lazy_static::lazy_static! {
    static ref ACTIVE_CONFIG: Arc<RwLock<RoomCallConfig>> =
        Arc::new(RwLock::new(RoomCallConfig::load_or_default()));
}

/// Settings a new session should join with
pub(crate) fn current_config() -> Result<RoomCallConfig, String> {
    ACTIVE_CONFIG
        .read()
        .map(|config| config.clone())
        .map_err(|e| format!("Config lock poisoned: {}", e))
}

// Persist first so a failed write leaves the running settings untouched
fn install(config: RoomCallConfig) -> Result<RoomCallConfig, String> {
    let path = RoomCallConfig::default_path();
    config.save_to_file(&path).map_err(|e| e.to_string())?;

    let mut active = ACTIVE_CONFIG
        .write()
        .map_err(|e| format!("Config lock poisoned: {}", e))?;
    *active = config.clone();
    log::info!("Room call config saved to {}", path.display());
    Ok(config)
}

#[command]
pub async fn get_config() -> Result<RoomCallConfig, String> {
    current_config()
}

/// Replace the settings. Invalid settings are refused before anything is
/// written; room capacity applies to the in-process hub from the next join.
#[command]
pub async fn update_config(new_config: RoomCallConfig) -> Result<(), String> {
    if let Err(e) = new_config.validate() {
        log::warn!("Refusing config update: {}", e);
        return Err(e.to_string());
    }
    install(new_config).map(|_| ())
}

#[command]
pub async fn reset_config() -> Result<RoomCallConfig, String> {
    install(RoomCallConfig::default())
}
