//! Configuration management for RoomCall
//!
//! Provides configuration loading, saving, and management for the signaling
//! connection, local media constraints, toggle timing and room limits.

use crate::errors::VideoChatError;
use crate::media::VideoSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "ROOMCALL_CONFIG";
/// Environment variable that overrides the signaling server address
pub const SIGNALING_ADDR_ENV: &str = "ROOMCALL_SIGNALING_ADDR";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCallConfig {
    pub signaling: SignalingConfig,
    pub media: MediaConfig,
    pub controls: ControlsConfig,
    pub room: RoomConfig,
}

/// How the client reaches the signaling hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalingMode {
    /// Process-wide hub, used when every participant lives in one process
    InProcess,
    /// Remote `roomcall-signal` server over TCP
    Tcp,
}

/// Signaling connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingConfig {
    pub mode: SignalingMode,
    /// Address of the signaling server, `host:port`
    pub server_addr: String,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

/// Local media configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Ideal capture width requested from the camera
    pub ideal_width: u32,
    /// Ideal capture height requested from the camera
    pub ideal_height: u32,
}

/// Camera/microphone toggle behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlsConfig {
    /// Time after a renegotiation before another toggle is accepted
    pub toggle_cooldown_ms: u64,
    /// How long a status notice stays visible
    pub notice_duration_ms: u64,
}

/// Room limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum participants per room, enforced by the signaling hub
    pub capacity: usize,
    /// Route the UI navigates to when a room turns out to be full
    pub home_route: String,
}

impl Default for RoomCallConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig {
                mode: SignalingMode::Tcp,
                server_addr: "127.0.0.1:7420".to_string(),
                connect_timeout_ms: 5000,
            },
            media: MediaConfig {
                ideal_width: 1280,
                ideal_height: 720,
            },
            controls: ControlsConfig {
                toggle_cooldown_ms: 2000,
                notice_duration_ms: 1500,
            },
            room: RoomConfig {
                capacity: 4,
                home_route: "/".to_string(),
            },
        }
    }
}

impl SignalingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl MediaConfig {
    pub fn video_size(&self) -> VideoSize {
        VideoSize::new(self.ideal_width, self.ideal_height)
    }
}

impl ControlsConfig {
    pub fn toggle_cooldown(&self) -> Duration {
        Duration::from_millis(self.toggle_cooldown_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}

impl RoomCallConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, VideoChatError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            VideoChatError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: RoomCallConfig = toml::from_str(&contents).map_err(|e| {
            VideoChatError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), VideoChatError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    VideoChatError::ConfigError(format!(
                        "Failed to create config directory: {}",
                        e
                    ))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            VideoChatError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            VideoChatError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Default config file path, `roomcall.toml` unless `ROOMCALL_CONFIG` is set
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("roomcall.toml"))
    }

    /// Load from default location or fall back to defaults, then apply env overrides
    pub fn load_or_default() -> Self {
        let mut config = Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(SIGNALING_ADDR_ENV) {
            if !addr.trim().is_empty() {
                log::debug!("Signaling address overridden by {}: {}", SIGNALING_ADDR_ENV, addr);
                self.signaling.server_addr = addr.trim().to_string();
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), VideoChatError> {
        if self.signaling.mode == SignalingMode::Tcp && self.signaling.server_addr.trim().is_empty() {
            return Err(VideoChatError::ConfigError(
                "Signaling server address is required in tcp mode".to_string(),
            ));
        }
        if self.signaling.connect_timeout_ms == 0 {
            return Err(VideoChatError::ConfigError(
                "Connect timeout must be positive".to_string(),
            ));
        }

        if self.media.ideal_width == 0 || self.media.ideal_height == 0 {
            return Err(VideoChatError::ConfigError(
                "Invalid ideal video size".to_string(),
            ));
        }

        if self.controls.notice_duration_ms == 0 {
            return Err(VideoChatError::ConfigError(
                "Notice duration must be positive".to_string(),
            ));
        }

        if self.room.capacity < 2 {
            return Err(VideoChatError::ConfigError(
                "Room capacity must allow at least 2 participants".to_string(),
            ));
        }
        if !self.room.home_route.starts_with('/') {
            return Err(VideoChatError::ConfigError(
                "Home route must be an absolute path".to_string(),
            ));
        }

        Ok(())
    }
}
