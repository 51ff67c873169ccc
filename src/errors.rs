use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoChatError {
    #[error("Media device error: {0}")]
    MediaUnavailable(String),
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Signaling error: {0}")]
    SignalingError(String),
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    #[error("Peer connection error: {0}")]
    PeerError(String),
    #[error("Room {0} is full")]
    RoomFull(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for VideoChatError {
    fn from(e: std::io::Error) -> Self {
        VideoChatError::SignalingError(e.to_string())
    }
}
