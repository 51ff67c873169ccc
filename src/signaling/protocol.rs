use crate::errors::VideoChatError;
use serde_json::Value;

pub const JOIN_ROOM: &str = "join-room";
pub const USER_CONNECTED: &str = "user-connected";
pub const USER_DISCONNECTED: &str = "user-disconnected";
pub const FULL: &str = "full";

/// Longest frame either side accepts; a peer sending more is dropped
pub const MAX_FRAME_LEN: usize = 16 * 1024;

/// Frames sent by a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    JoinRoom { room: String, peer_id: String },
}

/// Frames sent by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    UserConnected(String),
    UserDisconnected(String),
    Full,
}

/// Split `["name", args...]` into its name and arguments
fn split_frame(frame: &str) -> Result<(String, Vec<Value>), VideoChatError> {
    let value: Value = serde_json::from_str(frame)
        .map_err(|e| VideoChatError::ProtocolError(format!("Invalid frame: {}", e)))?;

    let Value::Array(mut items) = value else {
        return Err(VideoChatError::ProtocolError(
            "Frame must be a JSON array".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(VideoChatError::ProtocolError("Empty frame".to_string()));
    }

    match items.remove(0) {
        Value::String(name) => Ok((name, items)),
        other => Err(VideoChatError::ProtocolError(format!(
            "Event name must be a string, got {}",
            other
        ))),
    }
}

fn string_arg(args: &[Value], index: usize, event: &str) -> Result<String, VideoChatError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        // room numbers are commonly sent as bare numbers
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(VideoChatError::ProtocolError(format!(
            "'{}' expects a string argument at position {}",
            event, index
        ))),
    }
}

impl ClientMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => JOIN_ROOM,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ClientMessage::JoinRoom { room, peer_id } => {
                serde_json::json!([JOIN_ROOM, room, peer_id]).to_string()
            }
        }
    }

    pub fn decode(frame: &str) -> Result<Self, VideoChatError> {
        let (name, args) = split_frame(frame)?;
        match name.as_str() {
            JOIN_ROOM => Ok(ClientMessage::JoinRoom {
                room: string_arg(&args, 0, JOIN_ROOM)?,
                peer_id: string_arg(&args, 1, JOIN_ROOM)?,
            }),
            other => Err(VideoChatError::ProtocolError(format!(
                "Unknown client event '{}'",
                other
            ))),
        }
    }
}

impl ServerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::UserConnected(_) => USER_CONNECTED,
            ServerEvent::UserDisconnected(_) => USER_DISCONNECTED,
            ServerEvent::Full => FULL,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            ServerEvent::UserConnected(id) => serde_json::json!([USER_CONNECTED, id]),
            ServerEvent::UserDisconnected(id) => serde_json::json!([USER_DISCONNECTED, id]),
            ServerEvent::Full => serde_json::json!([FULL]),
        }
        .to_string()
    }

    pub fn decode(frame: &str) -> Result<Self, VideoChatError> {
        let (name, args) = split_frame(frame)?;
        match name.as_str() {
            USER_CONNECTED => Ok(ServerEvent::UserConnected(string_arg(&args, 0, USER_CONNECTED)?)),
            USER_DISCONNECTED => Ok(ServerEvent::UserDisconnected(string_arg(
                &args,
                0,
                USER_DISCONNECTED,
            )?)),
            FULL => Ok(ServerEvent::Full),
            other => Err(VideoChatError::ProtocolError(format!(
                "Unknown server event '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn join_room_wire_shape() {
        let msg = ClientMessage::JoinRoom {
            room: "42".to_string(),
            peer_id: "abc".to_string(),
        };
        assert_eq!(msg.encode(), r#"["join-room","42","abc"]"#);
    }

    #[test]
    fn numeric_room_is_accepted() {
        let msg = ClientMessage::decode(r#"["join-room", 7, "peer"]"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room: "7".to_string(),
                peer_id: "peer".to_string()
            }
        );
    }

    #[test]
    fn full_has_no_arguments() {
        assert_eq!(ServerEvent::Full.encode(), r#"["full"]"#);
        assert_eq!(ServerEvent::decode(r#"["full"]"#).unwrap(), ServerEvent::Full);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        for frame in [
            "",
            "{}",
            "[]",
            "[1, 2]",
            r#"["join-room", "only-room"]"#,
            r#"["user-connected"]"#,
            r#"["chat", "hi"]"#,
        ] {
            let client = ClientMessage::decode(frame);
            let server = ServerEvent::decode(frame);
            assert!(
                client.is_err() && server.is_err(),
                "frame {:?} should be rejected",
                frame
            );
        }
    }

    #[test]
    fn event_names_match_encoding() {
        let ev = ServerEvent::UserDisconnected("p".to_string());
        assert!(ev.encode().starts_with(&format!("[\"{}\"", ev.event_name())));
    }

    proptest! {
        #[test]
        fn presence_events_survive_encoding(id in "\\PC{1,40}") {
            let ev = ServerEvent::UserConnected(id.clone());
            prop_assert_eq!(ServerEvent::decode(&ev.encode()).unwrap(), ev);
        }
    }
}
