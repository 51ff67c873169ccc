#[cfg(test)]
mod commands_room_tests {
    use roomcall::commands::config::{get_config, reset_config, update_config};
    use roomcall::commands::room::{
        get_video_chat_state, join_video_room, leave_video_room, list_video_rooms,
        poll_video_chat_event, toggle_camera, toggle_microphone, MediaMode,
    };
    use roomcall::config::{RoomCallConfig, SignalingMode, CONFIG_PATH_ENV};
    use roomcall::session::{SessionEvent, SessionPhase, ToggleOutcome};
    use std::path::PathBuf;
    use std::sync::Once;

    static SETUP: Once = Once::new();

    fn config_path() -> PathBuf {
        std::env::temp_dir().join(format!("roomcall-commands-{}.toml", std::process::id()))
    }

    // Keep saved configs out of the working tree
    fn setup_config_env() {
        SETUP.call_once(|| std::env::set_var(CONFIG_PATH_ENV, config_path()));
    }

    #[tokio::test]
    async fn test_video_room_lifecycle() {
        setup_config_env();

        let mut config = RoomCallConfig::default();
        config.signaling.mode = SignalingMode::InProcess;
        update_config(config.clone()).await.unwrap();
        assert_eq!(get_config().await.unwrap(), config);
        assert!(config_path().exists());

        let snapshot = join_video_room("cmd-room".to_string(), Some(MediaMode::Synthetic))
            .await
            .unwrap();
        assert_eq!(snapshot.phase, SessionPhase::Joined);
        assert!(snapshot.my_id.is_some());
        assert!(snapshot.video_on && snapshot.mic_on);
        assert!(snapshot.peers.is_empty());
        assert!(snapshot.local_stream.is_some_and(|s| s.audio && s.video));

        let again = join_video_room("cmd-room".to_string(), Some(MediaMode::Synthetic)).await;
        assert!(again.unwrap_err().contains("Already in video room"));
        assert!(list_video_rooms()
            .await
            .unwrap()
            .contains(&"cmd-room".to_string()));

        let outcome = toggle_microphone("cmd-room".to_string()).await.unwrap();
        assert!(matches!(
            outcome,
            ToggleOutcome::Applied { mic_on: false, video_on: true, stream_acquired: true }
        ));
        assert_eq!(
            toggle_camera("cmd-room".to_string()).await.unwrap(),
            ToggleOutcome::Busy
        );

        let mut events = Vec::new();
        while let Some(event) = poll_video_chat_event("cmd-room".to_string()).await.unwrap() {
            events.push(event);
        }
        assert!(events.contains(&SessionEvent::LocalStreamChanged { active: true }));

        let state = get_video_chat_state("cmd-room".to_string()).await.unwrap();
        assert!(!state.mic_on);
        assert!(state.video_on);
        assert_eq!(state.controls.microphone, "🔇");
        assert_eq!(state.notice.as_deref(), Some("Please wait a moment"));

        let left = leave_video_room("cmd-room".to_string()).await.unwrap();
        assert!(left.contains("cmd-room"));
        assert!(!list_video_rooms()
            .await
            .unwrap()
            .contains(&"cmd-room".to_string()));
        assert!(leave_video_room("cmd-room".to_string()).await.is_err());

        let defaults = reset_config().await.unwrap();
        assert_eq!(defaults, RoomCallConfig::default());
        let _ = std::fs::remove_file(config_path());
    }

    #[tokio::test]
    async fn test_commands_on_unknown_room() {
        setup_config_env();

        assert!(toggle_microphone("nowhere".to_string()).await.is_err());
        assert!(get_video_chat_state("nowhere".to_string()).await.is_err());
        assert!(poll_video_chat_event("nowhere".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_applied() {
        setup_config_env();

        let mut bad = RoomCallConfig::default();
        bad.room.home_route = "home".to_string();
        let err = update_config(bad).await.unwrap_err();
        assert!(err.contains("Home route"));
        assert!(get_config().await.unwrap().room.home_route.starts_with('/'));
    }
}
