#[cfg(test)]
mod commands_config_tests {
    use roomcall::commands::config::{get_config, reset_config, update_config};
    use roomcall::config::{RoomCallConfig, CONFIG_PATH_ENV};

    #[tokio::test]
    async fn test_config_changes_are_saved_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings").join("roomcall.toml");
        std::env::set_var(CONFIG_PATH_ENV, &path);

        let mut roomy = RoomCallConfig::default();
        roomy.room.capacity = 6;
        roomy.controls.toggle_cooldown_ms = 500;
        update_config(roomy.clone()).await.unwrap();
        assert_eq!(get_config().await.unwrap(), roomy);
        assert_eq!(RoomCallConfig::load_from_file(&path).unwrap(), roomy);

        // refused updates touch neither memory nor disk
        let mut bad = roomy.clone();
        bad.media.ideal_width = 0;
        assert!(update_config(bad).await.is_err());
        assert_eq!(get_config().await.unwrap(), roomy);
        assert_eq!(RoomCallConfig::load_from_file(&path).unwrap(), roomy);

        let defaults = reset_config().await.unwrap();
        assert_eq!(defaults, RoomCallConfig::default());
        assert_eq!(get_config().await.unwrap(), defaults);
        assert_eq!(RoomCallConfig::load_from_file(&path).unwrap(), defaults);
    }
}
