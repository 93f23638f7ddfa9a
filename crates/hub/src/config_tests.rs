use super::*;

#[test]
fn defaults_have_no_repositories_and_local_kind() {
    let config = HubConfig::default();
    assert!(config.repositories.is_empty());
    assert_eq!(config.max_chain_depth, 64);
    assert_eq!(config.log_channel_capacity, 1024);
    assert_eq!(config.export_port, sendense_export::DEFAULT_EXPORT_PORT);
}

#[test]
fn load_rejects_missing_config_file_with_no_repositories() {
    let dir = tempfile::tempdir().unwrap();
    let result = HubConfig::load(&dir.path().join("missing.toml"));
    assert!(matches!(result, Err(ConfigError::NoRepositories)));
}

#[test]
fn load_parses_a_minimal_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hub.toml");
    std::fs::write(
        &path,
        r#"
        state_dir = "/tmp/sendense-test"
        http_addr = "127.0.0.1:9999"

        [repositories.primary]
        path = "/tmp/sendense-test/primary"
        "#,
    )
    .unwrap();

    let config = HubConfig::load(&path).unwrap();

    assert_eq!(config.http_addr, "127.0.0.1:9999");
    assert_eq!(config.repositories.len(), 1);
    let repo = &config.repositories["primary"];
    assert_eq!(repo.kind, sendense_repository::RepositoryKind::Local);
    assert_eq!(repo.path, std::path::PathBuf::from("/tmp/sendense-test/primary"));
}

#[test]
fn derived_paths_nest_under_state_dir() {
    let mut config = HubConfig::default();
    config.state_dir = std::path::PathBuf::from("/var/lib/sendense");

    assert_eq!(config.wal_path(), std::path::PathBuf::from("/var/lib/sendense/wal/events.wal"));
    assert_eq!(config.snapshot_path(), std::path::PathBuf::from("/var/lib/sendense/snapshot.json"));
    assert_eq!(config.export_root(), std::path::PathBuf::from("/var/lib/sendense/exports"));
    assert_eq!(config.lock_path(), std::path::PathBuf::from("/var/lib/sendense/hub.pid"));
}
