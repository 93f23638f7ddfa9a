use super::*;
use crate::capability::ExportFragment;
use tempfile::tempdir;

fn fragment(name: &str) -> ExportFragment {
    ExportFragment {
        export_name: name.to_string(),
        file_path: "/repo/vmc-1/0/bck-1.img".to_string(),
        writable: true,
        port: 10809,
    }
}

#[tokio::test]
async fn write_fragment_persists_export_configuration() {
    let dir = tempdir().unwrap();
    let daemon = NbdKitDaemon::new(dir.path(), dir.path().join("nbdkit.pid"));

    daemon.write_fragment(&fragment("backup-vmc1-disk0-abcd1234")).await.unwrap();

    let contents = std::fs::read_to_string(dir.path().join("backup-vmc1-disk0-abcd1234.export")).unwrap();
    assert!(contents.contains("name=backup-vmc1-disk0-abcd1234"));
    assert!(contents.contains("path=/repo/vmc-1/0/bck-1.img"));
    assert!(contents.contains("writable=true"));
    assert!(contents.contains("port=10809"));
}

#[tokio::test]
async fn remove_fragment_deletes_the_file() {
    let dir = tempdir().unwrap();
    let daemon = NbdKitDaemon::new(dir.path(), dir.path().join("nbdkit.pid"));
    daemon.write_fragment(&fragment("backup-vmc1-disk0-abcd1234")).await.unwrap();

    daemon.remove_fragment("backup-vmc1-disk0-abcd1234").await.unwrap();

    assert!(!dir.path().join("backup-vmc1-disk0-abcd1234.export").exists());
}

#[tokio::test]
async fn remove_fragment_missing_file_is_not_an_error() {
    let dir = tempdir().unwrap();
    let daemon = NbdKitDaemon::new(dir.path(), dir.path().join("nbdkit.pid"));

    daemon.remove_fragment("never-existed").await.unwrap();
}

#[tokio::test]
async fn reload_fails_when_pid_file_is_missing() {
    let dir = tempdir().unwrap();
    let daemon = NbdKitDaemon::new(dir.path(), dir.path().join("nbdkit.pid"));

    let result = daemon.reload().await;

    assert!(matches!(result, Err(DaemonError::Io(_))));
}
