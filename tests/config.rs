use std::time::Duration;

use assert_matches::assert_matches;

use s3_bank_sync::config::ConfigLoader;
use s3_bank_sync::error::{ErrorKind, SyncError};

#[test]
fn explicit_config_file_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bank-sync.json");
    std::fs::write(
        &path,
        r#"{
            "timeout_secs": 45,
            "region": "eu-west-1",
            "endpoint_url": "http://localhost:9000",
            "workers": 4,
            "upload_timeout_secs": 600,
            "part_size_mib": 16
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();

    assert_eq!(resolved.timeout, Duration::from_secs(45));
    assert_eq!(resolved.workers, 4);
    assert_eq!(resolved.storage.region.as_deref(), Some("eu-west-1"));
    assert_eq!(
        resolved.storage.endpoint_url.as_deref(),
        Some("http://localhost:9000")
    );
    assert_eq!(resolved.storage.timeout, Some(Duration::from_secs(600)));
    assert_eq!(resolved.storage.part_size, 16 * 1024 * 1024);
    assert_eq!(resolved.source.as_deref(), Some(path.as_path()));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();

    assert_matches!(err, SyncError::ConfigRead(_));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bank-sync.json");
    std::fs::write(&path, "{ workers: ").unwrap();

    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();

    assert_matches!(err, SyncError::ConfigParse(_));
}
