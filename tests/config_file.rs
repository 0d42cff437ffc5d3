use std::time::Duration;

use efd_client::{ClientConfig, Error, FallbackInterval, TimeScale};
use tempfile::tempdir;

#[test]
fn loads_config_from_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("efd.json");
    std::fs::write(
        &path,
        r#"{
            "database": "efd_usdf",
            "index_scale": "tai",
            "use_old_indexing": true,
            "fallback": {"type": "fixed", "nanos": 20000000},
            "rendezvous_tolerance_secs": 60,
            "workers": 2
        }"#,
    )
    .expect("write config");

    let config = ClientConfig::from_json_path(&path).expect("config");
    assert_eq!(config.database, "efd_usdf");
    assert_eq!(config.retention_policy, "autogen");
    assert_eq!(config.index_scale, TimeScale::Tai);
    assert!(config.use_old_indexing);
    assert_eq!(config.fallback, FallbackInterval::fixed(Duration::from_millis(20)));
    assert_eq!(config.rendezvous_tolerance(), Duration::from_secs(60));
    assert_eq!(config.workers, 2);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().expect("tempdir");
    let err = ClientConfig::from_json_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn malformed_file_is_a_json_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{ database = efd }").expect("write config");
    let err = ClientConfig::from_json_path(&path).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}
