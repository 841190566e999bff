use powershop_nz::config::{Config, PASSWORD_ENV, USERNAME_ENV};
use powershop_nz::error::PowershopError;
use std::fs;

fn valid() -> Config {
    let mut cfg = Config::default();
    cfg.credentials.username = "user@example.com".into();
    cfg.credentials.password = "secret".into();
    cfg
}

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = valid();
    cfg.report.window_days = 14;
    cfg.output.snapshot_path = Some(tmp_dir.path().join("latest.json").to_string_lossy().to_string());
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.report.window_days, 14);
    assert_eq!(loaded.credentials.username, "user@example.com");
    assert_eq!(loaded.output.snapshot_path, cfg.output.snapshot_path);
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn partial_yaml_fills_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "credentials:\n  username: me@example.com\n  password: pw\nweb:\n  timeout_seconds: 45\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();

    assert_eq!(cfg.web.timeout_seconds, 45);
    assert_eq!(cfg.web.base_url, "https://secure.powershop.co.nz");
    assert_eq!(cfg.api.timeout_seconds, 10);
    assert_eq!(cfg.api.client_version, "1.68.5");
    assert!(cfg.report.enabled);
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    // Missing credentials
    let err = Config::default().validate().unwrap_err();
    assert!(matches!(err, PowershopError::Validation { ref field, .. } if field == "credentials.username"));

    let mut cfg = valid();
    cfg.credentials.password.clear();
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.api.base_url = "not a url".into();
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.api.timeout_seconds = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.usage_window_days = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.max_concurrent_fetches = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.poll_interval_seconds = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.timezone = "Middle/Earth".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn env_overrides_replace_credentials() {
    let mut cfg = valid();
    cfg.apply_overrides_from(|key| match key {
        USERNAME_ENV => Some("env@example.com".into()),
        PASSWORD_ENV => Some(String::new()),
        _ => None,
    });
    assert_eq!(cfg.credentials.username, "env@example.com");
    // Empty values are ignored
    assert_eq!(cfg.credentials.password, "secret");
}

#[test]
fn password_is_not_in_debug_output() {
    let cfg = valid();
    let debug = format!("{:?}", cfg);
    assert!(!debug.contains("secret\""));
    assert!(debug.contains("<redacted>"));
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}
