//! Configuration file round-trips and resolution.

use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;
use std::fs;
use synclink::config::{
    resolve_config_path, ConfigError, ConfigLoader, LogFormat, PortProfile,
};
use synclink::settings::{Crc, Defaults, Encoding, Interface, Protocol, Settings};
use tempfile::TempDir;

fn uplink() -> PortProfile {
    PortProfile {
        port: "MGHDLC1".to_string(),
        settings: Some(Settings {
            protocol: Protocol::Hdlc,
            encoding: Encoding::NrziSpace,
            crc: Crc::Crc32,
            internal_clock_rate: 64_000,
            ..Settings::default()
        }),
        defaults: Some(Defaults {
            interface: Interface::V35,
            ..Defaults::default()
        }),
    }
}

#[test]
#[serial]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("synclink.toml");

    let mut loader = ConfigLoader::with_defaults();
    loader
        .config_mut()
        .ports
        .insert("uplink".to_string(), uplink());
    loader.config_mut().logging.format = LogFormat::Json;
    loader.save_to(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("encoding = \"nrzi_space\""));
    assert!(text.contains("interface = \"v35\""));

    let loaded = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(loaded.config(), loader.config());
}

#[test]
#[serial]
fn test_reload_picks_up_changes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("synclink.toml");
    fs::write(&path, "[session]\nwait_timeout_ms = 100\n").unwrap();

    let mut loader = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(loader.config().session.wait_timeout_ms, Some(100));

    fs::write(&path, "[session]\nwait_timeout_ms = 200\nblocked_io = false\n").unwrap();
    loader.reload().unwrap();
    assert_eq!(loader.config().session.wait_timeout_ms, Some(200));
    assert!(!loader.config().session.blocked_io);

    loader.config_mut().session.wait_timeout_ms = Some(300);
    loader.save().unwrap();
    let again = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(again.config().session.wait_timeout_ms, Some(300));
}

#[test]
#[serial]
fn test_explicit_path_from_env() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    env::set_var("MGSL_CONFIG", &path);
    assert_eq!(resolve_config_path(), Some(path.clone()));
    let loader = ConfigLoader::load().unwrap();
    assert_eq!(loader.config_path, Some(path));
    assert_eq!(loader.config().logging.level, "debug");
    env::remove_var("MGSL_CONFIG");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("synclink.toml");
    fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

    env::set_var("MGSL_LOG_LEVEL", "trace");
    let loader = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(loader.config().logging.level, "trace");
    env::remove_var("MGSL_LOG_LEVEL");
}

#[test]
#[serial]
fn test_errors() {
    let dir = TempDir::new().unwrap();

    let missing = ConfigLoader::load_from(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::ReadError { .. }));

    let path = dir.path().join("bad.toml");
    fs::write(&path, "[ports.x.settings]\nencoding = \"morse\"\n").unwrap();
    let bad = ConfigLoader::load_from(&path).unwrap_err();
    assert!(matches!(bad, ConfigError::ParseError(_)));
    assert!(bad.to_string().contains("unknown encoding 'morse'"));

    let unsaved = ConfigLoader::with_defaults();
    assert!(matches!(
        unsaved.save(),
        Err(ConfigError::MissingRequired(_))
    ));
}
