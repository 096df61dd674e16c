//! Integration tests for configuration parsing
//!
//! Checks that the documented configuration layouts parse as TOML with the
//! expected shape.
//!
//! Run with: `cargo test -p daemon --test config_tests`

const MINIMAL_CONFIG: &str = r#"
[daemon]
log_level = "info"
"#;

const FULL_CONFIG: &str = r#"
[daemon]
log_level = "debug"
service_mode = true

[controller]
sync_period_ms = 8
idle_timeout_secs = 300
led_level = 100
enable_gyros = true

[mapper]
log_input = false
"#;

#[test]
fn test_parse_minimal_config() {
    let config: toml::Value = toml::from_str(MINIMAL_CONFIG).unwrap();

    let daemon = config.get("daemon").unwrap();
    assert_eq!(daemon.get("log_level").unwrap().as_str().unwrap(), "info");
    assert!(daemon.get("service_mode").is_none());
    assert!(config.get("controller").is_none());
    assert!(config.get("mapper").is_none());
}

#[test]
fn test_parse_full_config() {
    let config: toml::Value = toml::from_str(FULL_CONFIG).unwrap();

    let daemon = config.get("daemon").unwrap();
    assert_eq!(daemon.get("log_level").unwrap().as_str().unwrap(), "debug");
    assert!(daemon.get("service_mode").unwrap().as_bool().unwrap());

    let controller = config.get("controller").unwrap();
    assert_eq!(
        controller
            .get("sync_period_ms")
            .unwrap()
            .as_integer()
            .unwrap(),
        8
    );
    assert_eq!(
        controller
            .get("idle_timeout_secs")
            .unwrap()
            .as_integer()
            .unwrap(),
        300
    );
    assert_eq!(
        controller.get("led_level").unwrap().as_integer().unwrap(),
        100
    );
    assert!(controller.get("enable_gyros").unwrap().as_bool().unwrap());

    let mapper = config.get("mapper").unwrap();
    assert!(!mapper.get("log_input").unwrap().as_bool().unwrap());
}

#[test]
fn test_invalid_toml_is_rejected() {
    let broken = "[controller\nsync_period_ms = 10";
    assert!(toml::from_str::<toml::Value>(broken).is_err());
}

#[test]
fn test_wrong_value_type() {
    let config: toml::Value = toml::from_str(
        r#"
[controller]
sync_period_ms = "fast"
"#,
    )
    .unwrap();

    let period = config.get("controller").unwrap().get("sync_period_ms").unwrap();
    assert!(period.as_integer().is_none());
    assert_eq!(period.as_str(), Some("fast"));
}
