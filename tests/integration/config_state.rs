//! Config file parsing and round-tripping.

use std::fs;
use streamcast::config::Config;
use streamcast::engine::types::Protocol;
use tempfile::tempdir;

#[test]
fn default_config_round_trips_through_toml() {
    let config = Config::default();
    let serialized = toml::to_string_pretty(&config).unwrap();
    let restored: Config = toml::from_str(&serialized).unwrap();
    assert_eq!(restored.stream.device, config.stream.device);
    assert_eq!(restored.stream.protocol, config.stream.protocol);
    assert_eq!(restored.engine.retry_max_attempts, config.engine.retry_max_attempts);
}

#[test]
fn hand_written_partial_config_fills_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[stream]
device = "/dev/video2"
protocol = "udp"
server = "10.1.101.210"

[engine]
verify_timeout_ms = 1500
"#,
    )
    .unwrap();

    let config: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(config.stream.device, "/dev/video2");
    assert_eq!(config.stream.protocol, Protocol::Udp);
    assert_eq!(config.stream.server, "10.1.101.210");
    assert_eq!(config.engine.verify_timeout_ms, 1500);
    // Untouched fields come from defaults.
    assert_eq!(config.stream.bitrate_kbps, 2000);
    assert_eq!(config.engine.retry_max_attempts, 5);
}

#[test]
fn unknown_protocol_fails_to_parse() {
    let result: Result<Config, _> = toml::from_str("[stream]\nprotocol = \"srt\"\n");
    assert!(result.is_err());
}

#[test]
fn extra_encoder_args_parse_from_config() {
    let config: Config = toml::from_str(
        "[engine]\nextra_encoder_args = \"qp-range=20,40 profile=high\"\n",
    )
    .unwrap();
    let props = config.engine.extra_encoder_props().unwrap();
    assert_eq!(
        props,
        vec![
            ("qp-range".to_string(), "20,40".to_string()),
            ("profile".to_string(), "high".to_string()),
        ]
    );
}
