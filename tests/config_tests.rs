use logtail::config::{generate::generate_starter_config, load_config, ConfigError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    std::env::set_var("LOGTAIL_TOKEN", "generated-token");
    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.cloud.token, "generated-token");
    assert_eq!(config.tail.reference_id, "1");
    assert_eq!(config.tail.tail_from, Duration::from_secs(300));
    assert_eq!(config.retry.attempts, 3);
    assert_eq!(config.pipeline.buffer_limit, 10);

    let tail = config.tail_config();
    assert_eq!(tail.logs_tail_url, "wss://cloudlogs.example.com/api/v1/tail");
    assert_eq!(tail.close_deadline, Duration::from_secs(1));
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_config(&temp_dir.path().join("absent.yml")).unwrap_err();

    match err {
        ConfigError::Io(e) => assert!(e.to_string().contains("absent.yml")),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_invalid_url_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
cloud:
  logs_tail_url: "::not a url::"
  token: abc
tail:
  reference_id: "9"
  tail_from: 30s
"#;
    fs::write(&config_path, config_yaml).unwrap();

    let err = load_config(&config_path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("cloud.logs_tail_url"), "{}", message);
}

#[test]
fn test_bad_duration_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
cloud:
  logs_tail_url: wss://logs.example.com/tail
  token: abc
tail:
  reference_id: "9"
  tail_from: soon
"#;
    fs::write(&config_path, config_yaml).unwrap();

    assert!(matches!(
        load_config(&config_path).unwrap_err(),
        ConfigError::YamlParse(_)
    ));
}
