//! Loading harness configuration from disk.

use authprobe::config::HarnessConfig;
use authprobe::error::ConfigError;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = config_file(
        r#"
tick_ms = 50
settle_ms = 250
sign_out_budget_ticks = 40
linger = true
password = "hunter22"

[loopback]
latency_ms = 5
provider_id = "Example"
"#,
    );

    let config = HarnessConfig::load(file.path()).unwrap();
    assert_eq!(config.tick(), Duration::from_millis(50));
    assert_eq!(config.settle(), Duration::from_millis(250));
    assert_eq!(config.sign_out_budget_ticks, Some(40));
    assert!(config.linger);
    assert_eq!(config.password, "hunter22");
    assert_eq!(config.latency(), Duration::from_millis(5));
    assert_eq!(config.loopback.provider_id, "Example");
}

#[test]
fn test_load_reports_parse_errors_with_path() {
    let file = config_file("tick_ms = \"fast\"");
    let err = HarnessConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn test_load_validates() {
    let file = config_file("tick_ms = 0");
    assert!(matches!(
        HarnessConfig::load(file.path()),
        Err(ConfigError::Invalid(_))
    ));

    let file = config_file("sign_out_budget_ticks = 0");
    assert!(matches!(
        HarnessConfig::load(file.path()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
