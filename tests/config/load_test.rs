//! Configuration precedence: env vars > TOML file > defaults.

use std::io::Write;

use scoutgate::config::GateConfig;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file should create");
    file.write_all(contents.as_bytes())
        .expect("temp file should write");
    file
}

#[test]
fn file_values_override_defaults() {
    let file = write_config(
        r#"
backend_base_url = "https://engine.example.net"
probe_key = "file-probe-key"
status_poll_interval_secs = 15
"#,
    );

    let config = GateConfig::load_from_path(file.path()).expect("config should load");
    assert_eq!(config.backend_base_url, "https://engine.example.net");
    assert_eq!(config.probe_key.as_deref(), Some("file-probe-key"));
    assert_eq!(config.status_poll_interval_secs, 15);
    // Untouched knobs keep their defaults.
    assert_eq!(config.pause_warning_threshold_secs, 7_200);
}

#[test]
fn env_values_override_file_values() {
    let file = write_config("probe_key = \"file-probe-key\"\n");
    let path = file.path().to_string_lossy().into_owned();

    let config = GateConfig::load_with(move |key| match key {
        "SCOUTGATE_CONFIG_PATH" => Some(path.clone()),
        "SCOUTGATE_PROBE_KEY" => Some("env-probe-key".to_owned()),
        "SCOUTGATE_PAUSE_WARNING_SECS" => Some("600".to_owned()),
        _ => None,
    })
    .expect("config should load");

    assert_eq!(config.probe_key.as_deref(), Some("env-probe-key"));
    assert_eq!(config.pause_warning_threshold_secs, 600);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let config = GateConfig::load_with(|key| {
        (key == "SCOUTGATE_CONFIG_PATH").then(|| "/nonexistent/scoutgate.toml".to_owned())
    })
    .expect("missing file is not an error");

    assert_eq!(config.backend_base_url, "http://127.0.0.1:8000");
    assert!(config.probe_key.is_none());
    assert_eq!(config.status_poll_interval_secs, 60);
}

#[test]
fn invalid_toml_is_an_error() {
    let file = write_config("backend_base_url = [not toml");
    assert!(GateConfig::load_from_path(file.path()).is_err());
}

#[test]
fn duration_helpers_reflect_knobs() {
    let mut config = GateConfig::default();
    config.apply_overrides(|key| match key {
        "SCOUTGATE_TIMEOUT_SECS" => Some("3".to_owned()),
        "SCOUTGATE_PAUSE_WARNING_SECS" => Some("7200".to_owned()),
        _ => None,
    });

    assert_eq!(config.request_timeout(), std::time::Duration::from_secs(3));
    assert_eq!(config.pause_warning_threshold(), chrono::Duration::hours(2));
}
