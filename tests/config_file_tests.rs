//! Loading pipeline settings from INI files.

use std::io::Write;
use std::time::Duration;

use femtotrack::{ConfigError, PipelineConfig, TrackerClient};
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;

#[fixture]
fn ini_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        "[pipeline]\n\
         endpoint = https://collector.example/\n\
         website_id = site-file\n\
         max_retries = 5\n\
         request_timeout_ms = 2500\n\
         worker_count = 2\n\
         cache_sentinel ="
    )
    .expect("write config");
    file
}

#[rstest]
fn loads_settings_from_disk(ini_file: NamedTempFile) {
    let config = PipelineConfig::from_ini_file(ini_file.path()).expect("config");

    assert_eq!(config.send_url(), "https://collector.example/api/send");
    assert_eq!(config.website_id, "site-file");
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.request_timeout, Duration::from_millis(2_500));
    assert_eq!(config.worker_count, 2);
    assert!(config.cache_sentinel.is_none());
    assert_eq!(config.max_queue_depth, femtotrack::DEFAULT_MAX_QUEUE_DEPTH);
}

#[rstest]
fn client_can_be_built_from_file(ini_file: NamedTempFile) {
    let client = TrackerClient::from_ini_file(ini_file.path()).expect("client");
    assert_eq!(client.config().website_id, "site-file");
    assert!(!client.is_initialized());
}

#[rstest]
fn invalid_file_contents_are_reported() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "[pipeline]\nendpoint = http://x\nwebsite_id =\n").expect("write config");

    let err = PipelineConfig::from_ini_file(file.path()).expect_err("must fail");
    assert!(matches!(err, ConfigError::InvalidConfig(_)), "unexpected error: {err}");
}
