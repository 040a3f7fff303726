//! Integration tests for logging functionality
//!
//! The global subscriber can only be installed once per process, so the
//! initialization checks share one test.

use dhis2sync::config::LoggingConfig;
use dhis2sync::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.local_max_size_mb, 100);

    let console = LoggingConfig::console_only();
    assert!(!console.local_enabled);
}

#[test]
fn test_init_creates_log_directory_once() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
        local_max_size_mb: 10,
    };
    assert!(!log_path.exists());

    assert!(init_logging("loud", &config).is_err());

    let guard = init_logging("debug", &config).unwrap();
    assert!(log_path.is_dir());
    tracing::info!(task_id = "test", "Transfer started");

    let second = init_logging("info", &LoggingConfig::console_only());
    assert!(second.is_err());
    drop(guard);
}
