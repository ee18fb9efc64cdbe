// Integration tests for runtime error types

use starling::{ConfigError, SystemError};

#[test]
fn test_config_error_display() {
    let err = ConfigError::Zero("tick");
    assert_eq!(err.to_string(), "Configuration value `tick` must be greater than zero");
}

#[test]
fn test_system_error_display() {
    let err = SystemError::from(ConfigError::Zero("worker_threads"));
    assert_eq!(
        err.to_string(),
        "Invalid configuration: Configuration value `worker_threads` must be greater than zero"
    );

    assert_eq!(SystemError::AlreadyRunning.to_string(), "Actor system is already running");
    assert_eq!(SystemError::ShuttingDown.to_string(), "Actor system is shutting down");

    let err = SystemError::ThreadSetup("resource unavailable".to_string());
    assert_eq!(err.to_string(), "Thread setup error: resource unavailable");

    let err = SystemError::from(anyhow::anyhow!("worker threads panicked: w0"));
    assert_eq!(err.to_string(), "worker threads panicked: w0");
}

#[test]
fn test_error_debug_format() {
    let err = SystemError::AlreadyRunning;
    assert!(format!("{:?}", err).contains("AlreadyRunning"));

    let err = SystemError::Config(ConfigError::Zero("handle_slots"));
    assert!(format!("{:?}", err).contains("handle_slots"));
}
