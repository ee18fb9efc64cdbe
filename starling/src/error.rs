use thiserror::Error;

/// Invalid runtime configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration value `{0}` must be greater than zero")]
    Zero(&'static str),
}

/// Errors related to the actor system itself.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Actor system is already running")]
    AlreadyRunning,
    #[error("Actor system is shutting down")]
    ShuttingDown,
    #[error("Thread setup error: {0}")]
    ThreadSetup(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
