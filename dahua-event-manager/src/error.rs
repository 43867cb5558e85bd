use thiserror::Error;

use dahua_stream::{ConfigError, StreamError, TransportError};

/// Errors that can occur in the Dahua Event Manager
#[derive(Error, Debug)]
pub enum EventManagerError {
    /// `start()` was called on a manager that has already been started
    #[error("Event manager has already been started")]
    AlreadyStarted,

    /// Configuration rejected before the worker was spawned
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// HTTP transport could not be created
    #[error("Failed to create transport: {0}")]
    Transport(#[from] TransportError),

    /// The worker's tokio runtime could not be built
    #[error("Failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The worker thread could not be spawned
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The worker thread panicked
    #[error("Event worker panicked")]
    WorkerPanicked,
}

impl From<StreamError> for EventManagerError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Config(e) => EventManagerError::Config(e),
            StreamError::Transport(e) => EventManagerError::Transport(e),
        }
    }
}

/// Result type for Event Manager operations
pub type Result<T> = std::result::Result<T, EventManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            EventManagerError::AlreadyStarted.to_string(),
            "Event manager has already been started"
        );

        let error = EventManagerError::ThreadSpawn(std::io::Error::new(
            std::io::ErrorKind::Other,
            "resource temporarily unavailable",
        ));
        assert_eq!(
            error.to_string(),
            "Failed to spawn worker thread: resource temporarily unavailable"
        );
    }

    #[test]
    fn test_stream_error_is_flattened() {
        let stream_error: StreamError =
            ConfigError::InvalidSetting("idle_sleep must be greater than 0".to_string()).into();
        let error: EventManagerError = stream_error.into();
        assert!(matches!(error, EventManagerError::Config(_)));
    }
}
