//! Error types for the dahua-stream crate.
//!
//! Transport problems on a live connection are not errors in this sense:
//! they are reported through [`crate::transport::TransportEvent::Failed`]
//! and handled by the supervisor. The types here cover setup.

/// Errors in device and watcher configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// YAML configuration could not be deserialized
    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON configuration could not be deserialized
    #[error("Failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A watcher setting is out of range
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// The event URL for a device could not be built
    #[error("Invalid event URL for host {host}: {source}")]
    InvalidUrl {
        /// Host as configured
        host: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors creating the HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

/// Errors interpreting a Digest authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// The header does not use the Digest scheme
    #[error("Challenge is not a Digest challenge")]
    NotDigest,

    /// A required challenge parameter is absent
    #[error("Digest challenge is missing {0}")]
    MissingParameter(&'static str),

    /// The challenge asks for an algorithm we do not implement
    #[error("Unsupported Digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The challenge offers no quality of protection we implement
    #[error("Unsupported Digest qop: {0}")]
    UnsupportedQop(String),
}

/// Top-level error for the crate.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidSetting("reconnect_delay must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid setting: reconnect_delay must be greater than 0"
        );

        let error = ConfigError::InvalidUrl {
            host: "bad host".to_string(),
            source: url::ParseError::InvalidDomainCharacter,
        };
        assert!(error.to_string().contains("bad host"));
    }

    #[test]
    fn test_digest_error_display() {
        assert_eq!(
            DigestError::MissingParameter("nonce").to_string(),
            "Digest challenge is missing nonce"
        );
        assert_eq!(
            DigestError::UnsupportedAlgorithm("SHA-512-256".to_string()).to_string(),
            "Unsupported Digest algorithm: SHA-512-256"
        );
    }

    #[test]
    fn test_error_conversion_from_config_error() {
        let error: StreamError = ConfigError::InvalidSetting("x".to_string()).into();
        match error {
            StreamError::Config(e) => assert_eq!(e.to_string(), "Invalid setting: x"),
            _ => panic!("Expected Config variant"),
        }
    }
}
