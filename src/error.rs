/// Error types for every failure domain of the pipeline
use thiserror::Error;

/// Failure to establish (or keep) a broker session.
///
/// Always recovered by the connection supervisor via backoff-retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Socket, DNS or protocol failure
    #[error("network error: {0}")]
    Network(String),

    /// Broker refused our credentials
    #[error("authentication refused: {0}")]
    Auth(String),

    /// No CONNACK (or network response) within the allowed time
    #[error("connection timed out")]
    Timeout,
}

/// Failure to hand an outbound message to the transport.
///
/// Logged and counted, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Request queue full or event loop gone
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Inbound payload could not be turned into a sensor reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// The classifier artifact could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("cannot read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

/// An environment value could not be parsed. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
