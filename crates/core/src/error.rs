use thiserror::Error;

pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading error: {0}")]
    Load(#[from] config::ConfigError),

    /// The serialized action list attached to a record is not valid JSON.
    #[error("Invalid action list: {0}")]
    InvalidActions(#[source] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Capability unavailable: {0}")]
    Unsupported(&'static str),
}
