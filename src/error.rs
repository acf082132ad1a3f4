use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// The Error type for worker operations.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// Broker connect/channel failures. The consumer retries these forever;
    /// the producer surfaces them to the caller.
    #[error("Broker connection error: {0}")]
    ConnectionError(String),

    /// Malformed inbound payload. No response is sent for these; the
    /// delivery is rejected so queue policy (dead-letter or drop) applies.
    #[error("Invalid request payload: {0}")]
    ParseError(String),

    #[error("Document store error: {0}")]
    StoreError(String),

    #[error("Text extraction error: {0}")]
    ExtractionError(String),

    #[error("Question generation error: {0}")]
    GenerationError(String),

    #[error("Response publish error: {0}")]
    PublishError(String),

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },
}

// We could implement From<lapin::Error> here, but since lapin::Error doesn't
// directly implement std::error::Error sometimes, mapping it where it occurs
// and converting to a String might be more straightforward for now.
impl From<lapin::Error> for WorkerError {
    fn from(err: lapin::Error) -> Self {
        WorkerError::ConnectionError(err.to_string())
    }
}
