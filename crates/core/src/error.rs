use thiserror::Error;

/// Result type alias for threadline-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types shared by the transcript coordinator and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading a config or script file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or logging setup
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed JSON or an unknown enum name
    #[error("parse error: {0}")]
    Parse(String),

    /// Persistence collaborator rejected a request
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Generation collaborator rejected a request
    #[error("generation error: {0}")]
    Generation(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
