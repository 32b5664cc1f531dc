use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-wide status of the generation stream, driven by the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Idle; the last stream settled
    #[default]
    Ready,
    /// A request was sent, nothing has arrived yet
    Submitted,
    /// Parts are arriving
    Streaming,
    /// The stream failed; an error value accompanies this status
    Errored,
}

impl StreamStatus {
    pub const VALUES: &[StreamStatus] =
        &[StreamStatus::Ready, StreamStatus::Submitted, StreamStatus::Streaming, StreamStatus::Errored];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Ready => "ready",
            StreamStatus::Submitted => "submitted",
            StreamStatus::Streaming => "streaming",
            StreamStatus::Errored => "errored",
        }
    }

    /// Submitted or streaming.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, StreamStatus::Submitted | StreamStatus::Streaming)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StreamStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ready" => Ok(StreamStatus::Ready),
            "submitted" => Ok(StreamStatus::Submitted),
            "streaming" => Ok(StreamStatus::Streaming),
            "errored" | "error" => Ok(StreamStatus::Errored),
            _ => Err(crate::Error::Parse(format!("invalid stream status: {}", s))),
        }
    }
}

/// Error value surfaced by the generation backend alongside [`StreamStatus::Errored`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    pub message: String,
}

impl StreamError {
    /// Wrap a backend error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StreamError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_stream_status_from_str() {
        assert_eq!(StreamStatus::from_str("ready").unwrap(), StreamStatus::Ready);
        assert_eq!(StreamStatus::from_str("SUBMITTED").unwrap(), StreamStatus::Submitted);
        assert_eq!(StreamStatus::from_str("Streaming").unwrap(), StreamStatus::Streaming);
        assert_eq!(StreamStatus::from_str("error").unwrap(), StreamStatus::Errored);
        assert!(StreamStatus::from_str("paused").is_err());
    }

    #[test]
    fn test_stream_status_round_trips_through_display() {
        for status in StreamStatus::VALUES {
            assert_eq!(StreamStatus::from_str(&status.to_string()).unwrap(), *status);
        }
    }

    #[test]
    fn test_in_flight() {
        assert!(StreamStatus::Submitted.is_in_flight());
        assert!(StreamStatus::Streaming.is_in_flight());
        assert!(!StreamStatus::Ready.is_in_flight());
        assert!(!StreamStatus::Errored.is_in_flight());
    }

    #[test]
    fn test_stream_error_display() {
        assert_eq!(StreamError::new("rate limited").to_string(), "rate limited");
    }
}
