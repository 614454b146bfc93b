use thiserror::Error;

/// Main error type for KG Study
#[derive(Error, Debug)]
pub enum KgError {
    /// Remote service unreachable (connection refused, DNS, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured bound
    #[error("Request timed out")]
    Timeout,

    /// Non-success HTTP status from the remote service
    #[error("Request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    /// Response could not be parsed or did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// The remote service reported an `error` job status
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors outside of HTTP responses
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Node not present in the graph
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl KgError {
    /// Short stable label for the error category, used in logs and poller messages.
    pub fn kind(&self) -> &'static str {
        match self {
            KgError::Network(_) => "network",
            KgError::Timeout => "timeout",
            KgError::Http { .. } => "http",
            KgError::Parse(_) | KgError::Json(_) => "parse",
            KgError::Extraction(_) => "extraction",
            KgError::Config(_) => "config",
            KgError::Io(_) => "io",
            KgError::NodeNotFound(_) => "not_found",
            KgError::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<reqwest::Error> for KgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            KgError::Timeout
        } else if e.is_decode() {
            KgError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            KgError::Http {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            KgError::Network(e.to_string())
        }
    }
}

/// Convenient Result type using KgError
pub type Result<T> = std::result::Result<T, KgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KgError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_http_error_display_includes_status() {
        let err = KgError::Http {
            status: 404,
            body: "graph_id not found".to_string(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("graph_id not found"));
        assert_eq!(err.kind(), "http");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let kg_err: KgError = io_err.into();
        assert!(matches!(kg_err, KgError::Io(_)));
    }

    #[test]
    fn test_error_from_json_is_parse_kind() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let kg_err: KgError = json_err.into();
        assert!(matches!(kg_err, KgError::Json(_)));
        assert_eq!(kg_err.kind(), "parse");
    }

    #[test]
    fn test_timeout_kind() {
        assert_eq!(KgError::Timeout.kind(), "timeout");
        assert_eq!(KgError::Timeout.to_string(), "Request timed out");
    }
}
