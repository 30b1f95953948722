use thiserror::Error;

use crate::config::ConfigError;

/// Construction-time error for building an [`crate::ApiClient`] and its ports
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

/// Failure to move bytes over the wire
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Request failed: {url} - {message}")]
    Request { url: String, message: String },
}

impl TransportError {
    /// HTTP status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout { .. } => true,
            TransportError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

/// Response bytes that are not a well-formed XML document
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Response is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Malformed XML response: {0}")]
    Xml(#[from] roxmltree::Error),
}

/// Why an API call could not be completed
#[derive(Error, Debug)]
pub enum CallFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Error returned to callers of [`crate::ApiClient::call`].
///
/// Raised only when the response could not be fetched or parsed. A well-formed
/// payload carrying an `<error>` element is returned as a normal result.
#[derive(Error, Debug)]
#[error("API call {scope}/{operation} could not be completed: {source}")]
pub struct ApiCallError {
    pub scope: String,
    pub operation: String,
    #[source]
    pub source: CallFailure,
}

impl ApiCallError {
    pub fn new(scope: &str, operation: &str, source: impl Into<CallFailure>) -> Self {
        Self {
            scope: scope.to_string(),
            operation: operation.to_string(),
            source: source.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.source, CallFailure::Transport(_))
    }

    pub fn is_parse(&self) -> bool {
        matches!(self.source, CallFailure::Parse(_))
    }
}

/// Cache-specific error types
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache write error: {key} - {details}")]
    WriteError { key: String, details: String },

    #[error("Cache read error: {key} - {details}")]
    ReadError { key: String, details: String },

    #[error("Cache corruption detected: {key} - {details}")]
    Corruption { key: String, details: String },

    #[error("Cache clear failed: {details}")]
    ClearFailed { details: String },
}

/// Archive-specific error types
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive directory creation failed: {path} - {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive write failed: {path} - {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive task failed: {0}")]
    Task(String),
}

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Archive result type alias
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transport_error_display() {
        let status = TransportError::Status {
            url: "https://api.example.com/account/Characters.xml.aspx".to_string(),
            status: 503,
            message: "HTTP 503: Service Unavailable".to_string(),
        };
        assert!(status.to_string().contains("HTTP status error"));
        assert!(status.to_string().contains("503"));
        assert_eq!(status.status(), Some(503));
        assert!(!status.is_timeout());

        let timeout = TransportError::Timeout {
            url: "https://api.example.com/server/ServerStatus.xml.aspx".to_string(),
            timeout_seconds: 5,
        };
        assert!(timeout.to_string().contains("after 5 seconds"));
        assert!(timeout.is_timeout());
        assert_eq!(timeout.status(), None);
    }

    #[test]
    fn test_parse_error_from_roxmltree() {
        let err = roxmltree::Document::parse("<eveapi>").unwrap_err();
        let parse_error: ParseError = err.into();
        assert!(parse_error.to_string().contains("Malformed XML response"));
    }

    #[test]
    fn test_api_call_error_wraps_source() {
        let transport = TransportError::Request {
            url: "https://api.example.com/account/Characters.xml.aspx".to_string(),
            message: "connection refused".to_string(),
        };
        let err = ApiCallError::new("account", "Characters", transport);

        assert!(err.is_transport());
        assert!(!err.is_parse());
        assert!(err.to_string().contains("account/Characters"));
        assert!(err.to_string().contains("connection refused"));

        let source = err.source().unwrap();
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn test_api_call_error_parse_variant() {
        let err = roxmltree::Document::parse("not xml at all <").unwrap_err();
        let call_error = ApiCallError::new("char", "SkillQueue", ParseError::from(err));
        assert!(call_error.is_parse());
        match call_error.source {
            CallFailure::Parse(ParseError::Xml(_)) => (),
            other => panic!("Expected CallFailure::Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_archive_error_source_chain() {
        let err = ArchiveError::Write {
            path: "/tmp/archive/Request.xml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Access denied"),
        };
        assert!(err.to_string().contains("Archive write failed"));
        assert_eq!(err.source().unwrap().to_string(), "Access denied");
    }

    #[test]
    fn test_cache_error_display() {
        let corruption = CacheError::Corruption {
            key: "public/public:account:Characters".to_string(),
            details: "integrity mismatch".to_string(),
        };
        assert!(corruption.to_string().contains("Cache corruption detected"));
        assert!(corruption.to_string().contains("account:Characters"));
    }
}
