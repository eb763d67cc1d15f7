use std::fmt;

/// Comprehensive error types for linkprobe operations
#[derive(Debug)]
pub enum LinkProbeError {
    /// IO error (batch persistence, data directory access, etc.)
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// HTTP client error
    Http(reqwest::Error),

    /// JSON serialization error for persisted records
    Json(serde_json::Error),

    /// TOML parsing error
    TomlParsing(toml::de::Error),

    /// Unknown batch id
    BatchNotFound(u64),

    /// Invalid argument error
    InvalidArgument(String),
}

impl fmt::Display for LinkProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkProbeError::Io(err) => write!(f, "IO error: {err}"),
            LinkProbeError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LinkProbeError::Http(err) => write!(f, "HTTP error: {err}"),
            LinkProbeError::Json(err) => write!(f, "JSON error: {err}"),
            LinkProbeError::TomlParsing(err) => write!(f, "TOML parsing error: {err}"),
            LinkProbeError::BatchNotFound(id) => write!(f, "Batch {id} not found"),
            LinkProbeError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for LinkProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkProbeError::Io(err) => Some(err),
            LinkProbeError::Http(err) => Some(err),
            LinkProbeError::Json(err) => Some(err),
            LinkProbeError::TomlParsing(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LinkProbeError {
    fn from(err: std::io::Error) -> Self {
        LinkProbeError::Io(err)
    }
}

impl From<reqwest::Error> for LinkProbeError {
    fn from(err: reqwest::Error) -> Self {
        LinkProbeError::Http(err)
    }
}

impl From<serde_json::Error> for LinkProbeError {
    fn from(err: serde_json::Error) -> Self {
        LinkProbeError::Json(err)
    }
}

impl From<toml::de::Error> for LinkProbeError {
    fn from(err: toml::de::Error) -> Self {
        LinkProbeError::TomlParsing(err)
    }
}

/// Type alias for Results using LinkProbeError
pub type Result<T> = std::result::Result<T, LinkProbeError>;
