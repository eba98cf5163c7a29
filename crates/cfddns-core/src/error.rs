//! Error types for cfddns
//!
//! The taxonomy mirrors how failures propagate through a reconciliation pass:
//! configuration and init failures are fatal, validation and provider errors
//! are isolated to a single record, and IP resolution errors abort one pass.

use std::fmt;
use thiserror::Error;

/// Result type alias for cfddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cfddns
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed desired-record source or daemon settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single desired record cannot be acted on
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport failure while talking to an IP source
    #[error("Network error ({source_name}): {message}")]
    Network {
        /// IP source that was queried
        source_name: String,
        /// Error message
        message: String,
    },

    /// An IP source answered with a body we could not use
    #[error("Parse error ({source_name}): {message}")]
    Parse {
        /// IP source that was queried
        source_name: String,
        /// Error message
        message: String,
    },

    /// Remote DNS provider rejected or failed a call
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Provider client could not be constructed or authenticated
    #[error("Initialization error: {0}")]
    Init(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a network error for the named IP source
    pub fn network(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a parse error for the named IP source
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// The provider error kind, if this is a provider error
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            Self::Provider(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Classification of remote provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// Zone or record does not exist
    NotFound,
    /// Credentials rejected or insufficient permissions
    Unauthorized,
    /// Provider asked us to slow down
    RateLimited,
    /// Anything else, including 5xx and malformed responses
    Other,
}

impl ProviderErrorKind {
    /// Stable lowercase label, used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every [`DnsProviderClient`](crate::traits::DnsProviderClient) call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Provider error ({kind}): {message}")]
pub struct ProviderError {
    /// What went wrong
    pub kind: ProviderErrorKind,
    /// Human readable detail
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    /// Create an authorization error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unauthorized, message)
    }

    /// Create a rate limit error
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    /// Create an unclassified provider error
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    /// Classify an HTTP status code returned by a provider API
    ///
    /// - 401/403: [`ProviderErrorKind::Unauthorized`]
    /// - 404: [`ProviderErrorKind::NotFound`]
    /// - 429: [`ProviderErrorKind::RateLimited`]
    /// - everything else: [`ProviderErrorKind::Other`]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Unauthorized,
            404 => ProviderErrorKind::NotFound,
            429 => ProviderErrorKind::RateLimited,
            _ => ProviderErrorKind::Other,
        };
        Self::new(kind, message)
    }
}
