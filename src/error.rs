//! Error types for asset-scraper
//!
//! Two layers of errors are used by the library:
//! - [`Error`] is the crate-wide error returned by configuration, enumeration and
//!   output operations. A run only ever returns it when the whole request cannot
//!   proceed (unreadable list, malformed range, failed version probe).
//! - [`ResolveError`] describes one failed resolution attempt and the protocol
//!   [`Phase`] it happened in. The fetch engine inspects it to decide whether the
//!   attempt may be retried (see [`crate::retry::IsRetryable`]).

use std::fmt;
use thiserror::Error;

/// Result type alias for asset-scraper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for asset-scraper
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_requests")
        key: Option<String>,
    },

    /// Malformed identifier, list file or range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A resolution request failed in a way that prevents the run from continuing
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed or used
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The admission gate was closed while an item waited for a slot
    #[error("admission gate closed: not accepting new work items")]
    GateClosed,
}

impl Error {
    /// Build a [`Error::Config`] for a specific configuration key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Protocol step during which a resolution failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Id + version request against the asset delivery endpoint
    AssetDelivery,
    /// Hash request against the content store endpoint
    ContentStore,
    /// Download of the resolved content URL
    Content,
    /// Version-count metadata request
    Probe,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::AssetDelivery => "asset delivery",
            Phase::ContentStore => "content store",
            Phase::Content => "content",
            Phase::Probe => "version probe",
        };
        f.write_str(name)
    }
}

/// A single failed resolution attempt
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Transport failure (timeout, connection refused, truncated body, ...)
    #[error("{phase} request failed: {source}")]
    Request {
        /// Phase the request belonged to
        phase: Phase,
        /// Underlying client error
        source: reqwest::Error,
    },

    /// Unexpected HTTP status
    #[error("{phase} request returned status {status}")]
    Status {
        /// Phase the request belonged to
        phase: Phase,
        /// HTTP status code
        status: u16,
    },

    /// HTTP 403: the requested version is unavailable (moderated or deleted)
    #[error("asset is not accessible ({phase} returned 403)")]
    NotAccessible {
        /// Phase the request belonged to
        phase: Phase,
    },

    /// HTTP 409: the asset is locked for the current credentials
    #[error("asset is locked ({phase} returned 409)")]
    Locked {
        /// Phase the request belonged to
        phase: Phase,
    },

    /// A header the protocol relies on was absent
    #[error("{phase} response is missing the {header} header")]
    MissingHeader {
        /// Phase the request belonged to
        phase: Phase,
        /// Header name
        header: &'static str,
    },

    /// A header the protocol relies on could not be interpreted
    #[error("{phase} response has an invalid {header} header: {value:?}")]
    InvalidHeader {
        /// Phase the request belonged to
        phase: Phase,
        /// Header name
        header: &'static str,
        /// Raw header value
        value: String,
    },
}

impl ResolveError {
    /// Phase in which the attempt failed
    pub fn phase(&self) -> Phase {
        match self {
            ResolveError::Request { phase, .. }
            | ResolveError::Status { phase, .. }
            | ResolveError::NotAccessible { phase }
            | ResolveError::Locked { phase }
            | ResolveError::MissingHeader { phase, .. }
            | ResolveError::InvalidHeader { phase, .. } => *phase,
        }
    }

    /// HTTP status code associated with the failure, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ResolveError::Request { source, .. } => source.status().map(|s| s.as_u16()),
            ResolveError::Status { status, .. } => Some(*status),
            ResolveError::NotAccessible { .. } => Some(403),
            ResolveError::Locked { .. } => Some(409),
            ResolveError::MissingHeader { .. } | ResolveError::InvalidHeader { .. } => None,
        }
    }
}
