//! Core types for asset-scraper

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

static CONTENT_HASH: LazyLock<regex::Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    regex::Regex::new("^[0-9a-fA-F]{32}$").expect("valid content hash pattern")
});

/// What a work item points at on the remote platform
///
/// Ordering places every numeric id before every hash, ids ascending
/// numerically, so index files list ids naturally (`9` before `10`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRef {
    /// Numeric asset id, resolved through the asset delivery endpoint
    Id(i64),
    /// 32-character hex content hash, resolved through the content store endpoint
    Hash(String),
}

impl AssetRef {
    /// Parse one input token: a decimal id or a content hash
    ///
    /// Returns `None` for anything else; surrounding whitespace is ignored.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Ok(id) = token.parse::<i64>() {
            return Some(AssetRef::Id(id));
        }
        if is_content_hash(token) {
            return Some(AssetRef::Hash(token.to_string()));
        }
        None
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetRef::Id(id) => write!(f, "{id}"),
            AssetRef::Hash(hash) => f.write_str(hash),
        }
    }
}

/// Whether `s` looks like a content hash (32 hex characters)
pub fn is_content_hash(s: &str) -> bool {
    CONTENT_HASH.is_match(s)
}

/// Natural sort key of a work item: target, then version
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    /// Remote target
    pub target: AssetRef,
    /// Version number (0 = latest / unversioned)
    pub version: u32,
}

impl ItemKey {
    /// Create a key
    pub fn new(target: AssetRef, version: u32) -> Self {
        Self { target, version }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == 0 {
            write!(f, "{}", self.target)
        } else {
            write!(f, "{} v{}", self.target, self.version)
        }
    }
}

/// One unit of work for the fetch engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Remote target
    pub target: AssetRef,
    /// Version number (0 = latest / unversioned)
    pub version: u32,
    /// Number of retries already performed
    pub retry_count: u32,
}

impl WorkItem {
    /// Create a fresh item with no retries consumed
    pub fn new(target: AssetRef, version: u32) -> Self {
        Self {
            target,
            version,
            retry_count: 0,
        }
    }

    /// Key identifying this item in events and the index
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.target.clone(), self.version)
    }
}

/// Content produced by a successful two-phase resolution
#[derive(Clone, Debug)]
pub struct ResolvedAsset {
    /// Resolved content (CDN) URL
    pub content_url: String,
    /// Raw `Last-Modified` header of the content response
    pub last_modified: String,
    /// Content length in MiB, rounded to 6 decimal places
    pub size_mb: f64,
    /// Asset bytes
    pub content: Bytes,
}

/// Why an item ended in failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input could not be interpreted; no request was made
    InvalidInput,
    /// HTTP 403 outside the version probe
    NotAccessible,
    /// HTTP 409
    Locked,
    /// Transient failures on every permitted attempt
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
    },
    /// Content was fetched but could not be written
    Output,
    /// The engine shut down before the item could be retried
    Cancelled,
}

/// Successful terminal outcome of a work item
#[derive(Clone, Debug)]
pub struct FetchSuccess {
    /// Item key
    pub key: ItemKey,
    /// Resolved asset
    pub asset: ResolvedAsset,
}

/// Failed terminal outcome of a work item
#[derive(Clone, Debug)]
pub struct FetchFailure {
    /// Item key
    pub key: ItemKey,
    /// Failure classification
    pub kind: FailureKind,
    /// Description of the last error
    pub reason: String,
}

/// Notification emitted by the fetch engine
///
/// For every item the engine sends `Finished` followed by exactly one of
/// `Success` or `Failure`.
#[derive(Clone, Debug)]
pub enum FetchEvent {
    /// The item reached its terminal attempt
    Finished {
        /// Item key
        key: ItemKey,
    },
    /// Terminal success
    Success(FetchSuccess),
    /// Terminal failure
    Failure(FetchFailure),
}

/// Final report of a scrape run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Work items in the run, including ones rejected at enumeration
    pub total: usize,
    /// Items fetched (and persisted, when files are written)
    pub downloaded: usize,
    /// Items that failed
    pub errored: usize,
    /// Path of `errors.txt`, if written
    pub errors_file: Option<PathBuf>,
    /// Path of `index.txt`, if written
    pub index_file: Option<PathBuf>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total:      {}", self.total)?;
        writeln!(f, "Downloaded: {}", self.downloaded)?;
        write!(f, "Errors:     {}", self.errored)?;
        if let Some(path) = &self.errors_file {
            write!(f, "\nErrors list: {}", path.display())?;
        }
        if let Some(path) = &self.index_file {
            write!(f, "\nIndex list:  {}", path.display())?;
        }
        Ok(())
    }
}

/// Progress events broadcast to subscribers (progress bars, log sinks)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScrapeEvent {
    /// Enumeration finished and submission is starting
    Started {
        /// Work items in the run
        total: usize,
    },
    /// An item reached a terminal state
    Progress {
        /// Items finished so far
        completed: usize,
        /// Work items in the run
        total: usize,
        /// Failures so far
        errors: usize,
    },
    /// An item was written to disk
    ItemSaved {
        /// Display label
        label: String,
        /// Written path
        path: PathBuf,
    },
    /// An item failed
    ItemFailed {
        /// Display label
        label: String,
        /// Failure classification
        kind: FailureKind,
        /// Failure description
        reason: String,
    },
    /// The run finished and output files were written
    Completed {
        /// Final report
        summary: Summary,
    },
}
