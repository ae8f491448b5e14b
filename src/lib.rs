//! # asset-scraper
//!
//! Concurrent bulk downloader for versioned assets served through a two-phase
//! redirect protocol.
//!
//! ## Design Philosophy
//!
//! asset-scraper is designed to be:
//! - **Bounded** - A semaphore caps how many resolutions run at once
//! - **Resilient** - Transient failures are retried; one bad item never aborts a run
//! - **Deterministic output** - The index is ordered by item key, not arrival order
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use asset_scraper::{AssetVersions, Config, OutputMode, Scraper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.network.max_concurrent_requests = 8;
//!     config.retry.max_retries = 3;
//!     config.output.mode = OutputMode::FilesAndIndex;
//!
//!     let scraper = Scraper::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = scraper.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = scraper.run(&AssetVersions, "1818").await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Concurrent fetch engine
pub mod downloader;
/// Error types
pub mod error;
/// Output sink and report files
pub mod output;
/// Two-phase content resolution
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Scrape workflow and strategies
pub mod scraper;
/// Core types
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Compression, Config, OutputMode};
pub use downloader::Downloader;
pub use error::{Error, Phase, ResolveError, Result};
pub use output::{FileSink, OutputSink};
pub use resolver::{AssetSource, HttpResolver};
pub use scraper::{AssetVersions, IdList, IdRange, Plan, ScrapeStrategy, Scraper};
pub use types::{
    AssetRef, FailureKind, FetchEvent, ItemKey, ResolvedAsset, ScrapeEvent, Summary, WorkItem,
};
