//! Scrape workflow — enumerate work, drive the fetch engine, aggregate results.
//!
//! A [`ScrapeStrategy`] turns the user's input into a [`Plan`] and decides how
//! items are named on disk and in reports. [`Scraper::run`] does the rest:
//!
//! 1. Enumerate the plan; only enumeration failures abort a run.
//! 2. Submit every item to a [`Downloader`] while a single aggregation loop
//!    consumes its outcome channel.
//! 3. Persist successes, collect failures, and build the ordered index.
//! 4. Write `errors.txt` / `index.txt` and return a [`Summary`].

pub mod asset;
pub mod list;
pub mod range;

mod progress;


pub use asset::AssetVersions;
pub use list::IdList;
pub use range::IdRange;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::Result;
use crate::output::{ERRORS_FILE, FileSink, INDEX_FILE, OutputSink, parse_http_date, write_lines};
use crate::resolver::{AssetSource, HttpResolver};
use crate::types::{
    FailureKind, FetchEvent, FetchFailure, FetchSuccess, ItemKey, ScrapeEvent, Summary, WorkItem,
};

use progress::{ProgressState, index_line};

/// Capacity of the progress broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// An input entry that could not become a work item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejected {
    /// Label reported in `errors.txt`
    pub label: String,
    /// Failure classification
    pub kind: FailureKind,
    /// Why it was rejected
    pub reason: String,
}

/// Items of a [`Plan`], produced as the fetch engine admits them
pub type WorkItems = Box<dyn Iterator<Item = WorkItem> + Send>;

/// Work produced by [`ScrapeStrategy::enumerate`]
pub struct Plan {
    /// Items to submit to the fetch engine, pulled one at a time
    pub items: WorkItems,
    /// Number of items `items` yields
    pub item_count: usize,
    /// Entries that count as failures without any network call
    pub rejected: Vec<Rejected>,
    /// Leading index row, written only alongside at least one fetched item
    pub index_header: Option<(ItemKey, String)>,
}

impl Plan {
    /// Plan over items that are already materialized
    pub fn from_items(items: Vec<WorkItem>) -> Self {
        let item_count = items.len();
        Self::lazy(items.into_iter(), item_count)
    }

    /// Plan over `item_count` items generated on demand
    pub fn lazy<I>(items: I, item_count: usize) -> Self
    where
        I: Iterator<Item = WorkItem> + Send + 'static,
    {
        Self {
            items: Box::new(items),
            item_count,
            rejected: Vec::new(),
            index_header: None,
        }
    }

    /// Total work items, including rejected entries
    pub fn total(&self) -> usize {
        self.item_count + self.rejected.len()
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::from_items(Vec::new())
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("item_count", &self.item_count)
            .field("rejected", &self.rejected)
            .field("index_header", &self.index_header)
            .finish_non_exhaustive()
    }
}

/// One way of turning user input into work items
#[async_trait::async_trait]
pub trait ScrapeStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Turn `input` into a plan, probing the source where needed
    async fn enumerate(
        &self,
        input: &str,
        source: &dyn AssetSource,
        config: &Config,
    ) -> Result<Plan>;

    /// Output path of `key`, relative to the output directory and without suffixes
    fn file_stem(&self, key: &ItemKey) -> PathBuf;

    /// How `key` appears in the error log, the index and events
    fn label(&self, key: &ItemKey) -> String;

    /// Whether this strategy can produce an index
    fn supports_index(&self) -> bool {
        true
    }

    /// Output directory used when none is configured
    fn default_output_dir(&self, input: &str) -> PathBuf;
}

/// Runs scrape strategies against a configured source and sink
pub struct Scraper {
    config: Config,
    source: Arc<dyn AssetSource>,
    /// Overrides the per-run [`FileSink`]
    sink: Option<Arc<dyn OutputSink>>,
    event_tx: broadcast::Sender<ScrapeEvent>,
}

impl Scraper {
    /// Create a scraper talking HTTP to the configured endpoints
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = Arc::new(HttpResolver::new(&config.network)?);
        Ok(Self::with_source(config, source))
    }

    /// Create a scraper resolving through `source`
    pub fn with_source(config: Config, source: Arc<dyn AssetSource>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            source,
            sink: None,
            event_tx,
        }
    }

    /// Persist fetched content through `sink` instead of the output directory
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Subscribe to progress events
    ///
    /// Slow subscribers may miss events; see [`broadcast`] lag semantics.
    pub fn subscribe(&self) -> broadcast::Receiver<ScrapeEvent> {
        self.event_tx.subscribe()
    }

    /// Configuration of this scraper
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory a run of `strategy` on `input` writes to
    pub fn output_dir(&self, strategy: &dyn ScrapeStrategy, input: &str) -> PathBuf {
        self.config
            .output
            .output_dir
            .clone()
            .unwrap_or_else(|| strategy.default_output_dir(input))
    }

    fn emit(&self, event: ScrapeEvent) {
        // send() returns Err if there are no receivers, which is fine
        self.event_tx.send(event).ok();
    }

    /// Run `strategy` on `input` to completion
    ///
    /// Per-item failures are collected in the summary and `errors.txt`; an error
    /// is returned only when the input cannot be enumerated or the reports
    /// cannot be written.
    pub async fn run(&self, strategy: &dyn ScrapeStrategy, input: &str) -> Result<Summary> {
        let mode = self.config.output.mode;
        let writes_index = mode.writes_index() && strategy.supports_index();
        if mode.writes_index() && !strategy.supports_index() {
            if !mode.writes_files() {
                tracing::warn!(
                    strategy = strategy.name(),
                    mode = ?mode,
                    "strategy does not support an index and no files were requested; nothing to do"
                );
                let summary = Summary::default();
                self.emit(ScrapeEvent::Completed {
                    summary: summary.clone(),
                });
                return Ok(summary);
            }
            tracing::warn!(
                strategy = strategy.name(),
                mode = ?mode,
                "strategy does not support an index; no index will be written"
            );
        }

        let plan = strategy
            .enumerate(input, self.source.as_ref(), &self.config)
            .await?;

        let out = self.output_dir(strategy, input);
        tokio::fs::create_dir_all(&out).await?;
        let sink: Arc<dyn OutputSink> = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(FileSink::new(&out, &self.config.output)),
        };

        let total = plan.total();
        let Plan {
            items,
            rejected,
            index_header,
            ..
        } = plan;
        let mut state = ProgressState::new(total);

        tracing::info!(
            strategy = strategy.name(),
            input,
            total,
            output = %out.display(),
            "starting scrape"
        );
        self.emit(ScrapeEvent::Started { total });

        for entry in rejected {
            self.record_failure(&mut state, entry.label, entry.kind, entry.reason);
        }

        let (downloader, mut outcomes) = Downloader::new(Arc::clone(&self.source), &self.config);

        // The downloader is dropped when submission ends, so the outcome channel
        // closes once the last item task finishes.
        let submit = async move {
            for item in items {
                downloader.enqueue(item.target, item.version).await?;
            }
            tracing::debug!(peak_in_flight = downloader.peak_in_flight(), "all items submitted");
            Ok::<_, crate::error::Error>(())
        };

        let aggregate = async {
            while !state.is_done() {
                let Some(event) = outcomes.recv().await else {
                    break;
                };
                match event {
                    FetchEvent::Finished { key } => {
                        tracing::debug!(asset = %key, "item finished");
                    }
                    FetchEvent::Success(success) => {
                        self.on_success(strategy, sink.as_ref(), writes_index, &mut state, success)
                            .await;
                    }
                    FetchEvent::Failure(failure) => self.on_failure(strategy, &mut state, failure),
                }
            }
        };

        let (submitted, ()) = tokio::join!(submit, aggregate);
        submitted?;

        if !state.is_done() {
            tracing::warn!(
                completed = state.completed,
                total,
                "outcome channel closed before every item reported"
            );
        }

        self.finalize(&out, writes_index, index_header, state).await
    }

    async fn on_success(
        &self,
        strategy: &dyn ScrapeStrategy,
        sink: &dyn OutputSink,
        writes_index: bool,
        state: &mut ProgressState,
        success: FetchSuccess,
    ) {
        let FetchSuccess { key, asset } = success;
        let label = strategy.label(&key);

        if self.config.output.mode.writes_files() {
            let stem = strategy.file_stem(&key);
            let modified = parse_http_date(&asset.last_modified);
            match sink.save(&stem, asset.content.clone(), modified).await {
                Ok(path) => {
                    tracing::debug!(asset = %key, path = %path.display(), "saved");
                    self.emit(ScrapeEvent::ItemSaved { label: label.clone(), path });
                }
                Err(e) => {
                    self.record_failure(
                        state,
                        label,
                        FailureKind::Output,
                        format!("could not write output: {e}"),
                    );
                    return;
                }
            }
        }

        if writes_index {
            state.index.insert(key, index_line(&label, &asset));
        }

        state.record_success();
        self.emit(state.progress_event());
    }

    fn on_failure(
        &self,
        strategy: &dyn ScrapeStrategy,
        state: &mut ProgressState,
        failure: FetchFailure,
    ) {
        let label = strategy.label(&failure.key);
        self.record_failure(state, label, failure.kind, failure.reason);
    }

    fn record_failure(
        &self,
        state: &mut ProgressState,
        label: String,
        kind: FailureKind,
        reason: String,
    ) {
        tracing::debug!(item = %label, kind = ?kind, reason = %reason, "item failed");
        state.record_failure(label.clone());
        self.emit(ScrapeEvent::ItemFailed {
            label,
            kind,
            reason,
        });
        self.emit(state.progress_event());
    }

    async fn finalize(
        &self,
        out: &Path,
        writes_index: bool,
        index_header: Option<(ItemKey, String)>,
        mut state: ProgressState,
    ) -> Result<Summary> {
        let errors_file = if state.errors.is_empty() {
            None
        } else {
            let path = out.join(ERRORS_FILE);
            write_lines(&path, &state.errors).await?;
            Some(path)
        };

        let index_file = if writes_index && !state.index.is_empty() {
            if let Some((key, header)) = index_header {
                state.index.insert(key, header);
            }
            let path = out.join(INDEX_FILE);
            write_lines(&path, state.index.values()).await?;
            Some(path)
        } else {
            None
        };

        let summary = Summary {
            total: state.total,
            downloaded: state.downloaded,
            errored: state.errored,
            errors_file,
            index_file,
        };

        tracing::info!(
            total = summary.total,
            downloaded = summary.downloaded,
            errored = summary.errored,
            "scrape finished"
        );
        self.emit(ScrapeEvent::Completed {
            summary: summary.clone(),
        });

        Ok(summary)
    }
}
