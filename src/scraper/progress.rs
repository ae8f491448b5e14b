//! Run-wide progress owned by the aggregation loop.

use std::collections::BTreeMap;

use crate::types::{ItemKey, ResolvedAsset, ScrapeEvent};

/// Counters, error log and index of a run
///
/// Only the aggregation loop in [`Scraper::run`](super::Scraper::run) touches
/// this, so updates are serialized without a lock.
#[derive(Debug, Default)]
pub(crate) struct ProgressState {
    pub(crate) total: usize,
    pub(crate) completed: usize,
    pub(crate) downloaded: usize,
    pub(crate) errored: usize,
    /// Labels of failed items, in the order they failed
    pub(crate) errors: Vec<String>,
    /// Index lines by item key
    pub(crate) index: BTreeMap<ItemKey, String>,
}

impl ProgressState {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.completed >= self.total
    }

    pub(crate) fn record_success(&mut self) {
        self.downloaded += 1;
        self.complete_one();
    }

    pub(crate) fn record_failure(&mut self, label: String) {
        self.errored += 1;
        self.errors.push(label);
        self.complete_one();
    }

    fn complete_one(&mut self) {
        if self.completed < self.total {
            self.completed += 1;
        } else {
            tracing::warn!(
                total = self.total,
                "received more outcomes than work items"
            );
        }
    }

    pub(crate) fn progress_event(&self) -> ScrapeEvent {
        ScrapeEvent::Progress {
            completed: self.completed,
            total: self.total,
            errors: self.errored,
        }
    }
}

/// `{label} | {url} [{last_modified} | {size_mb} MB]`
pub(crate) fn index_line(label: &str, asset: &ResolvedAsset) -> String {
    format!(
        "{label} | {} [{} | {} MB]",
        asset.content_url, asset.last_modified, asset.size_mb
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn counts_add_up_to_completed() {
        let mut state = ProgressState::new(3);
        state.record_success();
        state.record_failure("2".into());
        assert!(!state.is_done());
        state.record_success();

        assert!(state.is_done());
        assert_eq!(state.completed, state.downloaded + state.errored);
        assert_eq!(state.errors, vec!["2".to_string()]);
    }

    #[test]
    fn completed_never_exceeds_total() {
        let mut state = ProgressState::new(1);
        state.record_success();
        state.record_success();
        assert_eq!(state.completed, 1);
    }

    #[test]
    fn index_line_format() {
        let asset = ResolvedAsset {
            content_url: "https://c0.example/abc".into(),
            last_modified: "Wed, 21 Oct 2015 07:28:00 GMT".into(),
            size_mb: 0.5,
            content: Bytes::new(),
        };
        assert_eq!(
            index_line("3", &asset),
            "3 | https://c0.example/abc [Wed, 21 Oct 2015 07:28:00 GMT | 0.5 MB]"
        );
    }
}
