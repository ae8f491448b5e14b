//! A contiguous range of asset ids.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::AssetSource;
use crate::types::{AssetRef, ItemKey, WorkItem};

use super::{Plan, ScrapeStrategy};

/// Downloads the latest version of every id in `start-end` (inclusive)
///
/// Does not produce an index.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdRange;

/// Parse `start-end` into an inclusive pair
pub fn parse_range(input: &str) -> Result<(i64, i64)> {
    let invalid = || Error::InvalidInput(format!("'{input}' is not a range like 100-200"));

    let (start, end) = input.trim().split_once('-').ok_or_else(invalid)?;
    let start: i64 = start.trim().parse().map_err(|_| invalid())?;
    let end: i64 = end.trim().parse().map_err(|_| invalid())?;

    if start > end {
        return Err(Error::InvalidInput(format!(
            "range start {start} is greater than end {end}"
        )));
    }
    Ok((start, end))
}

/// Number of ids in `start..=end`
fn range_len(start: i64, end: i64) -> Result<usize> {
    let len = i128::from(end) - i128::from(start) + 1;
    usize::try_from(len).map_err(|_| {
        Error::InvalidInput(format!("range {start}-{end} has too many ids to count"))
    })
}

#[async_trait::async_trait]
impl ScrapeStrategy for IdRange {
    fn name(&self) -> &'static str {
        "range"
    }

    async fn enumerate(
        &self,
        input: &str,
        _source: &dyn AssetSource,
        _config: &Config,
    ) -> Result<Plan> {
        let (start, end) = parse_range(input)?;
        let count = range_len(start, end)?;
        tracing::info!(start, end, items = count, "enumerated range");
        Ok(Plan::lazy(
            (start..=end).map(|id| WorkItem::new(AssetRef::Id(id), 0)),
            count,
        ))
    }

    fn file_stem(&self, key: &ItemKey) -> PathBuf {
        PathBuf::from(key.target.to_string())
    }

    fn label(&self, key: &ItemKey) -> String {
        key.target.to_string()
    }

    fn supports_index(&self) -> bool {
        false
    }

    fn default_output_dir(&self, input: &str) -> PathBuf {
        PathBuf::from(format!("{}_assets", input.trim()))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inclusive_ranges() {
        assert_eq!(parse_range("100-102").unwrap(), (100, 102));
        assert_eq!(parse_range(" 5 - 5 ").unwrap(), (5, 5));
    }

    #[test]
    fn rejects_malformed_ranges() {
        for input in ["100", "a-b", "100-", "-5", "1-2-3"] {
            assert!(
                matches!(parse_range(input), Err(Error::InvalidInput(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn range_len_is_inclusive() {
        assert_eq!(range_len(5, 5).unwrap(), 1);
        assert_eq!(range_len(100, 102).unwrap(), 3);
        assert_eq!(range_len(-2, 2).unwrap(), 5);
    }

    #[tokio::test]
    async fn huge_ranges_are_enumerated_lazily() {
        let source = crate::test_helpers::FakeSource::ok();
        let mut plan = IdRange
            .enumerate("1-4000000000", &source, &Config::default())
            .await
            .unwrap();

        assert_eq!(plan.item_count, 4_000_000_000);
        assert_eq!(plan.total(), 4_000_000_000);
        let first: Vec<i64> = plan
            .items
            .by_ref()
            .take(3)
            .map(|item| match item.target {
                AssetRef::Id(id) => id,
                AssetRef::Hash(hash) => panic!("unexpected hash {hash}"),
            })
            .collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(source.total_attempts(), 0);
    }

    #[test]
    fn rejects_reversed_ranges() {
        let err = parse_range("10-1").unwrap_err();
        assert!(err.to_string().contains("greater than"));
    }
}
