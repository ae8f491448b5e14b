//! Every version of a single asset.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::AssetSource;
use crate::types::{AssetRef, ItemKey, WorkItem};

use super::{Plan, ScrapeStrategy};

/// Downloads versions `1..=N` of one asset id, `N` coming from the version probe
#[derive(Clone, Copy, Debug, Default)]
pub struct AssetVersions;

pub(crate) fn parse_id(input: &str) -> Result<i64> {
    input
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::InvalidInput(format!("'{input}' is not a valid asset id")))
}

#[async_trait::async_trait]
impl ScrapeStrategy for AssetVersions {
    fn name(&self) -> &'static str {
        "asset"
    }

    async fn enumerate(
        &self,
        input: &str,
        source: &dyn AssetSource,
        _config: &Config,
    ) -> Result<Plan> {
        let id = parse_id(input)?;
        let versions = source.probe_version_count(id).await?;
        tracing::info!(asset = id, versions, "probed version count");

        let mut plan = Plan::lazy(
            (1..=versions).map(move |version| WorkItem::new(AssetRef::Id(id), version)),
            versions as usize,
        );
        plan.index_header = Some((
            ItemKey::new(AssetRef::Id(id), 0),
            format!("Versions for asset id {id}"),
        ));
        Ok(plan)
    }

    fn file_stem(&self, key: &ItemKey) -> PathBuf {
        PathBuf::from(format!("{}-v{}", key.target, key.version))
    }

    fn label(&self, key: &ItemKey) -> String {
        key.version.to_string()
    }

    fn default_output_dir(&self, input: &str) -> PathBuf {
        PathBuf::from(input.trim())
    }
}
