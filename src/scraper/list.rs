//! Assets named in a list file, one id or content hash per line.

use std::path::{Path, PathBuf};

use futures::StreamExt;

use crate::config::Config;
use crate::error::{Error, ResolveError, Result};
use crate::resolver::AssetSource;
use crate::types::{AssetRef, FailureKind, ItemKey, WorkItem};

use super::{Plan, Rejected, ScrapeStrategy};

/// Downloads every asset in a list file
///
/// With `with_versions`, every version of each numeric id is downloaded into a
/// per-id subdirectory; content hashes are always fetched once.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdList {
    /// Expand numeric ids into all of their versions
    pub with_versions: bool,
}

impl IdList {
    /// Latest version of each entry
    pub fn latest() -> Self {
        Self {
            with_versions: false,
        }
    }

    /// All versions of each numeric id
    pub fn all_versions() -> Self {
        Self {
            with_versions: true,
        }
    }
}

fn probe_failure_kind(error: &ResolveError) -> FailureKind {
    match error {
        ResolveError::Locked { .. } => FailureKind::Locked,
        ResolveError::NotAccessible { .. } => FailureKind::NotAccessible,
        _ => FailureKind::RetriesExhausted { attempts: 1 },
    }
}

#[async_trait::async_trait]
impl ScrapeStrategy for IdList {
    fn name(&self) -> &'static str {
        if self.with_versions {
            "list-versions"
        } else {
            "list"
        }
    }

    async fn enumerate(
        &self,
        input: &str,
        source: &dyn AssetSource,
        config: &Config,
    ) -> Result<Plan> {
        let path = Path::new(input.trim());
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::InvalidInput(format!("could not read list {}: {e}", path.display()))
        })?;

        let mut items = Vec::new();
        let mut rejected = Vec::new();
        let mut versioned_ids = Vec::new();

        for token in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match AssetRef::parse(token) {
                Some(AssetRef::Id(id)) if self.with_versions => versioned_ids.push(id),
                Some(target) => items.push(WorkItem::new(target, 0)),
                None => rejected.push(Rejected {
                    label: token.to_string(),
                    kind: FailureKind::InvalidInput,
                    reason: format!("{token} is not a valid id or content hash"),
                }),
            }
        }

        if !versioned_ids.is_empty() {
            let limit = config.network.max_concurrent_requests.max(1);
            let probes: Vec<_> = futures::stream::iter(versioned_ids)
                .map(|id| async move { (id, source.probe_version_count(id).await) })
                .buffered(limit)
                .collect()
                .await;

            for (id, probe) in probes {
                match probe {
                    Ok(versions) => {
                        tracing::debug!(asset = id, versions, "probed version count");
                        items.extend(
                            (1..=versions).map(|version| WorkItem::new(AssetRef::Id(id), version)),
                        );
                    }
                    Err(e) => rejected.push(Rejected {
                        label: id.to_string(),
                        kind: probe_failure_kind(&e),
                        reason: format!("failed to get total versions: {e}"),
                    }),
                }
            }
        }

        tracing::info!(
            list = %path.display(),
            items = items.len(),
            rejected = rejected.len(),
            "enumerated list"
        );
        let mut plan = Plan::from_items(items);
        plan.rejected = rejected;
        Ok(plan)
    }

    fn file_stem(&self, key: &ItemKey) -> PathBuf {
        if key.version == 0 {
            PathBuf::from(key.target.to_string())
        } else {
            let id = key.target.to_string();
            PathBuf::from(&id).join(format!("{id}-v{}", key.version))
        }
    }

    fn label(&self, key: &ItemKey) -> String {
        key.to_string()
    }

    fn default_output_dir(&self, input: &str) -> PathBuf {
        let stem = Path::new(input.trim())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "list".to_string());
        PathBuf::from(format!("{stem}_assets"))
    }
}
