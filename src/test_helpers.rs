//! In-memory doubles for the resolver and output seams, shared by unit tests.

use crate::error::{Phase, ResolveError, Result};
use crate::output::OutputSink;
use crate::resolver::{AssetSource, size_in_mb};
use crate::types::{AssetRef, ItemKey, ResolvedAsset};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

pub(crate) const TEST_LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

type Responder =
    dyn Fn(&ItemKey, u32) -> std::result::Result<ResolvedAsset, ResolveError> + Send + Sync;

type Latency = dyn Fn(&ItemKey) -> Duration + Send + Sync;

/// The asset a [`FakeSource`] returns for `key` unless told otherwise
pub(crate) fn asset_for(key: &ItemKey) -> ResolvedAsset {
    let content = Bytes::from(format!("content of {key}"));
    ResolvedAsset {
        content_url: format!("https://cdn.test/{}", key.to_string().replace(' ', "-")),
        last_modified: TEST_LAST_MODIFIED.to_string(),
        size_mb: size_in_mb(content.len()),
        content,
    }
}

pub(crate) fn transient(status: u16) -> ResolveError {
    ResolveError::Status {
        phase: Phase::AssetDelivery,
        status,
    }
}

/// Scriptable [`AssetSource`]
///
/// Records every attempt per key and the peak number of overlapping
/// resolutions.
pub(crate) struct FakeSource {
    responder: Box<Responder>,
    latency: Box<Latency>,
    version_counts: HashMap<i64, u32>,
    probe_failures: HashMap<i64, u16>,
    attempts: Mutex<HashMap<ItemKey, u32>>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSource {
    /// Every resolution succeeds with [`asset_for`]
    pub(crate) fn ok() -> Self {
        Self::with_responder(|key, _| Ok(asset_for(key)))
    }

    /// Resolutions are answered by `responder(key, attempt)`, `attempt` being zero-based
    pub(crate) fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&ItemKey, u32) -> std::result::Result<ResolvedAsset, ResolveError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: Box::new(|_| Duration::ZERO),
            version_counts: HashMap::new(),
            probe_failures: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn latency(self, latency: Duration) -> Self {
        self.latency_by(move |_| latency)
    }

    /// Per-key latency, for controlling the order outcomes arrive in
    pub(crate) fn latency_by<F>(mut self, latency: F) -> Self
    where
        F: Fn(&ItemKey) -> Duration + Send + Sync + 'static,
    {
        self.latency = Box::new(latency);
        self
    }

    pub(crate) fn versions(mut self, id: i64, count: u32) -> Self {
        self.version_counts.insert(id, count);
        self
    }

    /// Make the version probe of `id` fail with `status` (409 reads as locked)
    pub(crate) fn probe_fails(mut self, id: i64, status: u16) -> Self {
        self.probe_failures.insert(id, status);
        self
    }

    pub(crate) fn attempts(&self, key: &ItemKey) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AssetSource for FakeSource {
    async fn resolve(
        &self,
        target: &AssetRef,
        version: u32,
    ) -> std::result::Result<ResolvedAsset, ResolveError> {
        let key = ItemKey::new(target.clone(), version);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(key.clone()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let latency = (self.latency)(&key);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);

        (self.responder)(&key, attempt)
    }

    async fn probe_version_count(&self, id: i64) -> std::result::Result<u32, ResolveError> {
        let phase = Phase::Probe;
        match self.probe_failures.get(&id) {
            Some(409) => Err(ResolveError::Locked { phase }),
            Some(&status) => Err(ResolveError::Status { phase, status }),
            None => Ok(self.version_counts.get(&id).copied().unwrap_or(1)),
        }
    }
}

/// [`OutputSink`] keeping everything in memory
#[derive(Default)]
pub(crate) struct MemorySink {
    saved: Mutex<Vec<(PathBuf, Bytes, Option<SystemTime>)>>,
    failing: HashSet<PathBuf>,
}

impl MemorySink {
    /// Saving `stem` fails with an I/O error
    pub(crate) fn failing_on(mut self, stem: impl Into<PathBuf>) -> Self {
        self.failing.insert(stem.into());
        self
    }

    /// Saved stems, sorted
    pub(crate) fn stems(&self) -> Vec<PathBuf> {
        let mut stems: Vec<PathBuf> = self
            .saved
            .lock()
            .unwrap()
            .iter()
            .map(|(stem, _, _)| stem.clone())
            .collect();
        stems.sort();
        stems
    }

    pub(crate) fn content(&self, stem: impl AsRef<Path>) -> Option<Bytes> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _, _)| s == stem.as_ref())
            .map(|(_, content, _)| content.clone())
    }

    pub(crate) fn modified(&self, stem: impl AsRef<Path>) -> Option<SystemTime> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _, _)| s == stem.as_ref())
            .and_then(|(_, _, modified)| *modified)
    }
}

#[async_trait::async_trait]
impl OutputSink for MemorySink {
    async fn save(
        &self,
        stem: &Path,
        content: Bytes,
        last_modified: Option<SystemTime>,
    ) -> Result<PathBuf> {
        if self.failing.contains(stem) {
            return Err(std::io::Error::other("disk full").into());
        }
        self.saved
            .lock()
            .unwrap()
            .push((stem.to_path_buf(), content, last_modified));
        Ok(stem.to_path_buf())
    }
}
