//! Output sink — persisting fetched assets and run reports.
//!
//! Asset files land at `{root}/{stem}[.{extension}][.gz|.bz2]` with their
//! modification time set from the content's `Last-Modified` header.

use crate::config::{Compression, OutputConfig};
use crate::error::Result;
use bytes::Bytes;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Name of the error log written at the end of a run
pub const ERRORS_FILE: &str = "errors.txt";

/// Name of the index written at the end of a run
pub const INDEX_FILE: &str = "index.txt";

/// Destination for fetched asset content
#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
    /// Persist `content` under `stem` and return the path actually written
    async fn save(
        &self,
        stem: &Path,
        content: Bytes,
        last_modified: Option<SystemTime>,
    ) -> Result<PathBuf>;
}

/// Parse an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`)
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

/// Filesystem [`OutputSink`] honouring extension and compression settings
#[derive(Clone, Debug)]
pub struct FileSink {
    root: PathBuf,
    extension: Option<String>,
    compression: Compression,
}

impl FileSink {
    /// Create a sink writing below `root`
    pub fn new(root: impl Into<PathBuf>, output: &OutputConfig) -> Self {
        Self {
            root: root.into(),
            extension: output.extension.clone(),
            compression: output.compression,
        }
    }

    /// Final path for `stem`, including extension and compression suffix
    pub fn file_path(&self, stem: &Path) -> PathBuf {
        let mut name: OsString = self.root.join(stem).into_os_string();
        for suffix in [self.extension.as_deref(), self.compression.suffix()]
            .into_iter()
            .flatten()
        {
            name.push(".");
            name.push(suffix);
        }
        PathBuf::from(name)
    }
}

#[async_trait::async_trait]
impl OutputSink for FileSink {
    async fn save(
        &self,
        stem: &Path,
        content: Bytes,
        last_modified: Option<SystemTime>,
    ) -> Result<PathBuf> {
        let path = self.file_path(stem);
        let compression = self.compression;
        let target = path.clone();

        tokio::task::spawn_blocking(move || {
            write_compressed(&target, &content, compression, last_modified)
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(path)
    }
}

fn write_compressed(
    path: &Path,
    content: &[u8],
    compression: Compression,
    last_modified: Option<SystemTime>,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    let file = match compression {
        Compression::None => {
            let mut file = file;
            file.write_all(content)?;
            file
        }
        Compression::GZip => {
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder.write_all(content)?;
            encoder.finish()?
        }
        Compression::BZip2 => {
            let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            encoder.write_all(content)?;
            encoder.finish()?
        }
    };

    if let Some(time) = last_modified {
        // A file with the wrong timestamp is still a usable download
        if let Err(e) = file.set_modified(time) {
            tracing::warn!(path = %path.display(), error = %e, "could not set modification time");
        }
    }

    Ok(())
}

/// Write `lines`, one per line, to `path`
pub async fn write_lines<I, S>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    tokio::fs::write(path, text).await?;
    Ok(())
}
