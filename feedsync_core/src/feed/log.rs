//! Append-only JSON-lines log of feed items, oldest first.

use crate::models::{FeedItem, OpusId};
use crate::normalize::normalize;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Identifiers present in the log. Rebuilt from the log on every run, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierIndex {
    ids: HashSet<OpusId>,
}

impl IdentifierIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &OpusId) -> bool {
        self.ids.contains(id)
    }

    /// Returns `false` if the identifier was already present.
    pub fn insert(&mut self, id: OpusId) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<OpusId> for IdentifierIndex {
    fn from_iter<I: IntoIterator<Item = OpusId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Result of scanning the log for identifiers.
#[derive(Debug, Clone, Default)]
pub struct IndexScan {
    pub index: IdentifierIndex,
    /// Non-blank lines seen.
    pub lines_read: usize,
    /// Lines that were not a JSON object (e.g. a torn write).
    pub skipped_unparseable: usize,
    /// Objects without a usable `opus_id`.
    pub skipped_missing_id: usize,
}

/// Counters from [`normalize_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct NormalizeStats {
    pub total_lines: usize,
    pub lines_with_badge: usize,
}

/// The local log file.
///
/// Single writer per file: concurrent runs against the same path are not detected.
#[derive(Debug, Clone)]
pub struct FeedLog {
    path: PathBuf,
}

impl FeedLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the log and collect every identifier in it.
    ///
    /// A missing file yields an empty index. Unparseable lines and objects without an
    /// identifier are skipped and counted.
    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    pub async fn load_index(&self) -> Result<IndexScan> {
        let Some(bytes) = read_if_exists(&self.path).await? else {
            tracing::info!("no existing log file");
            return Ok(IndexScan::default());
        };

        let mut scan = IndexScan::default();
        for (line_no, line) in lines(&bytes) {
            scan.lines_read += 1;
            match serde_json::from_slice::<Value>(line) {
                Ok(Value::Object(fields)) => match FeedItem::new(fields).opus_id() {
                    Some(id) => {
                        scan.index.insert(id);
                    }
                    None => scan.skipped_missing_id += 1,
                },
                _ => {
                    tracing::debug!(line = line_no, "skipping unparseable log line");
                    scan.skipped_unparseable += 1;
                }
            }
        }

        if scan.skipped_unparseable > 0 {
            tracing::warn!(
                skipped = scan.skipped_unparseable,
                "skipped log lines that are not JSON objects"
            );
        }
        tracing::info!(
            loaded = scan.index.len(),
            lines = scan.lines_read,
            skipped_missing_id = scan.skipped_missing_id,
            "loaded existing opus_ids"
        );
        Ok(scan)
    }

    /// Replace the whole log with `items` (already oldest first).
    ///
    /// Content goes to a sibling temp file that is renamed over the log, so readers
    /// see either the old or the new log.
    #[tracing::instrument(level = "debug", skip(self, items), fields(count = items.len()))]
    pub async fn rewrite(&self, items: &[FeedItem]) -> Result<usize> {
        let buf = encode_lines(items)?;
        write_atomically(&self.path, &buf).await?;
        Ok(items.len())
    }

    /// Append `items` (already oldest first) after the existing content.
    #[tracing::instrument(level = "debug", skip(self, items), fields(count = items.len()))]
    pub async fn append(&self, items: &[FeedItem]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut buf = encode_lines(items)?;
        ensure_parent(&self.path).await?;
        if !ends_with_newline(&self.path).await? {
            tracing::warn!(
                path = %self.path.display(),
                "log ends mid-line, terminating it before appending"
            );
            buf.insert(0, b'\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::io(format!("open {} for append", self.path.display()), e))?;
        file.write_all(&buf)
            .await
            .map_err(|e| Error::io(format!("append to {}", self.path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| Error::io(format!("flush {}", self.path.display()), e))?;
        Ok(items.len())
    }
}

/// Rewrite an existing log with every record normalized (`badge` moved last).
///
/// Lines that are not JSON are copied through verbatim; blank lines are dropped.
/// `input` and `output` may be the same path.
#[tracing::instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub async fn normalize_file(input: &Path, output: &Path) -> Result<NormalizeStats> {
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| Error::io(format!("read {}", input.display()), e))?;

    let mut stats = NormalizeStats::default();
    let mut out = Vec::with_capacity(bytes.len());
    for (_, line) in lines(&bytes) {
        stats.total_lines += 1;
        match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(fields)) => {
                let item = FeedItem::new(fields);
                if item.has_badge() {
                    stats.lines_with_badge += 1;
                }
                out.extend_from_slice(normalize(item).to_json_line()?.as_bytes());
            }
            Ok(other) => {
                let encoded = serde_json::to_string(&other)
                    .map_err(|e| Error::serialize("encode log line", e))?;
                out.extend_from_slice(encoded.as_bytes());
            }
            Err(_) => out.extend_from_slice(line),
        }
        out.push(b'\n');
    }

    write_atomically(output, &out).await?;
    tracing::info!(
        total_lines = stats.total_lines,
        lines_with_badge = stats.lines_with_badge,
        "normalized log"
    );
    Ok(stats)
}

/// Non-blank lines with surrounding ASCII whitespace removed, numbered from 1.
fn lines(bytes: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    bytes
        .split(|b| *b == b'\n')
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim_ascii()))
        .filter(|(_, line)| !line.is_empty())
}

fn encode_lines(items: &[FeedItem]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for item in items {
        buf.extend_from_slice(item.to_json_line()?.as_bytes());
        buf.push(b'\n');
    }
    Ok(buf)
}

async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(format!("read {}", path.display()), e)),
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(format!("create {}", parent.display()), e))?;
    }
    Ok(())
}

/// A missing or empty file counts as terminated.
async fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(Error::io(format!("open {}", path.display()), e)),
    };
    let len = file
        .metadata()
        .await
        .map_err(|e| Error::io(format!("stat {}", path.display()), e))?
        .len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(std::io::SeekFrom::End(-1))
        .await
        .map_err(|e| Error::io(format!("seek {}", path.display()), e))?;
    file.read_exact(&mut last)
        .await
        .map_err(|e| Error::io(format!("read tail of {}", path.display()), e))?;
    Ok(last[0] == b'\n')
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path).await?;
    let mut tmp_name = path
        .file_name()
        .map(OsString::from)
        .ok_or_else(|| Error::InvalidInput(format!("{} is not a file path", path.display())))?;
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let res = write_and_rename(&tmp, path, bytes).await;
    if res.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    res
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(tmp)
        .await
        .map_err(|e| Error::io(format!("create {}", tmp.display()), e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| Error::io(format!("write {}", tmp.display()), e))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io(format!("sync {}", tmp.display()), e))?;
    drop(file);
    tokio::fs::rename(tmp, path)
        .await
        .map_err(|e| Error::io(format!("rename {} -> {}", tmp.display(), path.display()), e))
}
