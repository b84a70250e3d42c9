use crate::foundation::config::OrchestratorConfig;
use crate::foundation::core::display_path;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// One output file observed in the shared tree. Recomputed on every scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    /// Creation time where the filesystem reports it, otherwise the modification time.
    pub created: SystemTime,
}

/// What a [`Scanner::scan`] call computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
    /// Up to `K` most recently modified artifacts, newest first.
    Newest(usize),
    /// Number of artifacts in the whole tree.
    Count,
    /// Up to `limit` most recently created artifacts created at or after `since`, newest first.
    CreatedSince { limit: usize, since: SystemTime },
}

/// Result of a [`Scanner::scan`] call, matching the requested [`ScanMode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanResult {
    Artifacts(Vec<Artifact>),
    Count(u64),
}

impl ScanResult {
    /// Number of artifacts represented by this result.
    pub fn len(&self) -> u64 {
        match self {
            Self::Artifacts(a) => a.len() as u64,
            Self::Count(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Artifact count and total byte size of a tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub artifacts: u64,
    pub total_bytes: u64,
}

/// Recursive artifact lookup over a directory tree that other processes are writing into.
///
/// No locking is attempted: every result is a best-effort snapshot. Unreadable subdirectories and
/// files that disappear mid-walk are skipped. Symlinks are not followed, so a path is visited at
/// most once per walk.
#[derive(Clone, Debug)]
pub struct Scanner {
    extension: String,
}

impl Scanner {
    /// Match files with `extension` (leading dot optional, case-insensitive).
    pub fn new(extension: impl AsRef<str>) -> Self {
        Self {
            extension: extension
                .as_ref()
                .trim_start_matches('.')
                .to_ascii_lowercase(),
        }
    }

    pub fn from_config(cfg: &OrchestratorConfig) -> Self {
        Self::new(cfg.normalized_extension())
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Walk `root` in the given mode.
    pub fn scan(&self, root: &Path, mode: ScanMode) -> ScanResult {
        match mode {
            ScanMode::Newest(k) => ScanResult::Artifacts(self.newest(root, k)),
            ScanMode::Count => ScanResult::Count(self.count(root)),
            ScanMode::CreatedSince { limit, since } => {
                ScanResult::Artifacts(self.created_since(root, limit, since))
            }
        }
    }

    /// Up to `k` most recently modified artifacts, sorted newest first.
    ///
    /// Memory stays bounded by `k` regardless of the tree size.
    pub fn newest(&self, root: &Path, k: usize) -> Vec<Artifact> {
        top_k(self.artifacts(root), k, |a| a.modified)
    }

    /// Up to `limit` most recently created artifacts with `created >= since`, newest first.
    pub fn created_since(&self, root: &Path, limit: usize, since: SystemTime) -> Vec<Artifact> {
        top_k(
            self.artifacts(root).filter(|a| a.created >= since),
            limit,
            |a| a.created,
        )
    }

    /// Number of artifacts anywhere under `root`.
    pub fn count(&self, root: &Path) -> u64 {
        self.entries(root).count() as u64
    }

    /// Artifact count plus the sum of their sizes.
    pub fn stats(&self, root: &Path) -> TreeStats {
        self.artifacts(root).fold(TreeStats::default(), |mut acc, a| {
            acc.artifacts += 1;
            acc.total_bytes = acc.total_bytes.saturating_add(a.size);
            acc
        })
    }

    /// Return `true` when `path` carries the configured artifact extension.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    fn entries(&self, root: &Path) -> impl Iterator<Item = DirEntry> {
        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    tracing::debug!(
                        path = ?err.path().map(display_path),
                        "skipping unreadable entry: {err}"
                    );
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && self.matches(e.path()))
    }

    fn artifacts(&self, root: &Path) -> impl Iterator<Item = Artifact> {
        self.entries(root).filter_map(|e| {
            // The renderer may delete or rename a file between listing and stat.
            let meta = e.metadata().ok()?;
            let modified = meta.modified().ok()?;
            let created = meta.created().unwrap_or(modified);
            Some(Artifact {
                path: e.into_path(),
                size: meta.len(),
                modified,
                created,
            })
        })
    }
}

struct Ranked {
    key: SystemTime,
    artifact: Artifact,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.artifact.path.cmp(&other.artifact.path))
    }
}

fn top_k<I, F>(items: I, k: usize, key: F) -> Vec<Artifact>
where
    I: Iterator<Item = Artifact>,
    F: Fn(&Artifact) -> SystemTime,
{
    if k == 0 {
        return Vec::new();
    }
    // Min-heap of the k best seen so far.
    let mut heap = BinaryHeap::<Reverse<Ranked>>::with_capacity(k.saturating_add(1).min(4096));
    for artifact in items {
        heap.push(Reverse(Ranked {
            key: key(&artifact),
            artifact,
        }));
        if heap.len() > k {
            heap.pop();
        }
    }
    let mut ranked: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
    ranked.sort_by(|a, b| b.cmp(a));
    ranked.into_iter().map(|r| r.artifact).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/scan/scanner.rs"]
mod tests;
