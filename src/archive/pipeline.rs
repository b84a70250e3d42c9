use crate::archive::naming::GroupKey;
use crate::archive::writer::{ArchiveStats, ArchiveWriter, ZipArchiveWriter};
use crate::foundation::core::display_path;
use crate::foundation::error::{OverlordError, OverlordResult};
use anyhow::Context;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Completed groups between two progress log lines.
pub const PROGRESS_EVERY: usize = 50;

/// Files sharing one [`GroupKey`], and where their archive goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveGroup {
    pub key: GroupKey,
    /// Member files in name order.
    pub members: Vec<PathBuf>,
    pub destination: PathBuf,
}

/// Group `files` by their parsed names. Groups come out sorted by key.
///
/// Keys that resolve to the same destination archive are folded into the first such key, so
/// no two groups ever write the same file.
pub fn group_files(files: impl IntoIterator<Item = PathBuf>, output_root: &Path) -> Vec<ArchiveGroup> {
    let mut by_key = BTreeMap::<GroupKey, Vec<PathBuf>>::new();
    for file in files {
        by_key.entry(GroupKey::for_path(&file)).or_default().push(file);
    }

    let mut groups = Vec::<ArchiveGroup>::with_capacity(by_key.len());
    let mut by_destination = HashMap::<PathBuf, usize>::new();
    for (key, members) in by_key {
        let destination = key.destination(output_root);
        if let Some(&i) = by_destination.get(&destination) {
            tracing::warn!(
                group = %groups[i].key,
                merged = %key,
                destination = %display_path(&destination),
                "groups share an archive, merging"
            );
            groups[i].members.extend(members);
            continue;
        }
        by_destination.insert(destination.clone(), groups.len());
        groups.push(ArchiveGroup {
            key,
            members,
            destination,
        });
    }
    for group in &mut groups {
        group.members.sort();
    }
    groups
}

/// Regular files directly inside `source_dir`, sorted by path.
pub fn list_source_files(source_dir: &Path) -> OverlordResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(source_dir)
        .with_context(|| format!("read source directory '{}'", display_path(source_dir)))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.file_type().is_ok_and(|t| t.is_file()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Default bound on concurrent archive writes: `min(32, cpus + 4)`.
pub fn default_max_concurrent() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.saturating_add(4).min(32)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveOpts {
    /// Root under which `prefix/action/` directories are created.
    pub output_root: PathBuf,
    /// Batch size and worker count.
    pub max_concurrent: usize,
    /// Remove member files once their archive has been written.
    pub delete_sources: bool,
}

impl ArchiveOpts {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            max_concurrent: default_max_concurrent(),
            delete_sources: false,
        }
    }

    pub fn validate(&self) -> OverlordResult<()> {
        if self.max_concurrent == 0 {
            return Err(OverlordError::validation("max_concurrent must be >= 1"));
        }
        Ok(())
    }
}

/// Per-group result.
#[derive(Debug)]
pub struct GroupOutcome {
    pub key: GroupKey,
    pub destination: PathBuf,
    pub result: OverlordResult<ArchiveStats>,
}

impl GroupOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every group's outcome, in group order, plus the number that succeeded.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    pub outcomes: Vec<GroupOutcome>,
    pub completed: usize,
}

impl ArchiveReport {
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed
    }

    pub fn total_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|s| s.bytes)
            .sum()
    }
}

/// Batched fan-out/fan-in archiver.
///
/// Groups are processed in batches of `max_concurrent` on a pool of the same size; a batch is
/// fully written before the next one starts, so at most `max_concurrent` writes are ever in
/// flight. A failed group is recorded and never affects its siblings.
#[derive(Debug)]
pub struct ArchivePipeline<W = ZipArchiveWriter> {
    writer: W,
    opts: ArchiveOpts,
}

impl ArchivePipeline<ZipArchiveWriter> {
    pub fn new(opts: ArchiveOpts) -> OverlordResult<Self> {
        Self::with_writer(ZipArchiveWriter, opts)
    }
}

impl<W: ArchiveWriter> ArchivePipeline<W> {
    pub fn with_writer(writer: W, opts: ArchiveOpts) -> OverlordResult<Self> {
        opts.validate()?;
        Ok(Self { writer, opts })
    }

    pub fn opts(&self) -> &ArchiveOpts {
        &self.opts
    }

    /// Archive every file directly inside `source_dir`.
    #[tracing::instrument(skip(self, source_dir), fields(source_dir = %display_path(source_dir)))]
    pub fn run(&self, source_dir: &Path) -> OverlordResult<ArchiveReport> {
        let files = list_source_files(source_dir)?;
        let groups = group_files(files, &self.opts.output_root);
        tracing::info!(
            groups = groups.len(),
            max_concurrent = self.opts.max_concurrent,
            "archiving"
        );
        self.run_groups(&groups)
    }

    /// Archive pre-built groups.
    pub fn run_groups(&self, groups: &[ArchiveGroup]) -> OverlordResult<ArchiveReport> {
        let pool = build_thread_pool(self.opts.max_concurrent)?;
        let mut report = ArchiveReport {
            outcomes: Vec::with_capacity(groups.len()),
            completed: 0,
        };

        for batch in groups.chunks(self.opts.max_concurrent) {
            let outcomes: Vec<GroupOutcome> =
                pool.install(|| batch.par_iter().map(|g| self.write_group(g)).collect());
            for outcome in outcomes {
                if outcome.is_ok() {
                    report.completed += 1;
                    if report.completed.is_multiple_of(PROGRESS_EVERY) {
                        tracing::info!(
                            completed = report.completed,
                            total = groups.len(),
                            "archive progress"
                        );
                    }
                }
                report.outcomes.push(outcome);
            }
        }

        tracing::info!(
            completed = report.completed,
            failed = report.failed(),
            "archiving finished"
        );
        Ok(report)
    }

    fn write_group(&self, group: &ArchiveGroup) -> GroupOutcome {
        let result = self.writer.write(&group.destination, &group.members);
        match &result {
            Ok(stats) => {
                tracing::debug!(
                    group = %group.key,
                    files = stats.files,
                    bytes = stats.bytes,
                    "archive written"
                );
                if self.opts.delete_sources {
                    delete_members(&group.members);
                }
            }
            Err(e) => tracing::error!(group = %group.key, "{e}"),
        }
        GroupOutcome {
            key: group.key.clone(),
            destination: group.destination.clone(),
            result,
        }
    }
}

fn delete_members(members: &[PathBuf]) {
    for member in members {
        if let Err(e) = std::fs::remove_file(member)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %display_path(member), "failed to delete source: {e}");
        }
    }
}

fn build_thread_pool(threads: usize) -> OverlordResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("overlord-archive-{i}"))
        .build()
        .map_err(|e| OverlordError::archive_write(format!("failed to build thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/archive/pipeline.rs"]
mod tests;
