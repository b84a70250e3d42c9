use crate::foundation::core::display_path;
use crate::foundation::error::{OverlordError, OverlordResult};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// What one archive write produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Members written (duplicates excluded).
    pub files: usize,
    /// Uncompressed payload bytes written.
    pub bytes: u64,
}

/// Writes one archive containing `members` at `destination`.
///
/// Called concurrently from the pipeline's worker threads.
pub trait ArchiveWriter: Sync {
    fn write(&self, destination: &Path, members: &[PathBuf]) -> OverlordResult<ArchiveStats>;
}

/// Store-only (uncompressed) zip archives. Members are stored flat under their file names.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipArchiveWriter;

impl ArchiveWriter for ZipArchiveWriter {
    fn write(&self, destination: &Path, members: &[PathBuf]) -> OverlordResult<ArchiveStats> {
        let fail = |what: &str, e: &dyn std::fmt::Display| {
            OverlordError::archive_write(format!("{what} '{}': {e}", display_path(destination)))
        };

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fail("create parent of", &e))?;
        }
        let file = File::create(destination).map_err(|e| fail("create", &e))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));

        let mut seen = HashSet::<String>::new();
        let mut stats = ArchiveStats::default();
        for member in members {
            let Some(name) = member.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !seen.insert(name.clone()) {
                tracing::warn!(
                    archive = %display_path(destination),
                    member = %name,
                    "duplicate member name, skipping"
                );
                continue;
            }
            let mut src = File::open(member).map_err(|e| {
                OverlordError::archive_write(format!("open member '{}': {e}", display_path(member)))
            })?;
            let len = src.metadata().map(|m| m.len()).unwrap_or(0);
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .large_file(len >= u64::from(u32::MAX));
            zip.start_file(name, options)
                .map_err(|e| fail("start entry in", &e))?;
            let written = std::io::copy(&mut src, &mut zip).map_err(|e| fail("write entry in", &e))?;
            stats.files += 1;
            stats.bytes = stats.bytes.saturating_add(written);
        }

        zip.finish().map_err(|e| fail("finish", &e))?;
        Ok(stats)
    }
}
