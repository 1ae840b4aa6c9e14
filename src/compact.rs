//! Partition compaction
//!
//! Zips a finished month folder next to itself and removes the tree. The
//! archive is written as `{folder}.zip.partial` and renamed once complete, so a
//! `{folder}.zip` on disk is always a finished archive.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::{Error, Result};
use crate::utils::dir_size;

/// Sizes measured while compacting a folder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompactionStats {
    /// Total bytes of the files that were archived
    pub original_bytes: u64,
    /// Size of the resulting zip
    pub compressed_bytes: u64,
}

impl CompactionStats {
    /// Bytes reclaimed by compression
    pub fn space_saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.compressed_bytes)
    }
}

/// `{folder}.zip`
pub fn archive_path_for(folder: &Path) -> PathBuf {
    with_suffix(folder, ".zip")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Compress `folder` into `{folder}.zip` and delete the folder
///
/// Entry paths are relative to `folder`. Returns `None` when the folder does
/// not exist. Blocking; run on `spawn_blocking`.
pub fn compact_folder(folder: &Path) -> Result<Option<CompactionStats>> {
    if !folder.is_dir() {
        return Ok(None);
    }

    let fail = |reason: String| Error::Compaction {
        path: folder.to_path_buf(),
        reason,
    };

    let original_bytes =
        dir_size(folder).map_err(|e| fail(format!("failed to measure folder: {e}")))?;

    let archive_path = archive_path_for(folder);
    let partial_path = with_suffix(&archive_path, ".partial");

    if let Err(e) = write_archive(folder, &partial_path) {
        let _ = std::fs::remove_file(&partial_path);
        return Err(fail(format!("failed to write archive: {e}")));
    }

    std::fs::rename(&partial_path, &archive_path)
        .map_err(|e| fail(format!("failed to finalize archive: {e}")))?;

    let compressed_bytes = std::fs::metadata(&archive_path)
        .map_err(|e| fail(format!("failed to stat archive: {e}")))?
        .len();

    std::fs::remove_dir_all(folder)
        .map_err(|e| fail(format!("archive written but folder removal failed: {e}")))?;

    let stats = CompactionStats {
        original_bytes,
        compressed_bytes,
    };
    tracing::info!(
        archive = %archive_path.display(),
        original_bytes,
        compressed_bytes,
        space_saved = stats.space_saved(),
        "compressed partition folder"
    );
    Ok(Some(stats))
}

fn write_archive(folder: &Path, destination: &Path) -> io::Result<()> {
    let file = File::create(destination)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(folder).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(folder)
            .map_err(io::Error::other)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut writer)?;
        }
    }

    let file = writer.finish()?;
    file.sync_all()?;
    Ok(())
}
