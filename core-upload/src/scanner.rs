//! Directory pre-scan
//!
//! Every directory below the root becomes one playlist, named by joining its
//! path segments relative to the root with `_`. Only a directory's direct
//! children are its videos; files directly in the root are ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, UploadError};

/// The eligible files of one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistBatch {
    /// Derived playlist name, e.g. `trip_day1` for `<root>/trip/day1`
    pub name: String,
    pub directory: PathBuf,
    /// Sorted by file name
    pub files: Vec<PathBuf>,
}

/// Playlist name for `directory`, or `None` for the root itself.
pub fn playlist_name(root: &Path, directory: &Path) -> Option<String> {
    let relative = directory.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("_"))
    }
}

/// Whether `path` has one of `extensions` (case-insensitive, no leading dot)
pub fn is_video_file(path: &Path, extensions: &[String]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|candidate| candidate.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Walk `root` and group eligible files by directory.
///
/// Directories without eligible files produce no batch. Unreadable
/// subdirectories are logged and skipped.
///
/// # Errors
///
/// [`UploadError::LocalIo`] if `root` is not a readable directory.
pub fn scan_directory(root: &Path, extensions: &[String]) -> Result<Vec<PlaylistBatch>> {
    if !root.is_dir() {
        return Err(UploadError::local_io(root, "not a directory"));
    }

    let mut by_directory: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(UploadError::local_io(root, e)),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_video_file(entry.path(), extensions) {
            continue;
        }

        let Some(parent) = entry.path().parent() else {
            continue;
        };
        if parent == root {
            debug!(file = %entry.path().display(), "Ignoring file in root directory");
            continue;
        }

        by_directory
            .entry(parent.to_path_buf())
            .or_default()
            .push(entry.into_path());
    }

    let batches: Vec<PlaylistBatch> = by_directory
        .into_iter()
        .filter_map(|(directory, files)| {
            playlist_name(root, &directory).map(|name| PlaylistBatch {
                name,
                directory,
                files,
            })
        })
        .collect();

    debug!(
        playlists = batches.len(),
        files = batches.iter().map(|b| b.files.len()).sum::<usize>(),
        "Scan finished"
    );
    Ok(batches)
}
