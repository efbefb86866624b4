//! Best-effort recursive directory walk

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use super::filter::ExtensionFilter;
use super::{ImageEntry, ScanReport};
use crate::logger;

/// Failure to look at a single entry; never aborts a scan
#[derive(Debug, Error)]
pub enum VisitError {
    #[error("cannot read entry: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("cannot stat '{}': {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Walk `root` and collect every accepted file below it
///
/// `root` must already be validated as a directory. Unreadable directories
/// and files that cannot be stat'ed are skipped; the walk always completes.
pub fn scan_images(root: &Path, filter: &ExtensionFilter) -> ScanReport {
    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match visit(entry, filter) {
            Ok(Some(image)) => images.push(image),
            Ok(None) => {}
            Err(e) => logger::log_debug(&format!("[Scan] Skipped: {e}")),
        }
    }
    ScanReport::new(images)
}

/// Inspect one walk entry
fn visit(
    entry: walkdir::Result<DirEntry>,
    filter: &ExtensionFilter,
) -> Result<Option<ImageEntry>, VisitError> {
    let entry = entry?;
    if entry.file_type().is_dir() {
        return Ok(None);
    }
    let Some(extension) = filter.matches(entry.path()) else {
        return Ok(None);
    };

    // Follows symlinks: a link to an image counts, a dangling one is skipped
    let metadata = fs::metadata(entry.path()).map_err(|source| VisitError::Stat {
        path: entry.path().to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Ok(None);
    }

    Ok(Some(ImageEntry {
        path: entry.path().to_string_lossy().into_owned(),
        size: metadata.len(),
        extension,
    }))
}
