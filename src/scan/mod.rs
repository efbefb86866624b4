//! Image scanning
//!
//! Pure filesystem side of the scan endpoint: request parsing and
//! validation, the extension filter, and the best-effort directory walk.
//! Nothing here knows about HTTP.

mod filter;
mod walker;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use filter::ExtensionFilter;
pub use walker::scan_images;

/// One matched file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEntry {
    /// Absolute path of the file
    pub path: String,
    /// Size in bytes at scan time
    pub size: u64,
    /// Lowercased, with leading dot
    pub extension: String,
}

/// Scan result; `count` always equals `images.len()`
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub images: Vec<ImageEntry>,
    pub count: usize,
}

impl ScanReport {
    pub fn new(images: Vec<ImageEntry>) -> Self {
        let count = images.len();
        Self { images, count }
    }
}

/// Rejected scan request
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("missing or empty 'path' query parameter")]
    MissingPath,

    #[error("'{0}' is not an existing directory")]
    NotADirectory(String),
}

/// Parsed scan request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub path: String,
}

impl ScanRequest {
    /// Extract `path` from a raw query string
    ///
    /// The first non-empty `path` value wins; blank values count as absent.
    pub fn from_query(query: Option<&str>) -> Result<Self, ScanError> {
        let query = query.ok_or(ScanError::MissingPath)?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, value)| key == "path" && !value.is_empty())
            .map(|(_, value)| Self {
                path: value.into_owned(),
            })
            .ok_or(ScanError::MissingPath)
    }

    /// Absolute directory to walk
    ///
    /// Relative paths are resolved against the working directory; symlinks
    /// are kept as given so reported paths stay under what the caller asked for.
    pub fn resolve(&self) -> Result<PathBuf, ScanError> {
        let not_a_dir = || ScanError::NotADirectory(self.path.clone());
        let absolute = std::path::absolute(Path::new(&self.path)).map_err(|_| not_a_dir())?;
        if absolute.is_dir() {
            Ok(absolute)
        } else {
            Err(not_a_dir())
        }
    }

    /// Validate and walk; blocking
    pub fn run(&self, filter: &ExtensionFilter) -> Result<ScanReport, ScanError> {
        let root = self.resolve()?;
        Ok(scan_images(&root, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query() {
        assert_eq!(
            ScanRequest::from_query(Some("path=/tmp/x")).unwrap().path,
            "/tmp/x"
        );
        assert_eq!(
            ScanRequest::from_query(Some("other=1&path=%2Fhome%2Fme%2FMy+Pictures"))
                .unwrap()
                .path,
            "/home/me/My Pictures"
        );
        assert_eq!(
            ScanRequest::from_query(Some("path=&path=/data")).unwrap().path,
            "/data"
        );
    }

    #[test]
    fn test_from_query_missing_or_empty() {
        assert_eq!(ScanRequest::from_query(None), Err(ScanError::MissingPath));
        assert_eq!(ScanRequest::from_query(Some("")), Err(ScanError::MissingPath));
        assert_eq!(ScanRequest::from_query(Some("path=")), Err(ScanError::MissingPath));
        assert_eq!(ScanRequest::from_query(Some("dir=/tmp")), Err(ScanError::MissingPath));
    }

    #[test]
    fn test_resolve_rejects_files_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"png").unwrap();

        let as_file = ScanRequest {
            path: file.to_string_lossy().into_owned(),
        };
        assert!(matches!(as_file.resolve(), Err(ScanError::NotADirectory(_))));

        let missing = ScanRequest {
            path: dir.path().join("nope").to_string_lossy().into_owned(),
        };
        assert!(matches!(missing.resolve(), Err(ScanError::NotADirectory(_))));

        let ok = ScanRequest {
            path: dir.path().to_string_lossy().into_owned(),
        };
        assert_eq!(ok.resolve().unwrap(), dir.path());
    }

    #[test]
    fn test_relative_path_is_made_absolute() {
        let request = ScanRequest {
            path: "src".to_string(),
        };
        let resolved = request.resolve().unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("src"));
    }

    #[test]
    fn test_report_serialization() {
        let report = ScanReport::new(vec![ImageEntry {
            path: "/tmp/x/a.png".to_string(),
            size: 100,
            extension: ".png".to_string(),
        }]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "images": [{"path": "/tmp/x/a.png", "size": 100, "extension": ".png"}],
                "count": 1
            })
        );
    }

    #[test]
    fn test_run_on_file_performs_no_scan() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"jpg").unwrap();
        let request = ScanRequest {
            path: file.to_string_lossy().into_owned(),
        };
        let filter = ExtensionFilter::default();
        assert!(request.run(&filter).is_err());
    }
}
