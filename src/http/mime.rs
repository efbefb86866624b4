//! MIME type detection module
//!
//! Maps file extensions to Content-Type values. The table is built once at
//! startup from the built-in entries plus configured overrides and is never
//! mutated afterwards.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const FALLBACK: &str = "application/octet-stream";

const BUILTIN: &[(&str, &str)] = &[
    // Text
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("xml", "application/xml"),
    // JavaScript/WASM
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("wasm", "application/wasm"),
    // Images
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    // Fonts
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    // Media
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    // Documents
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
];

/// Immutable extension -> MIME table
#[derive(Debug, Clone)]
pub struct MimeMap {
    types: HashMap<String, String>,
}

impl MimeMap {
    /// Built-in table with `overrides` applied on top
    ///
    /// Override keys may be given with or without the leading dot and in any case.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut types: HashMap<String, String> = BUILTIN
            .iter()
            .map(|(ext, mime)| ((*ext).to_string(), (*mime).to_string()))
            .collect();
        for (ext, mime) in overrides {
            types.insert(normalize(ext), mime.clone());
        }
        Self { types }
    }

    /// Content-Type for a bare extension (no dot)
    pub fn get(&self, extension: Option<&str>) -> &str {
        extension
            .and_then(|ext| self.types.get(&normalize(ext)))
            .map_or(FALLBACK, String::as_str)
    }

    /// Content-Type for a path, by its extension
    pub fn for_path(&self, path: &Path) -> &str {
        self.get(path.extension().and_then(|e| e.to_str()))
    }
}

impl Default for MimeMap {
    fn default() -> Self {
        Self::with_overrides(&BTreeMap::new())
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        let mime = MimeMap::default();
        assert_eq!(mime.get(Some("html")), "text/html");
        assert_eq!(mime.get(Some("css")), "text/css");
        assert_eq!(mime.get(Some("js")), "application/javascript");
        assert_eq!(mime.get(Some("mjs")), "application/javascript");
        assert_eq!(mime.get(Some("json")), "application/json");
        assert_eq!(mime.get(Some("png")), "image/png");
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mime = MimeMap::default();
        assert_eq!(mime.get(Some("CSS")), "text/css");
        assert_eq!(mime.for_path(Path::new("/a/Photo.JPG")), "image/jpeg");
    }

    #[test]
    fn test_unknown_extension() {
        let mime = MimeMap::default();
        assert_eq!(mime.get(Some("xyz")), "application/octet-stream");
        assert_eq!(mime.get(None), "application/octet-stream");
        assert_eq!(mime.for_path(Path::new("Makefile")), "application/octet-stream");
    }

    #[test]
    fn test_overrides_win() {
        let mut overrides = BTreeMap::new();
        overrides.insert(".HTML".to_string(), "text/html; charset=utf-8".to_string());
        overrides.insert("glb".to_string(), "model/gltf-binary".to_string());
        let mime = MimeMap::with_overrides(&overrides);
        assert_eq!(mime.get(Some("html")), "text/html; charset=utf-8");
        assert_eq!(mime.get(Some("glb")), "model/gltf-binary");
        assert_eq!(mime.get(Some("css")), "text/css");
    }
}
