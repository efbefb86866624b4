//! Image extension filter

use std::collections::HashSet;
use std::path::Path;

use crate::config::default_image_extensions;

/// Case-insensitive set of accepted file extensions
///
/// Stored lowercased with a leading dot, which is also the form reported in
/// `ImageEntry::extension`.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        let extensions = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .collect();
        Self { extensions }
    }

    /// Returns the normalized extension when `path` is accepted
    ///
    /// Dot-files such as `.png` have no extension and are never accepted.
    pub fn matches(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?;
        let normalized = format!(".{}", ext.to_lowercase());
        self.extensions.contains(&normalized).then_some(normalized)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(&default_image_extensions())
    }
}
