// Application state module
// Everything a request handler needs, resolved once at startup

use std::path::PathBuf;

use super::types::Config;
use crate::error::StartupError;
use crate::http::cache::CachePolicy;
use crate::http::mime::MimeMap;
use crate::logger;
use crate::scan::ExtensionFilter;

/// Application state, immutable after construction
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    /// Canonical static root
    pub root: PathBuf,
    pub mime: MimeMap,
    pub image_filter: ExtensionFilter,
    pub cache_policy: CachePolicy,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, StartupError> {
        let configured = PathBuf::from(&config.static_files.root);
        let root = configured
            .canonicalize()
            .map_err(|source| StartupError::InvalidRoot {
                path: configured.clone(),
                source,
            })?;
        if !root.is_dir() {
            return Err(StartupError::RootNotADirectory(root));
        }
        if !config
            .static_files
            .index_files
            .iter()
            .any(|name| root.join(name).is_file())
        {
            logger::log_warning(&format!(
                "No index file found in static root '{}'",
                root.display()
            ));
        }

        let image_filter = ExtensionFilter::new(&config.scan.extensions);
        if config.scan.enabled && image_filter.is_empty() {
            logger::log_warning("Scan endpoint enabled with an empty extension list");
        }

        let cache_policy = if config.http.no_cache {
            CachePolicy::NoStore
        } else {
            CachePolicy::Revalidate {
                max_age: config.http.max_age,
            }
        };

        Ok(Self {
            config: config.clone(),
            root,
            mime: MimeMap::with_overrides(&config.http.mime_types),
            image_filter,
            cache_policy,
        })
    }
}
