use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::ConnectorError;
use crate::source::{KeyLister, ListingQuery};
use crate::types::DataReference;

/// Lists files below a local directory as object-store style keys.
///
/// The query container names a subdirectory of `root` (empty means `root`
/// itself). Keys are `/`-separated paths relative to that directory, returned
/// in lexicographic order like a blob listing.
pub struct FileKeyLister {
    id: String,
    root: PathBuf,
    follow_links: bool,
}

impl FileKeyLister {
    /// Create a lister rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            id: format!("fs:{}", root.display()),
            root,
            follow_links: false,
        }
    }

    /// Configure symlink traversal.
    pub fn with_follow_symlinks(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    fn container_dir(&self, container: &str) -> PathBuf {
        if container.is_empty() {
            self.root.clone()
        } else {
            self.root.join(container)
        }
    }
}

impl KeyLister for FileKeyLister {
    fn id(&self) -> &str {
        &self.id
    }

    fn list(&self, query: &ListingQuery) -> Result<Vec<DataReference>, ConnectorError> {
        let started = Instant::now();
        let base = self.container_dir(&query.container);
        if !base.is_dir() {
            return Err(ConnectorError::ListerUnavailable {
                container: query.container.clone(),
                reason: format!("'{}' is not a directory", base.display()),
            });
        }
        let walker = WalkDir::new(&base)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        let mut keys = Vec::new();
        for entry in walker {
            if let Some(err) = query.interruption(started) {
                return Err(err);
            }
            let entry = entry.map_err(|err| walk_error(&query.container, err))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(key) = relative_key(&base, entry.path()) else {
                continue;
            };
            if query.admits(&key) {
                keys.push(key);
            }
        }
        keys.sort();
        debug!(
            lister = %self.id,
            container = %query.container,
            prefix = %query.prefix,
            key_count = keys.len(),
            "listed local references"
        );
        Ok(keys)
    }
}

/// I/O failures pass through as `Io`; symlink loops make the container unlistable.
fn walk_error(container: &str, err: walkdir::Error) -> ConnectorError {
    let reason = err.to_string();
    match err.into_io_error() {
        Some(io) => ConnectorError::Io(io),
        None => ConnectorError::ListerUnavailable {
            container: container.to_string(),
            reason,
        },
    }
}

/// `/`-joined path of `path` relative to `base`; `None` for non-UTF-8 names.
fn relative_key(base: &Path, path: &Path) -> Option<DataReference> {
    let relative = path.strip_prefix(base).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
