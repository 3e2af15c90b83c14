//! `ServerCatalog`: a flat, traversal-safe view over the server's share
//! directory (spec.md §3, §4.4 step 1).

use std::path::{Path, PathBuf};

use crate::error::CatalogError;

/// The server's share directory. Every lookup canonicalizes and verifies
/// containment under `root` before touching the filesystem (spec.md §8 P3).
#[derive(Debug, Clone)]
pub struct ServerCatalog {
    root: PathBuf,
}

impl ServerCatalog {
    /// Open a catalog rooted at `root`, creating the directory if missing.
    ///
    /// # Errors
    /// Returns an I/O error if `root` cannot be created or canonicalized.
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// The canonicalized data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Flat list of non-dotfile regular-file names directly under the root.
    ///
    /// # Errors
    /// Returns an I/O error if the directory cannot be read.
    pub fn list(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type()?.is_file() {
                names.push(name.into_owned());
            }
        }
        Ok(names)
    }

    /// Case-insensitive substring search over [`ServerCatalog::list`].
    /// An empty query returns no results (spec.md §4.3).
    ///
    /// # Errors
    /// Returns an I/O error if the directory cannot be read.
    pub fn search(&self, query: &str) -> std::io::Result<Vec<String>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let needle = query.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Resolve `filename` to a canonical path strictly contained under the
    /// data root, and confirm it names an existing regular file.
    ///
    /// # Errors
    /// [`CatalogError::AccessDenied`] if the resolved path escapes the root
    /// (or does not resolve), [`CatalogError::NotFound`] if it resolves but
    /// is not an existing regular file.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, CatalogError> {
        let candidate = self.root.join(filename);
        let canonical = candidate
            .canonicalize()
            .map_err(|_| CatalogError::AccessDenied)?;
        if !canonical.starts_with(&self.root) {
            return Err(CatalogError::AccessDenied);
        }
        let metadata = std::fs::metadata(&canonical).map_err(|_| CatalogError::NotFound)?;
        if !metadata.is_file() {
            return Err(CatalogError::NotFound);
        }
        Ok(canonical)
    }
}
