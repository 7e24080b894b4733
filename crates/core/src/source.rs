//! Source provider abstraction.
//!
//! The [`SourceProvider`] trait is the only place the loader touches the
//! filesystem: reading a configuration file, joining an include target onto
//! a directory, and canonicalizing paths for existence and cycle checks.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

pub trait SourceProvider {
    /// Read the full text of a configuration file.
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error>;

    /// Join an include target onto the directory it is relative to.
    fn resolve_import(&self, base: &Path, import: &str) -> Result<PathBuf, std::io::Error>;

    /// Canonicalize a path. A missing file yields `ErrorKind::NotFound`.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error>;
}

/// Filesystem-backed provider used by [`crate::load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemProvider;

impl SourceProvider for FileSystemProvider {
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error> {
        std::fs::read_to_string(path)
    }

    fn resolve_import(&self, base: &Path, import: &str) -> Result<PathBuf, std::io::Error> {
        Ok(base.join(import))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        path.canonicalize()
    }
}

/// Provider serving files from a map, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    files: HashMap<PathBuf, String>,
}

impl InMemoryProvider {
    pub fn new(files: HashMap<PathBuf, String>) -> Self {
        Self { files }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let path = Self::normalize_path(&path.into());
        self.files.insert(path, text.into());
        self
    }

    /// Lexically resolve `.` and `..` components.
    fn normalize_path(path: &Path) -> PathBuf {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    components.pop();
                }
                other => components.push(other),
            }
        }
        components.iter().collect()
    }

    fn not_found(path: &Path) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found in memory", path.display()),
        )
    }
}

impl SourceProvider for InMemoryProvider {
    fn read_source(&self, path: &Path) -> Result<String, std::io::Error> {
        let normalized = Self::normalize_path(path);
        self.files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| Self::not_found(&normalized))
    }

    fn resolve_import(&self, base: &Path, import: &str) -> Result<PathBuf, std::io::Error> {
        Ok(Self::normalize_path(&base.join(import)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, std::io::Error> {
        let normalized = Self::normalize_path(path);
        if self.files.contains_key(&normalized) {
            Ok(normalized)
        } else {
            Err(Self::not_found(&normalized))
        }
    }
}
