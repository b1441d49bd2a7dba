//! Working directory access.
//!
//! The repository reads file contents for staging and lists files for
//! status; it never writes to the working directory.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::repo::config::METADATA_DIR;
use crate::storage::normalize_path;

/// a source of working files keyed by `/`-separated relative paths
pub trait WorkingDir: Send + Sync {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// every file path, sorted, excluding repository metadata
    fn list_files(&self) -> io::Result<Vec<String>>;
}

/// working files on disk under a root directory
#[derive(Debug, Clone)]
pub struct FsWorkingDir {
    root: PathBuf,
}

impl FsWorkingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path must be relative to the working directory: {}", path),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn collect(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type()?;
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            if file_type.is_dir() {
                if prefix.is_empty() && name == METADATA_DIR {
                    continue;
                }
                self.collect(&entry.path(), &path, out)?;
            } else if file_type.is_file() {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl WorkingDir for FsWorkingDir {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(&normalize_path(path))?)
    }

    fn list_files(&self) -> io::Result<Vec<String>> {
        let mut files = Vec::new();
        self.collect(&self.root, "", &mut files)?;
        files.sort();
        Ok(files)
    }
}

/// in-memory working files; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkingDir {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryWorkingDir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.files.write().insert(normalize_path(path), content.into());
    }

    pub fn remove_file(&self, path: &str) -> bool {
        self.files.write().remove(&normalize_path(path)).is_some()
    }
}

impl WorkingDir for MemoryWorkingDir {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn list_files(&self) -> io::Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }
}
