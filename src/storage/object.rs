//! Content-addressed object storage.
//!
//! Every object is an immutable byte sequence keyed by the digest of those
//! bytes. Writing the same bytes twice yields the same id and the second
//! write is a no-op, so objects are never updated in place.
//!
//! On disk the layout is `objects/<first two hex>/<remaining hex>` holding
//! the raw bytes.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{hash_bytes, ObjectId};

/// A byte-addressable store keyed by content digest.
pub trait ObjectStore {
    /// store bytes and return their digest; idempotent
    fn put(&self, bytes: &[u8]) -> StorageResult<ObjectId>;

    /// read the bytes stored under `id`
    fn get(&self, id: &ObjectId) -> StorageResult<Vec<u8>>;

    /// check whether an object is present
    fn has(&self, id: &ObjectId) -> StorageResult<bool>;
}

/// verify that bytes read back still hash to their key
fn verify(id: &ObjectId, bytes: Vec<u8>) -> StorageResult<Vec<u8>> {
    let actual = hash_bytes(&bytes);
    if actual != *id {
        tracing::warn!(id = %id, actual = %actual, "object digest mismatch");
        return Err(StorageError::corrupt(
            *id,
            format!("stored bytes hash to {}", actual),
        ));
    }
    Ok(bytes)
}

/// object store backed by a directory on disk
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    /// open (creating if needed) an object directory
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }

    /// count stored objects by walking the fan-out directories
    pub fn object_count(&self) -> StorageResult<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                for object in fs::read_dir(entry.path())? {
                    if object?.file_type()?.is_file() {
                        count += 1;
                    }
                }
            }
        }
        Ok(count)
    }
}

impl ObjectStore for FileObjectStore {
    fn put(&self, bytes: &[u8]) -> StorageResult<ObjectId> {
        let id = hash_bytes(bytes);
        let path = self.object_path(&id);

        if path.exists() {
            tracing::debug!(id = %id, "object already stored");
            return Ok(id);
        }

        let dir = path
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))?;
        fs::create_dir_all(dir)?;

        // write to a temp file in the same directory, then move into place,
        // so a reader never observes a partially written object
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            // another writer stored the same bytes first
            Err(e) if path.exists() => drop(e),
            Err(e) => return Err(StorageError::Io(e.error)),
        }

        tracing::debug!(id = %id, size = bytes.len(), "stored object");
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> StorageResult<Vec<u8>> {
        let path = self.object_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::ObjectNotFound(*id))
            }
            Err(e) => return Err(StorageError::Io(e)),
        };
        verify(id, bytes)
    }

    fn has(&self, id: &ObjectId) -> StorageResult<bool> {
        Ok(self.object_path(id).is_file())
    }
}

/// object store held in memory
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// number of distinct objects stored
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, bytes: &[u8]) -> StorageResult<ObjectId> {
        let id = hash_bytes(bytes);
        let mut objects = self.objects.write();
        if !objects.contains_key(&id) {
            objects.insert(id, bytes.to_vec());
            tracing::debug!(id = %id, size = bytes.len(), "stored object");
        }
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> StorageResult<Vec<u8>> {
        let bytes = self
            .objects
            .read()
            .get(id)
            .cloned()
            .ok_or(StorageError::ObjectNotFound(*id))?;
        verify(id, bytes)
    }

    fn has(&self, id: &ObjectId) -> StorageResult<bool> {
        Ok(self.objects.read().contains_key(id))
    }
}

#[cfg(test)]
impl MemoryObjectStore {
    /// overwrite stored bytes without rehashing, to simulate corruption
    pub(crate) fn tamper(&self, id: &ObjectId, bytes: &[u8]) {
        self.objects.write().insert(*id, bytes.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_store() -> (TempDir, FileObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = FileObjectStore::open(dir.path().join("objects")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_dir, store) = setup_store();
        let id = store.put(b"hello").unwrap();
        assert_eq!(store.get(&id).unwrap(), b"hello");
        assert!(store.has(&id).unwrap());
    }

    #[test]
    fn test_put_is_idempotent() {
        let (_dir, store) = setup_store();
        let first = store.put(b"same bytes").unwrap();
        let second = store.put(b"same bytes").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.object_count().unwrap(), 1);
    }

    #[test]
    fn test_layout_uses_fanout_directory() {
        let (_dir, store) = setup_store();
        let id = store.put(b"layout").unwrap();
        let hex = id.to_hex();
        let path = store.root().join(&hex[..2]).join(&hex[2..]);
        assert_eq!(fs::read(path).unwrap(), b"layout");
    }

    #[test]
    fn test_empty_object() {
        let (_dir, store) = setup_store();
        let id = store.put(b"").unwrap();
        assert!(store.get(&id).unwrap().is_empty());
    }

    #[test]
    fn test_missing_object() {
        let (_dir, store) = setup_store();
        let id = hash_bytes(b"never stored");
        assert!(!store.has(&id).unwrap());
        assert!(matches!(store.get(&id), Err(StorageError::ObjectNotFound(_))));
    }

    #[test]
    fn test_corrupt_file_detected() {
        let (_dir, store) = setup_store();
        let id = store.put(b"original").unwrap();
        fs::write(store.object_path(&id), b"tampered").unwrap();

        let result = store.get(&id);
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryObjectStore::new();
        assert!(store.is_empty());

        let a = store.put(b"a").unwrap();
        let again = store.put(b"a").unwrap();
        let b = store.put(b"b").unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&b).unwrap(), b"b");
    }

    #[test]
    fn test_memory_store_detects_tampering() {
        let store = MemoryObjectStore::new();
        let id = store.put(b"a").unwrap();
        store.tamper(&id, b"not a");
        assert!(store.get(&id).unwrap_err().is_corrupt());
    }
}
