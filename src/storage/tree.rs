//! Directory tree snapshots.
//!
//! A snapshot maps slash-separated paths to content digests. In memory the
//! tree is an arena of directory nodes addressed by index; entries are a
//! tagged `File`/`Directory` variant. When written to the object store each
//! directory becomes one object: the canonical JSON encoding of its entries
//! sorted by name, so equal trees always produce equal digests.
//!
//! ```text
//! root ──┬── README.md      File(d1)
//!        └── src ──┬── lib.rs   File(d2)
//!                  └── util ── mod.rs  File(d3)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::object::ObjectStore;
use crate::storage::types::ObjectId;

/// index of the root directory in the arena
const ROOT: usize = 0;

/// kind of a serialized tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// one entry of a stored directory object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub digest: ObjectId,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    File(ObjectId),
    Directory(usize),
}

#[derive(Debug, Clone, Default)]
struct DirNode {
    children: BTreeMap<String, Node>,
}

/// an n-ary tree of directories and files built for one snapshot
///
/// Directory slots detached by an overwrite or a removal go on a free list
/// and are reused by the next directory created.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    dirs: Vec<DirNode>,
    free: Vec<usize>,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

/// split a path into its segments, rejecting anything that can't be a tree path
fn split_path(path: &str) -> StorageResult<Vec<&str>> {
    if path.is_empty() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| !is_valid_segment(s)) {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// check that a path can be placed in a tree
pub fn validate_path(path: &str) -> StorageResult<()> {
    split_path(path).map(|_| ())
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('/')
}

impl DirectoryTree {
    /// create an empty tree (root directory only)
    pub fn new() -> Self {
        Self {
            dirs: vec![DirNode::default()],
            free: Vec::new(),
        }
    }

    /// build a tree from `(path, digest)` pairs
    pub fn from_files<'a, I>(files: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = (&'a str, ObjectId)>,
    {
        let mut tree = Self::new();
        for (path, digest) in files {
            tree.add_file(path, digest)?;
        }
        Ok(tree)
    }

    fn new_dir(&mut self) -> usize {
        match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.dirs.push(DirNode::default());
                self.dirs.len() - 1
            }
        }
    }

    /// return a detached node's directory slots to the free list
    fn release(&mut self, node: Option<Node>) {
        let mut pending = match node {
            Some(Node::Directory(idx)) => vec![idx],
            _ => return,
        };
        while let Some(idx) = pending.pop() {
            let children = std::mem::take(&mut self.dirs[idx].children);
            pending.extend(children.into_values().filter_map(|child| match child {
                Node::Directory(sub) => Some(sub),
                Node::File(_) => None,
            }));
            self.free.push(idx);
        }
    }

    /// add a file, creating intermediate directories as needed
    ///
    /// The last segment overwrites any entry of the same name. An
    /// intermediate segment that currently names a file is replaced by a
    /// directory.
    pub fn add_file(&mut self, path: &str, digest: ObjectId) -> StorageResult<()> {
        let segments = split_path(path)?;
        let Some((file_name, parents)) = segments.split_last() else {
            return Err(StorageError::InvalidPath(path.to_string()));
        };

        let mut current = ROOT;
        for segment in parents {
            let existing = match self.dirs[current].children.get(*segment) {
                Some(Node::Directory(idx)) => Some(*idx),
                _ => None,
            };
            current = match existing {
                Some(idx) => idx,
                None => {
                    let idx = self.new_dir();
                    self.dirs[current]
                        .children
                        .insert(segment.to_string(), Node::Directory(idx));
                    idx
                }
            };
        }

        let replaced = self.dirs[current]
            .children
            .insert(file_name.to_string(), Node::File(digest));
        self.release(replaced);
        Ok(())
    }

    /// remove the file at `path`; returns its digest, or None if absent
    ///
    /// Directories left empty by the removal are dropped as well, so the
    /// tree serializes the same as one built without the file.
    pub fn remove_file(&mut self, path: &str) -> StorageResult<Option<ObjectId>> {
        let segments = split_path(path)?;
        let Some((file_name, parents)) = segments.split_last() else {
            return Err(StorageError::InvalidPath(path.to_string()));
        };

        // (parent, name) for every directory on the way down
        let mut trail = Vec::with_capacity(parents.len());
        let mut current = ROOT;
        for segment in parents {
            match self.dirs[current].children.get(*segment) {
                Some(Node::Directory(idx)) => {
                    trail.push((current, *segment));
                    current = *idx;
                }
                _ => return Ok(None),
            }
        }

        let digest = match self.dirs[current].children.get(*file_name) {
            Some(Node::File(digest)) => *digest,
            _ => return Ok(None),
        };
        self.dirs[current].children.remove(*file_name);

        while let Some((parent, name)) = trail.pop() {
            if !self.dirs[current].children.is_empty() {
                break;
            }
            let detached = self.dirs[parent].children.remove(name);
            self.release(detached);
            current = parent;
        }
        Ok(Some(digest))
    }

    /// get the digest of the file at `path`
    pub fn get_file_digest(&self, path: &str) -> StorageResult<ObjectId> {
        let not_found = || StorageError::PathNotFound(path.to_string());
        let segments = split_path(path).map_err(|_| not_found())?;

        let mut current = ROOT;
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            match self.dirs[current].children.get(*segment) {
                Some(Node::File(digest)) if i == last => return Ok(*digest),
                Some(Node::Directory(idx)) if i < last => current = *idx,
                _ => return Err(not_found()),
            }
        }
        Err(not_found())
    }

    /// check whether `path` resolves to a file
    pub fn contains_file(&self, path: &str) -> bool {
        self.get_file_digest(path).is_ok()
    }

    /// all files as `(path, digest)`, depth-first in name order
    pub fn list_files(&self) -> Vec<(String, ObjectId)> {
        let mut files = Vec::new();
        self.collect_files(ROOT, "", &mut files);
        files
    }

    fn collect_files(&self, dir: usize, prefix: &str, out: &mut Vec<(String, ObjectId)>) {
        for (name, node) in &self.dirs[dir].children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            match node {
                Node::File(digest) => out.push((path, *digest)),
                Node::Directory(idx) => self.collect_files(*idx, &path, out),
            }
        }
    }

    /// files as an ordered path -> digest map
    pub fn file_map(&self) -> BTreeMap<String, ObjectId> {
        self.list_files().into_iter().collect()
    }

    /// number of files in the tree
    pub fn file_count(&self) -> usize {
        self.list_files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs[ROOT].children.is_empty()
    }

    /// write every directory bottom-up and return the root digest
    pub fn serialize(&self, store: &dyn ObjectStore) -> StorageResult<ObjectId> {
        let root = self.write_dir(store, ROOT)?;
        tracing::debug!(tree = %root, "serialized tree");
        Ok(root)
    }

    fn write_dir(&self, store: &dyn ObjectStore, dir: usize) -> StorageResult<ObjectId> {
        let mut entries = Vec::with_capacity(self.dirs[dir].children.len());
        for (name, node) in &self.dirs[dir].children {
            let entry = match node {
                Node::File(digest) => TreeEntry {
                    name: name.clone(),
                    kind: EntryKind::File,
                    digest: *digest,
                },
                Node::Directory(idx) => TreeEntry {
                    name: name.clone(),
                    kind: EntryKind::Directory,
                    digest: self.write_dir(store, *idx)?,
                },
            };
            entries.push(entry);
        }
        store.put(&encode_entries(&entries)?)
    }

    /// rebuild a tree from the digest of its root directory
    pub fn deserialize(store: &dyn ObjectStore, digest: ObjectId) -> StorageResult<Self> {
        let mut tree = Self::new();
        tree.load_dir(store, digest, ROOT)?;
        Ok(tree)
    }

    fn load_dir(&mut self, store: &dyn ObjectStore, digest: ObjectId, dir: usize) -> StorageResult<()> {
        for entry in read_entries(store, digest)? {
            let node = match entry.kind {
                EntryKind::File => Node::File(entry.digest),
                EntryKind::Directory => {
                    let idx = self.new_dir();
                    self.load_dir(store, entry.digest, idx)?;
                    Node::Directory(idx)
                }
            };
            self.dirs[dir].children.insert(entry.name, node);
        }
        Ok(())
    }
}

fn encode_entries(entries: &[TreeEntry]) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(entries)?)
}

/// read and validate one stored directory object
///
/// Entries must be uniquely named, sorted by name, and stored in the
/// canonical encoding; anything else means the object is corrupt.
pub fn read_entries(store: &dyn ObjectStore, digest: ObjectId) -> StorageResult<Vec<TreeEntry>> {
    let corrupt = |reason: String| {
        tracing::warn!(id = %digest, reason = %reason, "corrupt directory object");
        StorageError::corrupt(digest, reason)
    };

    let bytes = store.get(&digest)?;
    let entries: Vec<TreeEntry> = serde_json::from_slice(&bytes)
        .map_err(|e| corrupt(format!("not a directory object: {}", e)))?;

    if let Some(entry) = entries.iter().find(|e| !is_valid_segment(&e.name)) {
        return Err(corrupt(format!("invalid entry name '{}'", entry.name)));
    }
    if entries.windows(2).any(|pair| pair[0].name >= pair[1].name) {
        return Err(corrupt("entries not sorted or not unique".to_string()));
    }
    if encode_entries(&entries)? != bytes {
        return Err(corrupt("non-canonical directory encoding".to_string()));
    }
    Ok(entries)
}
