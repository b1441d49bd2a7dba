//!  Commit creation and history traversal
//!
//! Commits are immutable records stored in the object store and keyed by
//! the digest of their serialized fields. Each commit names one tree and at
//! most one parent, so the graph is a set of parent chains sharing tails.
//! A commit can only name a parent whose digest already exists, which makes
//! cycles impossible.
//!
//! this module handles commit creation, history walking, and ancestor queries

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::object::ObjectStore;
use crate::storage::types::ObjectId;

/// a commit as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: ObjectId,
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    /// check if this is a root commit (no parent)
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// stored form of a commit; the id is the digest of these bytes
#[derive(Serialize, Deserialize)]
struct CommitJson {
    tree: ObjectId,
    parent: Option<ObjectId>,
    message: String,
    author: String,
    timestamp: DateTime<Utc>,
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    store: &'a dyn ObjectStore,
    tree: Option<ObjectId>,
    parent: Option<ObjectId>,
    message: String,
    author: String,
    timestamp: Option<DateTime<Utc>>,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            tree: None,
            parent: None,
            message: String::new(),
            author: String::from("Unknown"),
            timestamp: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree: ObjectId) -> Self {
        self.tree = Some(tree);
        self
    }

    /// set the parent commit
    pub fn parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// set or clear the parent commit
    pub fn maybe_parent(mut self, parent: Option<ObjectId>) -> Self {
        self.parent = parent;
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author name
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// pin the timestamp instead of using the current time
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// store the commit and return its ID
    ///
    /// The tree is trusted; the parent must already be a stored object.
    pub fn commit(self) -> StorageResult<ObjectId> {
        let tree = self
            .tree
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;

        if let Some(parent) = self.parent {
            if !self.store.has(&parent)? {
                return Err(StorageError::CommitNotFound(parent));
            }
        }

        let json = CommitJson {
            tree,
            parent: self.parent,
            message: self.message,
            author: self.author,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        };
        let id = self.store.put(&serde_json::to_vec(&json)?)?;

        tracing::info!(
            commit = %id,
            tree = %tree,
            parent = ?json.parent.map(|p| p.short()),
            "created commit"
        );
        Ok(id)
    }
}

/// create and store a commit, returning its digest
pub fn create_commit(
    store: &dyn ObjectStore,
    tree: ObjectId,
    parent: Option<ObjectId>,
    message: &str,
    author: &str,
) -> StorageResult<ObjectId> {
    CommitBuilder::new(store)
        .tree(tree)
        .maybe_parent(parent)
        .message(message)
        .author(author)
        .commit()
}

/// get information about a commit
pub fn get_commit(store: &dyn ObjectStore, id: ObjectId) -> StorageResult<Commit> {
    let bytes = store.get(&id).map_err(|e| match e {
        StorageError::ObjectNotFound(_) => StorageError::CommitNotFound(id),
        other => other,
    })?;

    let json: CommitJson = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(id = %id, error = %e, "corrupt commit object");
        StorageError::corrupt(id, format!("not a commit object: {}", e))
    })?;

    Ok(Commit {
        id,
        tree: json.tree,
        parent: json.parent,
        message: json.message,
        author: json.author,
        timestamp: json.timestamp,
    })
}

/// iterate over commit history by following parent links
///
/// Yields the start commit first. Stops after the root commit, after
/// `max_count` commits, or after the first error.
pub struct HistoryIterator<'a> {
    store: &'a dyn ObjectStore,
    next: Option<ObjectId>,
    remaining: Option<usize>,
}

impl<'a> HistoryIterator<'a> {
    /// create a new history iterator
    pub fn new(store: &'a dyn ObjectStore, start: ObjectId) -> Self {
        Self {
            store,
            next: Some(start),
            remaining: None,
        }
    }

    /// stop after `max_count` commits
    pub fn limit(mut self, max_count: usize) -> Self {
        self.remaining = Some(max_count);
        self
    }
}

impl<'a> Iterator for HistoryIterator<'a> {
    type Item = StorageResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let id = self.next.take()?;
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        match get_commit(self.store, id) {
            Ok(commit) => {
                self.next = commit.parent;
                Some(Ok(commit))
            }
            // `next` stays empty, so the walk ends here
            Err(e) => Some(Err(e)),
        }
    }
}

/// get history for a commit, at most `max_count` entries if given
pub fn history(
    store: &dyn ObjectStore,
    start: ObjectId,
    max_count: Option<usize>,
) -> HistoryIterator<'_> {
    let iter = HistoryIterator::new(store, start);
    match max_count {
        Some(n) => iter.limit(n),
        None => iter,
    }
}

/// count commits from `start` back to the root, inclusive
pub fn count_all(store: &dyn ObjectStore, start: ObjectId) -> StorageResult<usize> {
    let mut count = 0;
    for commit in history(store, start, None) {
        commit?;
        count += 1;
    }
    Ok(count)
}

/// collect `start` and all of its ancestors
fn ancestor_set(store: &dyn ObjectStore, start: ObjectId) -> StorageResult<HashSet<ObjectId>> {
    let mut ancestors = HashSet::new();
    for commit in history(store, start, None) {
        ancestors.insert(commit?.id);
    }
    Ok(ancestors)
}

/// find the common ancestor (merge base) of two commits
///
/// Walks all of `a`'s ancestors into a set, then walks from `b` toward its
/// root and returns the first commit in that set. With single-parent
/// commits the chains join at most once, so this is the lowest common
/// ancestor. Returns None if the histories are unrelated.
pub fn find_common_ancestor(
    store: &dyn ObjectStore,
    a: ObjectId,
    b: ObjectId,
) -> StorageResult<Option<ObjectId>> {
    let ancestors = ancestor_set(store, a)?;
    for commit in history(store, b, None) {
        let commit = commit?;
        if ancestors.contains(&commit.id) {
            return Ok(Some(commit.id));
        }
    }
    Ok(None)
}

/// check whether `ancestor` is reachable from `descendant` (or equal to it)
pub fn is_ancestor(
    store: &dyn ObjectStore,
    ancestor: ObjectId,
    descendant: ObjectId,
) -> StorageResult<bool> {
    for commit in history(store, descendant, None) {
        if commit?.id == ancestor {
            return Ok(true);
        }
    }
    Ok(false)
}
