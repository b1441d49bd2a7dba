//! Staging area: path -> content digest entries waiting for the next commit.
//!
//! Besides file entries the area holds staged removals, paths the next commit
//! drops from the parent snapshot. Staging a path and removing it are
//! exclusive: the later call wins. Both are session state, cleared when a
//! commit is made and when another branch is checked out.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::storage::types::ObjectId;

/// staged files, ordered by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingArea {
    staged_files: BTreeMap<String, ObjectId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    removed_files: BTreeSet<String>,
}

/// normalize path separators so `a\b` and `a/b` stage the same entry
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// stage `path` with the given content digest, replacing any earlier entry
    pub fn add(&mut self, path: &str, digest: ObjectId) {
        let path = normalize_path(path);
        self.removed_files.remove(&path);
        self.staged_files.insert(path, digest);
    }

    /// unstage a path; returns the digest it had, if any
    pub fn remove(&mut self, path: &str) -> Option<ObjectId> {
        self.staged_files.remove(&normalize_path(path))
    }

    /// mark `path` for removal by the next commit, dropping any staged entry
    pub fn stage_removal(&mut self, path: &str) {
        let path = normalize_path(path);
        self.staged_files.remove(&path);
        self.removed_files.insert(path);
    }

    /// withdraw a staged removal; returns whether one was pending
    pub fn cancel_removal(&mut self, path: &str) -> bool {
        self.removed_files.remove(&normalize_path(path))
    }

    pub fn is_removed(&self, path: &str) -> bool {
        self.removed_files.contains(&normalize_path(path))
    }

    /// staged removals in path order
    pub fn removals(&self) -> &BTreeSet<String> {
        &self.removed_files
    }

    pub fn get(&self, path: &str) -> Option<ObjectId> {
        self.staged_files.get(&normalize_path(path)).copied()
    }

    pub fn is_staged(&self, path: &str) -> bool {
        self.staged_files.contains_key(&normalize_path(path))
    }

    /// all staged entries in path order
    pub fn entries(&self) -> &BTreeMap<String, ObjectId> {
        &self.staged_files
    }

    pub fn clear(&mut self) {
        self.staged_files.clear();
        self.removed_files.clear();
    }

    /// staged entries plus staged removals
    pub fn len(&self) -> usize {
        self.staged_files.len() + self.removed_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged_files.is_empty() && self.removed_files.is_empty()
    }
}
