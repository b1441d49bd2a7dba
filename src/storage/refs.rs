//!  Branch table.
//!
//! Branches are named pointers into the commit graph. A branch with no tip
//! is unborn (no commits yet). Exactly one branch is checked out at a time.
//! This module handles:
//! - branch lifecycle (create, update, delete)
//! - switching the checked-out branch
//! - persisting the whole table as one JSON document
//!
//! Tip updates are unguarded overwrites; `update_if_unchanged` gives
//! compare-and-swap semantics for callers that need it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::staging::StagingArea;
use crate::storage::types::{BranchName, ObjectId};

/// a branch and the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: BranchName,
    pub tip: Option<ObjectId>,
}

impl Branch {
    /// check if the branch has no commits yet
    pub fn is_unborn(&self) -> bool {
        self.tip.is_none()
    }
}

/// Manages branches and the checked-out branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTable {
    branches: BTreeMap<BranchName, Option<ObjectId>>,
    current: BranchName,
}

impl BranchTable {
    /// create a table holding one unborn branch, checked out
    pub fn new(initial: BranchName) -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(initial.clone(), None);
        Self {
            branches,
            current: initial,
        }
    }

    /// Check if a branch exists.
    pub fn exists(&self, name: &BranchName) -> bool {
        self.branches.contains_key(name)
    }

    /// Create a new branch pointing to the given commit.
    pub fn create(&mut self, name: BranchName, tip: Option<ObjectId>) -> StorageResult<()> {
        if self.exists(&name) {
            return Err(StorageError::BranchAlreadyExists(name.to_string()));
        }
        tracing::info!(branch = %name, tip = ?tip.map(|t| t.short()), "created branch");
        self.branches.insert(name, tip);
        Ok(())
    }

    /// Look up a branch by name.
    pub fn get(&self, name: &BranchName) -> StorageResult<Branch> {
        let tip = self
            .branches
            .get(name)
            .ok_or_else(|| StorageError::BranchNotFound(name.to_string()))?;
        Ok(Branch {
            name: name.clone(),
            tip: *tip,
        })
    }

    /// Point a branch at a new commit.
    ///
    /// This is a force update - use `update_if_unchanged` for safe updates.
    pub fn update(&mut self, name: &BranchName, tip: ObjectId) -> StorageResult<()> {
        let slot = self
            .branches
            .get_mut(name)
            .ok_or_else(|| StorageError::BranchNotFound(name.to_string()))?;
        *slot = Some(tip);
        Ok(())
    }

    /// Update a branch only if it still points to the expected commit.
    pub fn update_if_unchanged(
        &mut self,
        name: &BranchName,
        expected: Option<ObjectId>,
        tip: ObjectId,
    ) -> StorageResult<()> {
        let current = self.get(name)?.tip;
        if current != expected {
            return Err(StorageError::ConcurrentModification {
                branch: name.to_string(),
            });
        }
        self.update(name, tip)
    }

    /// Delete a branch. The checked-out branch can't be deleted.
    pub fn delete(&mut self, name: &BranchName) -> StorageResult<Branch> {
        if !self.exists(name) {
            return Err(StorageError::BranchNotFound(name.to_string()));
        }
        if *name == self.current {
            return Err(StorageError::ProtectedBranch(name.to_string()));
        }
        let tip = self.branches.remove(name).flatten();
        tracing::info!(branch = %name, "deleted branch");
        Ok(Branch {
            name: name.clone(),
            tip,
        })
    }

    /// List all branches in name order.
    pub fn list(&self) -> Vec<Branch> {
        self.branches
            .iter()
            .map(|(name, tip)| Branch {
                name: name.clone(),
                tip: *tip,
            })
            .collect()
    }

    /// Check out another branch. Staged entries are discarded.
    pub fn switch(&mut self, name: &BranchName, staging: &mut StagingArea) -> StorageResult<()> {
        if !self.exists(name) {
            return Err(StorageError::BranchNotFound(name.to_string()));
        }
        self.current = name.clone();
        staging.clear();
        tracing::info!(branch = %name, "switched branch");
        Ok(())
    }

    /// name of the checked-out branch
    pub fn current(&self) -> &BranchName {
        &self.current
    }

    /// the checked-out branch
    pub fn current_branch(&self) -> StorageResult<Branch> {
        self.get(&self.current)
    }

    /// tip of the checked-out branch, None if unborn
    pub fn current_tip(&self) -> Option<ObjectId> {
        self.branches.get(&self.current).copied().flatten()
    }

    /// serialize the whole table
    pub fn to_json(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// load a table, checking that the checked-out branch exists
    pub fn from_json(bytes: &[u8]) -> StorageResult<Self> {
        let table: Self = serde_json::from_slice(bytes)?;
        if !table.exists(&table.current) {
            return Err(StorageError::BranchNotFound(table.current.to_string()));
        }
        Ok(table)
    }
}

impl Default for BranchTable {
    fn default() -> Self {
        Self::new(BranchName::main())
    }
}
