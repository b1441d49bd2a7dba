//! Working tree status classification.
//!
//! Each path is compared across three digest maps: the working directory,
//! the staging area and the checked-out commit. A staged path reports its
//! staged state and, separately, whether the working file has drifted from
//! what was staged. An unstaged path is compared against the commit. A path
//! staged for removal is reported as a staged deletion, and as untracked if
//! the working file is still there.

use std::collections::{BTreeMap, BTreeSet};

use crate::storage::ObjectId;

/// paths grouped by status, each list in path order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// staged, not in the commit
    pub staged_new: Vec<String>,
    /// staged with content different from the commit
    pub staged_modified: Vec<String>,
    /// committed, staged for removal
    pub staged_deleted: Vec<String>,
    /// working content differs from the staged or committed version
    pub not_staged_modified: Vec<String>,
    /// staged or committed, missing from the working directory
    pub not_staged_deleted: Vec<String>,
    /// neither staged nor committed
    pub untracked: Vec<String>,
}

impl StatusReport {
    /// true if nothing is staged, modified, deleted or untracked
    pub fn is_clean(&self) -> bool {
        self.staged_new.is_empty()
            && self.staged_modified.is_empty()
            && self.staged_deleted.is_empty()
            && self.not_staged_modified.is_empty()
            && self.not_staged_deleted.is_empty()
            && self.untracked.is_empty()
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged_new.is_empty()
            || !self.staged_modified.is_empty()
            || !self.staged_deleted.is_empty()
    }
}

pub fn compute_status(
    working: &BTreeMap<String, ObjectId>,
    staged: &BTreeMap<String, ObjectId>,
    removed: &BTreeSet<String>,
    committed: &BTreeMap<String, ObjectId>,
) -> StatusReport {
    let paths: BTreeSet<&String> = working
        .keys()
        .chain(staged.keys())
        .chain(removed.iter())
        .chain(committed.keys())
        .collect();
    let mut report = StatusReport::default();

    for path in paths {
        let work = working.get(path);
        let commit = committed.get(path);

        if removed.contains(path) {
            if commit.is_some() {
                report.staged_deleted.push(path.clone());
            }
            if work.is_some() {
                report.untracked.push(path.clone());
            }
            continue;
        }

        match staged.get(path) {
            Some(stage) => {
                match commit {
                    None => report.staged_new.push(path.clone()),
                    Some(c) if c != stage => report.staged_modified.push(path.clone()),
                    Some(_) => {}
                }
                match work {
                    None => report.not_staged_deleted.push(path.clone()),
                    Some(w) if w != stage => report.not_staged_modified.push(path.clone()),
                    Some(_) => {}
                }
            }
            None => match (commit, work) {
                (Some(_), None) => report.not_staged_deleted.push(path.clone()),
                (Some(c), Some(w)) if c != w => report.not_staged_modified.push(path.clone()),
                (None, Some(_)) => report.untracked.push(path.clone()),
                _ => {}
            },
        }
    }

    report
}
