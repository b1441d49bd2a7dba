//! Three-way merge.
//!
//! Whole-file reconciliation: each path is resolved from its base, ours and
//! theirs versions without looking inside the content. A side that matches
//! the base is unchanged; when both sides changed differently the path is a
//! conflict. Absence is treated as a version of its own, which covers the
//! add/delete cases:
//!
//! | base | ours | theirs | result            |
//! |------|------|--------|-------------------|
//! | -    | -    | T      | T (added by them) |
//! | -    | O    | -      | O (added by us)   |
//! | -    | X    | X      | X                 |
//! | -    | O    | T      | conflict          |
//! | B    | -    | -      | deleted           |
//! | B    | -    | B      | deleted           |
//! | B    | -    | T      | conflict          |
//! | B    | O    | T      | [`three_way_merge`] |

use std::collections::{BTreeMap, BTreeSet};

use crate::storage::ObjectId;

/// outcome of reconciling one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult<T> {
    Resolved(T),
    Conflict,
}

impl<T> MergeResult<T> {
    pub fn is_conflict(&self) -> bool {
        matches!(self, MergeResult::Conflict)
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            MergeResult::Resolved(v) => Some(v),
            MergeResult::Conflict => None,
        }
    }
}

/// reconcile two versions of a value against their common base
pub fn three_way_merge<T: PartialEq + Clone>(base: &T, ours: &T, theirs: &T) -> MergeResult<T> {
    if ours == theirs {
        MergeResult::Resolved(ours.clone())
    } else if ours == base {
        MergeResult::Resolved(theirs.clone())
    } else if theirs == base {
        MergeResult::Resolved(ours.clone())
    } else {
        MergeResult::Conflict
    }
}

/// reconcile one file; `None` means the file is absent on that side
///
/// `Resolved(None)` means the merged snapshot doesn't contain the file.
pub fn merge_file<T: PartialEq + Clone>(
    base: Option<&T>,
    ours: Option<&T>,
    theirs: Option<&T>,
) -> MergeResult<Option<T>> {
    three_way_merge(&base.cloned(), &ours.cloned(), &theirs.cloned())
}

/// a path both sides changed in different ways
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    pub path: String,
    pub base: Option<ObjectId>,
    pub ours: Option<ObjectId>,
    pub theirs: Option<ObjectId>,
}

/// result of merging two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// every path that resolved to a present file
    pub resolved: BTreeMap<String, ObjectId>,
    /// paths present in `ours` that the merge removes
    pub deleted: BTreeSet<String>,
    /// conflicting paths, in path order
    pub conflicts: Vec<MergeConflict>,
}

impl MergeOutcome {
    /// true if every path resolved
    pub fn is_success(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflict_paths(&self) -> Vec<&str> {
        self.conflicts.iter().map(|c| c.path.as_str()).collect()
    }

    /// resolved files whose content differs from (or is absent in) `ours`
    pub fn changed_from<'a>(
        &'a self,
        ours: &'a BTreeMap<String, ObjectId>,
    ) -> impl Iterator<Item = (&'a str, ObjectId)> + 'a {
        self.resolved
            .iter()
            .filter(move |(path, digest)| ours.get(*path) != Some(*digest))
            .map(|(path, digest)| (path.as_str(), *digest))
    }
}

/// merge three snapshots given as path -> digest maps
///
/// Digests identify content, so equal digests are equal files. Every path in
/// the union of the three maps is resolved independently.
pub fn merge_trees(
    base: &BTreeMap<String, ObjectId>,
    ours: &BTreeMap<String, ObjectId>,
    theirs: &BTreeMap<String, ObjectId>,
) -> MergeOutcome {
    let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
    let mut outcome = MergeOutcome::default();

    for path in paths {
        let (b, o, t) = (base.get(path), ours.get(path), theirs.get(path));
        match merge_file(b, o, t) {
            MergeResult::Resolved(Some(digest)) => {
                outcome.resolved.insert(path.clone(), digest);
            }
            MergeResult::Resolved(None) => {
                if o.is_some() {
                    outcome.deleted.insert(path.clone());
                }
            }
            MergeResult::Conflict => {
                tracing::debug!(path = %path, "merge conflict");
                outcome.conflicts.push(MergeConflict {
                    path: path.clone(),
                    base: b.copied(),
                    ours: o.copied(),
                    theirs: t.copied(),
                });
            }
        }
    }

    outcome
}
