//! Line-based differencing.
//!
//! Classic LCS dynamic programming: fill the table, then backtrack from
//! `(m, n)`. When both moves keep the LCS length the backtrack emits the
//! insertion first, so after reversal deletions come before insertions
//! within a changed run. Lines compare by exact content.

mod lcs;

use std::collections::BTreeMap;

use crate::storage::{Change, ChangeStatus, ObjectId};

pub use lcs::{lcs_length, LcsTable};

/// one step of an edit script turning the old sequence into the new one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp<T> {
    Keep(T),
    Insert(T),
    Delete(T),
}

impl<T> DiffOp<T> {
    pub fn value(&self) -> &T {
        match self {
            DiffOp::Keep(v) | DiffOp::Insert(v) | DiffOp::Delete(v) => v,
        }
    }

    /// true for insertions and deletions
    pub fn is_change(&self) -> bool {
        !matches!(self, DiffOp::Keep(_))
    }
}

/// compute the edit script from `a` to `b`
pub fn diff<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<DiffOp<T>> {
    let table = LcsTable::build(a, b);
    let mut ops = Vec::with_capacity(a.len() + b.len());

    let (mut i, mut j) = (a.len(), b.len());
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            ops.push(DiffOp::Keep(a[i - 1].clone()));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table.get(i, j - 1) >= table.get(i - 1, j)) {
            ops.push(DiffOp::Insert(b[j - 1].clone()));
            j -= 1;
        } else {
            ops.push(DiffOp::Delete(a[i - 1].clone()));
            i -= 1;
        }
    }

    ops.reverse();
    ops
}

/// split text into lines; an empty text has no lines
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// diff two texts line by line
pub fn diff_text(old: &str, new: &str) -> Vec<DiffOp<String>> {
    let a = split_lines(old);
    let b = split_lines(new);
    diff(&a, &b)
        .into_iter()
        .map(|op| match op {
            DiffOp::Keep(l) => DiffOp::Keep(l.to_string()),
            DiffOp::Insert(l) => DiffOp::Insert(l.to_string()),
            DiffOp::Delete(l) => DiffOp::Delete(l.to_string()),
        })
        .collect()
}

/// counts of each op kind in an edit script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub insertions: usize,
    pub deletions: usize,
    pub unchanged: usize,
}

impl DiffStats {
    pub fn from_ops<T>(ops: &[DiffOp<T>]) -> Self {
        let mut stats = Self::default();
        for op in ops {
            match op {
                DiffOp::Keep(_) => stats.unchanged += 1,
                DiffOp::Insert(_) => stats.insertions += 1,
                DiffOp::Delete(_) => stats.deletions += 1,
            }
        }
        stats
    }
}

/// check if an edit script changes anything
pub fn has_changes<T>(ops: &[DiffOp<T>]) -> bool {
    ops.iter().any(DiffOp::is_change)
}

/// list the files that differ between two snapshots, in path order
pub fn diff_trees(
    old: &BTreeMap<String, ObjectId>,
    new: &BTreeMap<String, ObjectId>,
) -> Vec<Change> {
    let mut changes = Vec::new();

    for (path, digest) in old {
        let status = match new.get(path) {
            None => ChangeStatus::Deleted,
            Some(d) if d != digest => ChangeStatus::Modified,
            Some(_) => continue,
        };
        changes.push(Change {
            path: path.clone(),
            status,
        });
    }
    for path in new.keys().filter(|p| !old.contains_key(*p)) {
        changes.push(Change {
            path: path.clone(),
            status: ChangeStatus::Added,
        });
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}
