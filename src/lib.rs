//! vcscore - a minimal version-control core
//!
//! This crate provides the plumbing beneath a version-control tool: a
//! content-addressed object store, hierarchical snapshot trees, a
//! single-parent commit graph, branch pointers, LCS line diffs and
//! whole-file three-way merge. Argument parsing and presentation are left
//! to the caller.
//!
//! # Example
//!
//! ```
//! use vcscore::repo::Repository;
//!
//! let mut repo = Repository::in_memory();
//! repo.stage_bytes("README.md", b"# hello\n").unwrap();
//! let first = repo.commit("initial commit").unwrap();
//!
//! repo.create_branch("feature").unwrap();
//! assert_eq!(repo.log(None).unwrap()[0].id, first);
//! ```

pub mod diff;
pub mod merge;
pub mod repo;
pub mod storage;
