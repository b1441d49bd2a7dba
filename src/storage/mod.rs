//! storage layer
//!
//! this module provides the content-addressed plumbing: an object store,
//! snapshot trees over stored objects, the commit graph, and the branch
//! table. Upper layers (diff, merge, the repository session) use this API
//! and never touch stored bytes directly.
//!
//!  # Architecture
//!
//! ```text
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    refs     │──────▶│   commit    │──────▶│    tree     │
//!  │ (branches)  │  tip  │  (history)  │  tree │ (snapshots) │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!                               │                     │
//!                               └──────────┬──────────┘
//!                                          ▼
//!                                   ┌─────────────┐
//!                                   │   object    │
//!                                   │ (digest →   │
//!                                   │    bytes)   │
//!                                   └─────────────┘
//! ```
//!
//! Commits, trees and branches only hold digests; the object store owns
//! every stored byte.
//!
//! # Usage
//!
//! ```
//! use vcscore::storage::{commit, DirectoryTree, MemoryObjectStore, ObjectStore};
//!
//! let store = MemoryObjectStore::new();
//! let blob = store.put(b"fn main() {}\n").unwrap();
//!
//! let mut tree = DirectoryTree::new();
//! tree.add_file("src/main.rs", blob).unwrap();
//! let root = tree.serialize(&store).unwrap();
//!
//! let c1 = commit::create_commit(&store, root, None, "initial", "alice").unwrap();
//! assert_eq!(commit::count_all(&store, c1).unwrap(), 1);
//! ```

pub mod commit;
mod error;
mod object;
mod refs;
mod staging;
mod tree;
mod types;

// Re-export public API
pub use commit::{Commit, CommitBuilder, HistoryIterator};
pub use error::{StorageError, StorageResult};
pub use object::{FileObjectStore, MemoryObjectStore, ObjectStore};
pub use refs::{Branch, BranchTable};
pub use staging::{normalize_path, StagingArea};
pub use tree::{read_entries, validate_path, DirectoryTree, EntryKind, TreeEntry};
pub use types::{
    hash_bytes, BranchName, Change, ChangeStatus, InvalidNameError, InvalidObjectId, ObjectId,
    DIGEST_LEN,
};
