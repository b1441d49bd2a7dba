//! Repository session errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::{InvalidNameError, ObjectId, StorageError};

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("not a repository: {0}")]
    NotInitialized(PathBuf),

    #[error("repository already exists: {0}")]
    AlreadyInitialized(PathBuf),

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("no common ancestor between {ours} and {theirs}")]
    NoCommonAncestor { ours: ObjectId, theirs: ObjectId },

    /// reading a file from the working directory failed
    #[error("cannot read working file '{path}': {source}")]
    WorkingFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InvalidNameError> for RepoError {
    fn from(err: InvalidNameError) -> Self {
        RepoError::Storage(StorageError::InvalidName(err))
    }
}

impl RepoError {
    /// the storage error behind this one, if any
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            RepoError::Storage(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.storage().is_some_and(StorageError::is_not_found)
    }

    pub fn is_corrupt(&self) -> bool {
        self.storage().is_some_and(StorageError::is_corrupt)
    }
}
