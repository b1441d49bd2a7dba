//! Storage layer error types
//!
//! All errors that can occur during storage operations are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages

use thiserror::Error;

use crate::storage::types::{InvalidNameError, ObjectId};

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// no object is stored under this digest
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// the digest does not name a stored commit
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectId),

    /// the path does not resolve to a file entry
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// the specified branch was not found
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// branch already exists
    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// refusing to delete the checked-out branch
    #[error("cannot delete the checked-out branch: {0}")]
    ProtectedBranch(String),

    /// the branch has no commits yet
    #[error("branch {0} has no commits yet")]
    UnbornBranch(String),

    /// branch update failed because the tip moved underneath us
    #[error("concurrent modification: branch {branch} no longer points at the expected commit")]
    ConcurrentModification { branch: String },

    /// a stored object failed structural validation or its digest check
    #[error("corrupt object {id}: {reason}")]
    Corrupt { id: ObjectId, reason: String },

    /// a path that cannot be placed in a tree
    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    /// invalid branch name
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// a string that is not a well-formed digest
    #[error("invalid object id: '{0}'")]
    InvalidObjectId(String),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::ObjectNotFound(_)
                | StorageError::CommitNotFound(_)
                | StorageError::PathNotFound(_)
                | StorageError::BranchNotFound(_)
        )
    }

    /// check if this error is a conflict with existing state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::BranchAlreadyExists(_)
                | StorageError::ProtectedBranch(_)
                | StorageError::ConcurrentModification { .. }
        )
    }

    /// check if this error means stored data can't be trusted
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }

    pub(crate) fn corrupt(id: ObjectId, reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            id,
            reason: reason.into(),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
