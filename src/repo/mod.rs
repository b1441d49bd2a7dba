//! Repository session API.
//!
//! This module composes the storage, diff and merge layers into one
//! explicit session object, plus its configuration and the working
//! directory it reads from.

mod config;
mod error;
mod repository;
mod status;
mod workdir;

pub use config::{RepositoryConfig, METADATA_DIR};
pub use error::{RepoError, RepoResult};
pub use repository::{MergeReport, Repository};
pub use status::{compute_status, StatusReport};
pub use workdir::{FsWorkingDir, MemoryWorkingDir, WorkingDir};
