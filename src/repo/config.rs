//! Repository configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::repo::error::{RepoError, RepoResult};
use crate::storage::BranchName;

/// name of the metadata directory under the repository root
pub const METADATA_DIR: &str = ".vcscore";

/// Repository configuration options.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Working directory root; metadata lives in `<path>/.vcscore`.
    pub path: PathBuf,
    /// Author recorded on new commits.
    pub author: String,
    /// Branch checked out in a fresh repository.
    pub default_branch: BranchName,
    /// Initialize if no repository exists at `path`.
    pub create_if_missing: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            author: "Unknown".to_string(),
            default_branch: BranchName::main(),
            create_if_missing: true,
        }
    }
}

impl RepositoryConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the commit author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the initial branch.
    pub fn default_branch(mut self, branch: BranchName) -> Self {
        self.default_branch = branch;
        self
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.path.join(METADATA_DIR)
    }

    pub fn validate(&self) -> RepoResult<()> {
        if self.author.trim().is_empty() {
            return Err(RepoError::InvalidConfig("author cannot be empty".to_string()));
        }
        if self.author.contains('\n') {
            return Err(RepoError::InvalidConfig(
                "author must be a single line".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn to_document(&self) -> ConfigDocument {
        ConfigDocument {
            author: self.author.clone(),
            default_branch: self.default_branch.clone(),
        }
    }

    /// overlay the persisted settings onto this config
    pub(crate) fn apply_document(&mut self, doc: ConfigDocument) {
        self.author = doc.author;
        self.default_branch = doc.default_branch;
    }
}

/// the part of the configuration stored in the metadata directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ConfigDocument {
    pub author: String,
    pub default_branch: BranchName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = RepositoryConfig::new("/tmp/work");
        assert_eq!(config.path, PathBuf::from("/tmp/work"));
        assert_eq!(config.author, "Unknown");
        assert_eq!(config.default_branch.as_str(), "main");
        assert!(config.create_if_missing);
        assert_eq!(config.metadata_dir(), PathBuf::from("/tmp/work/.vcscore"));
    }

    #[test]
    fn test_builder_setters() {
        let dev = BranchName::new("dev").unwrap();
        let config = RepositoryConfig::new("repo")
            .author("alice")
            .default_branch(dev.clone())
            .create_if_missing(false);
        assert_eq!(config.author, "alice");
        assert_eq!(config.default_branch, dev);
        assert!(!config.create_if_missing);
    }

    #[test]
    fn test_validate_author() {
        assert!(RepositoryConfig::default().validate().is_ok());
        assert!(matches!(
            RepositoryConfig::default().author("  ").validate(),
            Err(RepoError::InvalidConfig(_))
        ));
        assert!(matches!(
            RepositoryConfig::default().author("a\nb").validate(),
            Err(RepoError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_document_roundtrip() {
        let config = RepositoryConfig::new("x").author("bob");
        let json = serde_json::to_string(&config.to_document()).unwrap();
        let doc: ConfigDocument = serde_json::from_str(&json).unwrap();

        let mut reloaded = RepositoryConfig::new("x");
        reloaded.apply_document(doc);
        assert_eq!(reloaded.author, "bob");
        assert_eq!(reloaded.default_branch.as_str(), "main");
    }
}
