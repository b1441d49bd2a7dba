//! Repository session.
//!
//! A `Repository` owns one object store, the branch table and the staging
//! area, and exposes the porcelain-facing operations: staging, committing,
//! history, branching, diff and merge. On-disk repositories keep their
//! state under `<root>/.vcscore`:
//!
//! ```text
//! .vcscore/
//!   objects/<2 hex>/<62 hex>   stored objects
//!   refs/branches.json         branch table
//!   index                      staged entries
//!   config                     author, default branch
//! ```
//!
//! The session is single-writer: nothing here locks the metadata directory.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::diff::{self, DiffOp};
use crate::merge::{self, MergeConflict};
use crate::repo::config::{ConfigDocument, RepositoryConfig};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::status::{compute_status, StatusReport};
use crate::repo::workdir::{FsWorkingDir, MemoryWorkingDir, WorkingDir};
use crate::storage::commit::{self, Commit, CommitBuilder};
use crate::storage::{
    hash_bytes, normalize_path, validate_path, Branch, BranchName, BranchTable, Change,
    DirectoryTree, FileObjectStore, MemoryObjectStore, ObjectId, ObjectStore, StagingArea,
    StorageError,
};

/// where an on-disk repository keeps its documents
#[derive(Debug, Clone)]
struct Layout {
    meta: PathBuf,
}

impl Layout {
    fn objects(&self) -> PathBuf {
        self.meta.join("objects")
    }

    fn branches(&self) -> PathBuf {
        self.meta.join("refs").join("branches.json")
    }

    fn index(&self) -> PathBuf {
        self.meta.join("index")
    }

    fn config(&self) -> PathBuf {
        self.meta.join("config")
    }

    /// replace a document atomically
    fn write(&self, path: &Path, bytes: &[u8]) -> RepoResult<()> {
        let dir = path.parent().unwrap_or(self.meta.as_path());
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| RepoError::Io(e.error))?;
        Ok(())
    }

    fn read(&self, path: &Path) -> RepoResult<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RepoError::Io(e)),
        }
    }
}

/// outcome of merging a branch into the checked-out branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeReport {
    /// the other branch is already contained in ours
    AlreadyUpToDate,
    /// our branch was moved forward to the other tip
    FastForward { from: Option<ObjectId>, to: ObjectId },
    /// every path resolved; a snapshot commit was made on our branch
    Merged {
        commit: ObjectId,
        base: ObjectId,
        changed: Vec<String>,
        deleted: Vec<String>,
    },
    /// some paths conflict; resolutions that differ from ours were staged,
    /// resolved deletions were staged as removals
    Conflicted {
        base: ObjectId,
        conflicts: Vec<MergeConflict>,
        staged: Vec<String>,
        removed: Vec<String>,
    },
}

impl MergeReport {
    pub fn is_success(&self) -> bool {
        !matches!(self, MergeReport::Conflicted { .. })
    }

    pub fn conflict_paths(&self) -> Vec<&str> {
        match self {
            MergeReport::Conflicted { conflicts, .. } => {
                conflicts.iter().map(|c| c.path.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// The main repository handle.
pub struct Repository {
    config: RepositoryConfig,
    store: Box<dyn ObjectStore>,
    workdir: Box<dyn WorkingDir>,
    layout: Option<Layout>,
    branches: BranchTable,
    staging: StagingArea,
}

impl Repository {
    /// Initialize a new repository at the configured path.
    pub fn init(config: RepositoryConfig) -> RepoResult<Self> {
        config.validate()?;
        let layout = Layout {
            meta: config.metadata_dir(),
        };
        if layout.meta.exists() {
            return Err(RepoError::AlreadyInitialized(config.path.clone()));
        }

        std::fs::create_dir_all(layout.meta.join("refs"))?;
        let store = FileObjectStore::open(layout.objects())?;

        let repo = Self {
            branches: BranchTable::new(config.default_branch.clone()),
            staging: StagingArea::new(),
            workdir: Box::new(FsWorkingDir::new(&config.path)),
            store: Box::new(store),
            layout: Some(layout),
            config,
        };
        repo.save_config()?;
        repo.save_branches()?;
        repo.save_staging()?;

        tracing::info!(
            path = %repo.config.path.display(),
            branch = %repo.config.default_branch,
            "initialized repository"
        );
        Ok(repo)
    }

    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::open_with_config(RepositoryConfig::new(path.as_ref()).create_if_missing(false))
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::open_with_config(RepositoryConfig::new(path.as_ref()))
    }

    /// Open a repository, initializing it if `create_if_missing` is set.
    ///
    /// Settings stored in an existing repository take precedence over the
    /// ones in `config`.
    pub fn open_with_config(mut config: RepositoryConfig) -> RepoResult<Self> {
        let layout = Layout {
            meta: config.metadata_dir(),
        };
        if !layout.meta.is_dir() {
            if config.create_if_missing {
                return Self::init(config);
            }
            return Err(RepoError::NotInitialized(config.path.clone()));
        }

        if let Some(bytes) = layout.read(&layout.config())? {
            let doc: ConfigDocument = serde_json::from_slice(&bytes)
                .map_err(|e| RepoError::InvalidConfig(e.to_string()))?;
            config.apply_document(doc);
        }
        config.validate()?;

        let branches = match layout.read(&layout.branches())? {
            Some(bytes) => BranchTable::from_json(&bytes)?,
            None => BranchTable::new(config.default_branch.clone()),
        };
        let staging: StagingArea = match layout.read(&layout.index())? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(StorageError::from)?,
            None => StagingArea::new(),
        };
        let store = FileObjectStore::open(layout.objects())?;

        tracing::debug!(
            path = %config.path.display(),
            branch = %branches.current(),
            staged = staging.len(),
            "opened repository"
        );
        Ok(Self {
            workdir: Box::new(FsWorkingDir::new(&config.path)),
            store: Box::new(store),
            layout: Some(layout),
            branches,
            staging,
            config,
        })
    }

    /// Create a repository held entirely in memory (for testing).
    pub fn in_memory() -> Self {
        Self::in_memory_with(RepositoryConfig::default(), MemoryWorkingDir::new())
    }

    /// Create an in-memory repository reading files from `workdir`.
    pub fn in_memory_with(config: RepositoryConfig, workdir: impl WorkingDir + 'static) -> Self {
        Self {
            branches: BranchTable::new(config.default_branch.clone()),
            staging: StagingArea::new(),
            store: Box::new(MemoryObjectStore::new()),
            workdir: Box::new(workdir),
            layout: None,
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// name of the checked-out branch
    pub fn current_branch(&self) -> &BranchName {
        self.branches.current()
    }

    /// tip of the checked-out branch, None before the first commit
    pub fn head(&self) -> Option<ObjectId> {
        self.branches.current_tip()
    }

    // ==================== Staging ====================

    /// Stage a file from the working directory.
    pub fn add(&mut self, path: &str) -> RepoResult<ObjectId> {
        let path = normalize_path(path);
        let bytes = self
            .workdir
            .read_file(&path)
            .map_err(|source| RepoError::WorkingFile {
                path: path.clone(),
                source,
            })?;
        self.stage_bytes(&path, &bytes)
    }

    /// Stage several files; stops at the first one that can't be read.
    pub fn add_all<'p>(
        &mut self,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> RepoResult<Vec<ObjectId>> {
        paths.into_iter().map(|p| self.add(p)).collect()
    }

    /// Stage content directly under `path`.
    pub fn stage_bytes(&mut self, path: &str, bytes: &[u8]) -> RepoResult<ObjectId> {
        let path = normalize_path(path);
        validate_path(&path)?;
        let digest = self.store.put(bytes)?;
        self.staging.add(&path, digest);
        self.save_staging()?;
        tracing::debug!(path = %path, id = %digest, "staged file");
        Ok(digest)
    }

    /// Stage the removal of `path` from the next commit.
    ///
    /// The working file is left alone.
    pub fn stage_removal(&mut self, path: &str) -> RepoResult<()> {
        let path = normalize_path(path);
        validate_path(&path)?;
        self.staging.stage_removal(&path);
        self.save_staging()?;
        tracing::debug!(path = %path, "staged removal");
        Ok(())
    }

    /// Drop a staged entry or staged removal; returns whether there was one.
    pub fn unstage(&mut self, path: &str) -> RepoResult<bool> {
        let had_entry = self.staging.remove(path).is_some();
        let had_removal = self.staging.cancel_removal(path);
        if had_entry || had_removal {
            self.save_staging()?;
        }
        Ok(had_entry || had_removal)
    }

    // ==================== Commits ====================

    /// Commit staged entries on top of the checked-out branch.
    ///
    /// The new snapshot is the parent snapshot with every staged entry
    /// written over it and every staged removal dropped from it.
    pub fn commit(&mut self, message: &str) -> RepoResult<ObjectId> {
        if self.staging.is_empty() {
            return Err(RepoError::NothingToCommit);
        }

        let parent = self.head();
        let mut tree = match parent {
            Some(id) => self.tree_at(id)?,
            None => DirectoryTree::new(),
        };
        for (path, digest) in self.staging.entries() {
            tree.add_file(path, *digest)?;
        }
        for path in self.staging.removals() {
            tree.remove_file(path)?;
        }

        let id = self.commit_tree(&tree, parent, message)?;
        self.staging.clear();
        self.save_staging()?;
        Ok(id)
    }

    /// store `tree` and advance the checked-out branch to a new commit on it
    fn commit_tree(
        &mut self,
        tree: &DirectoryTree,
        parent: Option<ObjectId>,
        message: &str,
    ) -> RepoResult<ObjectId> {
        let root = tree.serialize(self.store.as_ref())?;
        let id = CommitBuilder::new(self.store.as_ref())
            .tree(root)
            .maybe_parent(parent)
            .message(message)
            .author(self.config.author.as_str())
            .commit()?;

        let branch = self.branches.current().clone();
        self.branches.update_if_unchanged(&branch, parent, id)?;
        self.save_branches()?;
        Ok(id)
    }

    /// History of the checked-out branch, newest first.
    pub fn log(&self, max_count: Option<usize>) -> RepoResult<Vec<Commit>> {
        let Some(tip) = self.head() else {
            return Ok(Vec::new());
        };
        let commits = commit::history(self.store.as_ref(), tip, max_count)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(commits)
    }

    /// Number of commits reachable from the checked-out branch.
    pub fn commit_count(&self) -> RepoResult<usize> {
        match self.head() {
            Some(tip) => Ok(commit::count_all(self.store.as_ref(), tip)?),
            None => Ok(0),
        }
    }

    pub fn get_commit(&self, id: ObjectId) -> RepoResult<Commit> {
        Ok(commit::get_commit(self.store.as_ref(), id)?)
    }

    // ==================== Status ====================

    /// Classify working, staged and committed files.
    pub fn status(&self) -> RepoResult<StatusReport> {
        let mut working = BTreeMap::new();
        for path in self.workdir.list_files()? {
            let bytes = self
                .workdir
                .read_file(&path)
                .map_err(|source| RepoError::WorkingFile {
                    path: path.clone(),
                    source,
                })?;
            working.insert(path, hash_bytes(&bytes));
        }
        let committed = self.snapshot(self.head())?;
        Ok(compute_status(
            &working,
            self.staging.entries(),
            self.staging.removals(),
            &committed,
        ))
    }

    // ==================== Branches ====================

    /// Create a branch at the checked-out branch's tip.
    pub fn create_branch(&mut self, name: &str) -> RepoResult<Branch> {
        let name = BranchName::new(name)?;
        let tip = self
            .head()
            .ok_or_else(|| StorageError::UnbornBranch(self.branches.current().to_string()))?;
        self.branches.create(name.clone(), Some(tip))?;
        self.save_branches()?;
        Ok(self.branches.get(&name)?)
    }

    pub fn delete_branch(&mut self, name: &str) -> RepoResult<Branch> {
        let branch = self.branches.delete(&BranchName::new(name)?)?;
        self.save_branches()?;
        Ok(branch)
    }

    pub fn list_branches(&self) -> Vec<Branch> {
        self.branches.list()
    }

    /// Switch to another branch, discarding staged entries.
    pub fn checkout(&mut self, name: &str) -> RepoResult<()> {
        let name = BranchName::new(name)?;
        self.branches.switch(&name, &mut self.staging)?;
        self.save_branches()?;
        self.save_staging()?;
        Ok(())
    }

    // ==================== Snapshots & diff ====================

    fn tree_at(&self, commit_id: ObjectId) -> RepoResult<DirectoryTree> {
        let commit = commit::get_commit(self.store.as_ref(), commit_id)?;
        Ok(DirectoryTree::deserialize(self.store.as_ref(), commit.tree)?)
    }

    /// path -> digest for a commit; empty for None
    fn snapshot(&self, commit_id: Option<ObjectId>) -> RepoResult<BTreeMap<String, ObjectId>> {
        match commit_id {
            Some(id) => Ok(self.tree_at(id)?.file_map()),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Every file in a commit's snapshot.
    pub fn files_at(&self, commit_id: ObjectId) -> RepoResult<BTreeMap<String, ObjectId>> {
        self.snapshot(Some(commit_id))
    }

    /// Content of `path` as of a commit.
    pub fn read_file_at(&self, commit_id: ObjectId, path: &str) -> RepoResult<Vec<u8>> {
        let digest = self
            .tree_at(commit_id)?
            .get_file_digest(&normalize_path(path))?;
        Ok(self.store.get(&digest)?)
    }

    /// Line diff of a file from the checked-out commit to the working copy.
    ///
    /// A side where the file is missing counts as empty text.
    pub fn diff_file(&self, path: &str) -> RepoResult<Vec<DiffOp<String>>> {
        let path = normalize_path(path);
        let committed = match self.head() {
            Some(tip) => match self.read_file_at(tip, &path) {
                Ok(bytes) => bytes,
                Err(RepoError::Storage(StorageError::PathNotFound(_))) => Vec::new(),
                Err(e) => return Err(e),
            },
            None => Vec::new(),
        };
        let working = match self.workdir.read_file(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(RepoError::WorkingFile { path, source }),
        };

        Ok(diff::diff_text(
            &String::from_utf8_lossy(&committed),
            &String::from_utf8_lossy(&working),
        ))
    }

    /// Files added, deleted or modified between two commits.
    pub fn diff_commits(&self, from: ObjectId, to: ObjectId) -> RepoResult<Vec<Change>> {
        let old = self.files_at(from)?;
        let new = self.files_at(to)?;
        Ok(diff::diff_trees(&old, &new))
    }

    // ==================== Merge ====================

    /// Merge another branch into the checked-out branch.
    pub fn merge(&mut self, name: &str) -> RepoResult<MergeReport> {
        let other = self.branches.get(&BranchName::new(name)?)?;
        let theirs = other
            .tip
            .ok_or_else(|| StorageError::UnbornBranch(other.name.to_string()))?;
        let current = self.branches.current().clone();

        let ours = match self.head() {
            Some(ours) => ours,
            None => return self.fast_forward(&current, None, theirs),
        };
        if ours == theirs || commit::is_ancestor(self.store(), theirs, ours)? {
            tracing::info!(branch = %other.name, "already up to date");
            return Ok(MergeReport::AlreadyUpToDate);
        }
        if commit::is_ancestor(self.store(), ours, theirs)? {
            return self.fast_forward(&current, Some(ours), theirs);
        }

        let base = commit::find_common_ancestor(self.store(), ours, theirs)?
            .ok_or(RepoError::NoCommonAncestor { ours, theirs })?;

        let base_files = self.snapshot(Some(base))?;
        let our_files = self.snapshot(Some(ours))?;
        let their_files = self.snapshot(Some(theirs))?;
        let outcome = merge::merge_trees(&base_files, &our_files, &their_files);
        let changed: Vec<(String, ObjectId)> = outcome
            .changed_from(&our_files)
            .map(|(p, d)| (p.to_string(), d))
            .collect();
        let deleted: Vec<String> = outcome.deleted.iter().cloned().collect();

        if !outcome.is_success() {
            for (path, digest) in &changed {
                self.staging.add(path, *digest);
            }
            for path in &deleted {
                self.staging.stage_removal(path);
            }
            self.save_staging()?;
            tracing::info!(
                branch = %other.name,
                conflicts = outcome.conflicts.len(),
                staged = changed.len(),
                removed = deleted.len(),
                "merge has conflicts"
            );
            return Ok(MergeReport::Conflicted {
                base,
                conflicts: outcome.conflicts,
                staged: changed.into_iter().map(|(p, _)| p).collect(),
                removed: deleted,
            });
        }

        let tree =
            DirectoryTree::from_files(outcome.resolved.iter().map(|(p, d)| (p.as_str(), *d)))?;
        let message = format!("Merge branch '{}' into {}", other.name, current);
        let commit = self.commit_tree(&tree, Some(ours), &message)?;

        tracing::info!(branch = %other.name, commit = %commit, base = %base, "merged");
        Ok(MergeReport::Merged {
            commit,
            base,
            changed: changed.into_iter().map(|(p, _)| p).collect(),
            deleted,
        })
    }

    fn fast_forward(
        &mut self,
        branch: &BranchName,
        from: Option<ObjectId>,
        to: ObjectId,
    ) -> RepoResult<MergeReport> {
        self.branches.update_if_unchanged(branch, from, to)?;
        self.save_branches()?;
        tracing::info!(branch = %branch, to = %to, "fast-forward");
        Ok(MergeReport::FastForward { from, to })
    }

    // ==================== Persistence ====================

    fn save_branches(&self) -> RepoResult<()> {
        if let Some(layout) = &self.layout {
            layout.write(&layout.branches(), &self.branches.to_json()?)?;
        }
        Ok(())
    }

    fn save_staging(&self) -> RepoResult<()> {
        if let Some(layout) = &self.layout {
            let bytes = serde_json::to_vec_pretty(&self.staging).map_err(StorageError::from)?;
            layout.write(&layout.index(), &bytes)?;
        }
        Ok(())
    }

    fn save_config(&self) -> RepoResult<()> {
        if let Some(layout) = &self.layout {
            let bytes = serde_json::to_vec_pretty(&self.config.to_document())
                .map_err(StorageError::from)?;
            layout.write(&layout.config(), &bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ChangeStatus;
    use tempfile::TempDir;

    fn memory_repo() -> (Repository, MemoryWorkingDir) {
        let wd = MemoryWorkingDir::new();
        let config = RepositoryConfig::default().author("tester");
        let repo = Repository::in_memory_with(config, wd.clone());
        (repo, wd)
    }

    fn commit_file(repo: &mut Repository, path: &str, content: &str, message: &str) -> ObjectId {
        repo.stage_bytes(path, content.as_bytes()).unwrap();
        repo.commit(message).unwrap()
    }

    #[test]
    fn test_init_creates_layout() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(RepositoryConfig::new(dir.path())).unwrap();

        let meta = dir.path().join(".vcscore");
        assert!(meta.join("objects").is_dir());
        assert!(meta.join("refs/branches.json").is_file());
        assert!(meta.join("index").is_file());
        assert!(meta.join("config").is_file());
        assert_eq!(repo.current_branch().as_str(), "main");
        assert_eq!(repo.head(), None);
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        Repository::init(RepositoryConfig::new(dir.path())).unwrap();
        let result = Repository::init(RepositoryConfig::new(dir.path()));
        assert!(matches!(result, Err(RepoError::AlreadyInitialized(_))));
    }

    #[test]
    fn test_open_missing_repository() {
        let dir = TempDir::new().unwrap();
        let result = Repository::open(dir.path());
        assert!(matches!(result, Err(RepoError::NotInitialized(_))));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"staged only\n").unwrap();

        let first = {
            let config = RepositoryConfig::new(dir.path()).author("alice");
            let mut repo = Repository::open_with_config(config).unwrap();
            repo.add("a.txt").unwrap();
            let c1 = repo.commit("first").unwrap();
            repo.create_branch("dev").unwrap();
            repo.add("b.txt").unwrap();
            c1
        };

        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.head(), Some(first));
        assert_eq!(repo.config().author, "alice");
        assert!(repo.staging().is_staged("b.txt"));
        assert_eq!(repo.list_branches().len(), 2);
        assert_eq!(repo.log(None).unwrap()[0].author, "alice");
        assert_eq!(repo.read_file_at(first, "a.txt").unwrap(), b"hello\n");
    }

    #[test]
    fn test_add_reads_working_dir() {
        let (mut repo, wd) = memory_repo();
        wd.write_file("src/main.rs", "fn main() {}\n");

        let digest = repo.add("src/main.rs").unwrap();
        assert_eq!(digest, hash_bytes(b"fn main() {}\n"));
        assert_eq!(repo.staging().get("src/main.rs"), Some(digest));

        let result = repo.add("missing.rs");
        assert!(matches!(result, Err(RepoError::WorkingFile { .. })));
    }

    #[test]
    fn test_stage_rejects_bad_path() {
        let (mut repo, _) = memory_repo();
        let result = repo.stage_bytes("a/../b", b"x");
        assert!(matches!(
            result,
            Err(RepoError::Storage(StorageError::InvalidPath(_)))
        ));
        assert!(repo.staging().is_empty());
    }

    #[test]
    fn test_empty_commit_is_rejected() {
        let (mut repo, _) = memory_repo();
        assert!(matches!(repo.commit("nothing"), Err(RepoError::NothingToCommit)));
    }

    #[test]
    fn test_commit_overlays_parent_snapshot() {
        let (mut repo, _) = memory_repo();
        let c1 = commit_file(&mut repo, "a.txt", "a1", "add a");
        let c2 = commit_file(&mut repo, "b.txt", "b1", "add b");

        let files = repo.files_at(c2).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files["a.txt"], hash_bytes(b"a1"));
        assert!(repo.staging().is_empty());

        let log = repo.log(None).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, c2);
        assert_eq!(log[0].parent, Some(c1));
        assert_eq!(log[0].author, "tester");
        assert_eq!(repo.commit_count().unwrap(), 2);
        assert_eq!(repo.log(Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_unstage() {
        let (mut repo, _) = memory_repo();
        repo.stage_bytes("a.txt", b"a").unwrap();
        assert!(repo.unstage("a.txt").unwrap());
        assert!(!repo.unstage("a.txt").unwrap());
        assert!(matches!(repo.commit("x"), Err(RepoError::NothingToCommit)));
    }

    #[test]
    fn test_status_reports() {
        let (mut repo, wd) = memory_repo();
        wd.write_file("tracked.txt", "v1");
        repo.add("tracked.txt").unwrap();
        repo.commit("init").unwrap();

        wd.write_file("tracked.txt", "v2");
        wd.write_file("new.txt", "n");
        let report = repo.status().unwrap();
        assert_eq!(report.not_staged_modified, vec!["tracked.txt"]);
        assert_eq!(report.untracked, vec!["new.txt"]);

        repo.add("new.txt").unwrap();
        let report = repo.status().unwrap();
        assert_eq!(report.staged_new, vec!["new.txt"]);
        assert!(report.untracked.is_empty());
    }

    #[test]
    fn test_create_branch_requires_commit() {
        let (mut repo, _) = memory_repo();
        let result = repo.create_branch("dev");
        assert!(matches!(
            result,
            Err(RepoError::Storage(StorageError::UnbornBranch(_)))
        ));
    }

    #[test]
    fn test_branch_operations() {
        let (mut repo, _) = memory_repo();
        let c1 = commit_file(&mut repo, "a.txt", "a", "c1");

        let dev = repo.create_branch("dev").unwrap();
        assert_eq!(dev.tip, Some(c1));
        assert!(matches!(
            repo.create_branch("dev"),
            Err(RepoError::Storage(StorageError::BranchAlreadyExists(_)))
        ));
        assert!(matches!(
            repo.create_branch("bad name"),
            Err(RepoError::Storage(StorageError::InvalidName(_)))
        ));

        assert!(matches!(
            repo.delete_branch("main"),
            Err(RepoError::Storage(StorageError::ProtectedBranch(_)))
        ));
        repo.delete_branch("dev").unwrap();
        assert_eq!(repo.list_branches().len(), 1);
    }

    #[test]
    fn test_checkout_clears_staging() {
        let (mut repo, _) = memory_repo();
        commit_file(&mut repo, "a.txt", "a", "c1");
        repo.create_branch("dev").unwrap();
        repo.stage_bytes("b.txt", b"b").unwrap();

        repo.checkout("dev").unwrap();
        assert_eq!(repo.current_branch().as_str(), "dev");
        assert!(repo.staging().is_empty());

        assert!(repo.checkout("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_diff_file_against_head() {
        let (mut repo, wd) = memory_repo();
        wd.write_file("notes.txt", "a\nb\nc\n");
        repo.add("notes.txt").unwrap();
        repo.commit("notes").unwrap();

        wd.write_file("notes.txt", "a\nx\nc\n");
        let ops = repo.diff_file("notes.txt").unwrap();
        assert_eq!(
            ops,
            vec![
                DiffOp::Keep("a".to_string()),
                DiffOp::Delete("b".to_string()),
                DiffOp::Insert("x".to_string()),
                DiffOp::Keep("c".to_string()),
            ]
        );

        wd.write_file("fresh.txt", "one\n");
        assert_eq!(
            repo.diff_file("fresh.txt").unwrap(),
            vec![DiffOp::Insert("one".to_string())]
        );
    }

    #[test]
    fn test_diff_commits() {
        let (mut repo, _) = memory_repo();
        repo.stage_bytes("a.txt", b"a1").unwrap();
        repo.stage_bytes("b.txt", b"b").unwrap();
        let c1 = repo.commit("c1").unwrap();
        repo.stage_bytes("a.txt", b"a2").unwrap();
        repo.stage_bytes("c.txt", b"c").unwrap();
        let c2 = repo.commit("c2").unwrap();

        let changes = repo.diff_commits(c1, c2).unwrap();
        let summary: Vec<(&str, ChangeStatus)> =
            changes.iter().map(|c| (c.path.as_str(), c.status)).collect();
        assert_eq!(
            summary,
            vec![("a.txt", ChangeStatus::Modified), ("c.txt", ChangeStatus::Added)]
        );
    }

    #[test]
    fn test_read_file_at_missing_path() {
        let (mut repo, _) = memory_repo();
        let c1 = commit_file(&mut repo, "a.txt", "a", "c1");
        let err = repo.read_file_at(c1, "nope.txt").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_merge_already_up_to_date() {
        let (mut repo, _) = memory_repo();
        commit_file(&mut repo, "a.txt", "a", "c1");
        repo.create_branch("dev").unwrap();
        assert_eq!(repo.merge("dev").unwrap(), MergeReport::AlreadyUpToDate);

        commit_file(&mut repo, "b.txt", "b", "c2");
        assert_eq!(repo.merge("dev").unwrap(), MergeReport::AlreadyUpToDate);
    }

    #[test]
    fn test_merge_fast_forward() {
        let (mut repo, _) = memory_repo();
        let c1 = commit_file(&mut repo, "a.txt", "a", "c1");
        repo.create_branch("dev").unwrap();
        repo.checkout("dev").unwrap();
        let c2 = commit_file(&mut repo, "b.txt", "b", "c2");

        repo.checkout("main").unwrap();
        let report = repo.merge("dev").unwrap();
        assert_eq!(
            report,
            MergeReport::FastForward {
                from: Some(c1),
                to: c2
            }
        );
        assert_eq!(repo.head(), Some(c2));
    }

    #[test]
    fn test_merge_diverged_clean() {
        let (mut repo, _) = memory_repo();
        repo.stage_bytes("shared.txt", b"base").unwrap();
        repo.stage_bytes("other.txt", b"o").unwrap();
        let base = repo.commit("base").unwrap();
        repo.create_branch("dev").unwrap();

        let ours = commit_file(&mut repo, "ours.txt", "mine", "ours");
        repo.checkout("dev").unwrap();
        commit_file(&mut repo, "shared.txt", "theirs", "theirs");
        repo.checkout("main").unwrap();

        let report = repo.merge("dev").unwrap();
        let MergeReport::Merged {
            commit,
            base: found_base,
            changed,
            deleted,
        } = report
        else {
            panic!("expected a merge commit, got {:?}", report);
        };
        assert_eq!(found_base, base);
        assert_eq!(changed, vec!["shared.txt"]);
        assert!(deleted.is_empty());

        let merged = repo.get_commit(commit).unwrap();
        assert_eq!(merged.parent, Some(ours));
        assert_eq!(repo.head(), Some(commit));

        let files = repo.files_at(commit).unwrap();
        assert_eq!(files["shared.txt"], hash_bytes(b"theirs"));
        assert_eq!(files["ours.txt"], hash_bytes(b"mine"));
        assert_eq!(files["other.txt"], hash_bytes(b"o"));
    }

    #[test]
    fn test_merge_applies_deletions() {
        let (mut repo, _) = memory_repo();
        repo.stage_bytes("keep.txt", b"k").unwrap();
        repo.stage_bytes("drop.txt", b"d").unwrap();
        repo.commit("base").unwrap();
        repo.create_branch("dev").unwrap();

        commit_file(&mut repo, "keep.txt", "k2", "ours");

        // build the other side's snapshot without drop.txt
        repo.checkout("dev").unwrap();
        let dev_tip = repo.head().unwrap();
        let mut files = repo.files_at(dev_tip).unwrap();
        files.remove("drop.txt");
        files.insert("new.txt".into(), repo.store().put(b"n").unwrap());
        let tree = DirectoryTree::from_files(files.iter().map(|(p, d)| (p.as_str(), *d))).unwrap();
        repo.commit_tree(&tree, Some(dev_tip), "drop").unwrap();
        repo.checkout("main").unwrap();

        let report = repo.merge("dev").unwrap();
        let MergeReport::Merged { deleted, .. } = &report else {
            panic!("expected a merge commit, got {:?}", report);
        };
        assert_eq!(deleted, &vec!["drop.txt".to_string()]);
        let files = repo.files_at(repo.head().unwrap()).unwrap();
        assert!(!files.contains_key("drop.txt"));
        assert_eq!(files["keep.txt"], hash_bytes(b"k2"));
        assert_eq!(files["new.txt"], hash_bytes(b"n"));
    }

    #[test]
    fn test_merge_conflict_stages_resolutions() {
        let (mut repo, _) = memory_repo();
        repo.stage_bytes("file.txt", b"base").unwrap();
        let base = repo.commit("base").unwrap();
        repo.create_branch("dev").unwrap();

        let ours = commit_file(&mut repo, "file.txt", "ours", "ours");
        repo.checkout("dev").unwrap();
        repo.stage_bytes("file.txt", b"theirs").unwrap();
        repo.stage_bytes("extra.txt", b"extra").unwrap();
        repo.commit("theirs").unwrap();
        repo.checkout("main").unwrap();

        let report = repo.merge("dev").unwrap();
        assert!(!report.is_success());
        assert_eq!(report.conflict_paths(), vec!["file.txt"]);
        assert_eq!(
            report,
            MergeReport::Conflicted {
                base,
                conflicts: vec![MergeConflict {
                    path: "file.txt".into(),
                    base: Some(hash_bytes(b"base")),
                    ours: Some(hash_bytes(b"ours")),
                    theirs: Some(hash_bytes(b"theirs")),
                }],
                staged: vec!["extra.txt".into()],
                removed: vec![],
            }
        );

        // no commit was made; the clean resolution is waiting in staging
        assert_eq!(repo.head(), Some(ours));
        assert_eq!(repo.staging().get("extra.txt"), Some(hash_bytes(b"extra")));
    }

    #[test]
    fn test_conflicted_merge_keeps_clean_deletion() {
        let (mut repo, _) = memory_repo();
        repo.stage_bytes("a.txt", b"base").unwrap();
        repo.stage_bytes("d.txt", b"d").unwrap();
        repo.commit("base").unwrap();
        repo.create_branch("dev").unwrap();

        commit_file(&mut repo, "a.txt", "ours", "ours");

        // dev edits a.txt and deletes d.txt
        repo.checkout("dev").unwrap();
        repo.stage_bytes("a.txt", b"theirs").unwrap();
        repo.stage_removal("d.txt").unwrap();
        let dev_tip = repo.commit("theirs").unwrap();
        assert!(!repo.files_at(dev_tip).unwrap().contains_key("d.txt"));
        repo.checkout("main").unwrap();

        let report = repo.merge("dev").unwrap();
        let MergeReport::Conflicted { staged, removed, .. } = &report else {
            panic!("expected conflicts, got {:?}", report);
        };
        assert!(staged.is_empty());
        assert_eq!(removed, &vec!["d.txt".to_string()]);
        assert!(repo.staging().is_removed("d.txt"));
        assert_eq!(repo.status().unwrap().staged_deleted, vec!["d.txt"]);

        repo.stage_bytes("a.txt", b"resolved").unwrap();
        let merged = repo.commit("resolve").unwrap();
        let files: Vec<String> = repo.files_at(merged).unwrap().into_keys().collect();
        assert_eq!(files, vec!["a.txt"]);
        assert!(repo.staging().is_empty());
    }

    #[test]
    fn test_stage_removal_and_unstage() {
        let (mut repo, _) = memory_repo();
        repo.stage_bytes("a.txt", b"a").unwrap();
        repo.stage_bytes("b.txt", b"b").unwrap();
        repo.commit("c1").unwrap();

        repo.stage_removal("a.txt").unwrap();
        assert!(repo.unstage("a.txt").unwrap());
        assert!(matches!(repo.commit("noop"), Err(RepoError::NothingToCommit)));

        repo.stage_removal("a.txt").unwrap();
        let c2 = repo.commit("drop a").unwrap();
        let files: Vec<String> = repo.files_at(c2).unwrap().into_keys().collect();
        assert_eq!(files, vec!["b.txt"]);

        assert!(matches!(
            repo.stage_removal("../escape"),
            Err(RepoError::Storage(StorageError::InvalidPath(_)))
        ));
    }

    #[test]
    fn test_merge_unrelated_histories() {
        let (mut repo, _) = memory_repo();
        commit_file(&mut repo, "a.txt", "a", "main root");

        // a second root commit on its own branch
        let other_tree = DirectoryTree::from_files([("b.txt", repo.store().put(b"b").unwrap())])
            .unwrap()
            .serialize(repo.store())
            .unwrap();
        let other_root =
            commit::create_commit(repo.store(), other_tree, None, "other root", "x").unwrap();
        repo.branches
            .create(BranchName::new("other").unwrap(), Some(other_root))
            .unwrap();

        let result = repo.merge("other");
        assert!(matches!(result, Err(RepoError::NoCommonAncestor { .. })));
    }

    #[test]
    fn test_merge_into_unborn_branch() {
        let (mut repo, _) = memory_repo();
        let c1 = commit_file(&mut repo, "a.txt", "a", "c1");
        repo.branches
            .create(BranchName::new("empty").unwrap(), None)
            .unwrap();
        repo.checkout("empty").unwrap();

        let report = repo.merge("main").unwrap();
        assert_eq!(report, MergeReport::FastForward { from: None, to: c1 });
        assert_eq!(repo.head(), Some(c1));

        assert!(matches!(
            repo.merge("ghost"),
            Err(RepoError::Storage(StorageError::BranchNotFound(_)))
        ));
    }

    #[test]
    fn test_identical_content_is_deduplicated() {
        let dir = TempDir::new().unwrap();
        let mut repo = Repository::init(RepositoryConfig::new(dir.path())).unwrap();
        repo.stage_bytes("one.txt", b"same").unwrap();
        repo.stage_bytes("nested/two.txt", b"same").unwrap();
        let c1 = repo.commit("dup").unwrap();

        let files = repo.files_at(c1).unwrap();
        assert_eq!(files["one.txt"], files["nested/two.txt"]);

        // one blob, two directory objects, one commit
        let store = FileObjectStore::open(dir.path().join(".vcscore/objects")).unwrap();
        assert_eq!(store.object_count().unwrap(), 4);
    }
}
