//! The repository model: a git dir found on disk, bound to its object
//! database and reference store.
//!
//! Three shapes exist. A main repository keeps everything under
//! `<worktree>/.git`. A bare repository is the git dir itself, with no
//! working tree. A linked worktree has a small private control dir under
//! the main repository's `worktrees/` holding its own `HEAD`, while
//! `objects/` and `refs/` stay shared through the common dir.

mod discover;
mod init;
mod worktree;

pub use worktree::WorktreeInfo;

use std::path::{Path, PathBuf};

use grit_hash::ObjectId;
use grit_odb::ObjectDb;
use grit_ref::{Ref, RefName, RefStore};

/// Errors from opening, creating, and inspecting repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git repository (or any parent up to the root): {0}")]
    NotARepository(PathBuf),

    #[error("invalid git directory {path}: {reason}")]
    InvalidGitDir { path: PathBuf, reason: String },

    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("unusable HEAD: {0}")]
    InvalidHead(String),

    #[error(transparent)]
    Odb(#[from] grit_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] grit_ref::RefError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What kind of repository a path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    /// A working tree with its git dir at `.git`.
    Main,
    /// A git dir with no working tree.
    Bare,
    /// A worktree linked to some main repository.
    LinkedWorktree,
}

/// The directories a repository is made of, as found by discovery.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    pub control_dir: PathBuf,
    pub common_dir: PathBuf,
    pub work_tree: Option<PathBuf>,
    pub kind: RepositoryKind,
}

/// An opened repository.
pub struct Repository {
    control_dir: PathBuf,
    common_dir: PathBuf,
    work_tree: Option<PathBuf>,
    kind: RepositoryKind,
    odb: ObjectDb,
    refs: RefStore,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("control_dir", &self.control_dir)
            .field("work_tree", &self.work_tree)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open the repository at `path`: either a git dir itself or a
    /// directory containing `.git` (directory or redirect file).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::from_layout(discover::open_at(path.as_ref())?)
    }

    /// Walk up from `start` until a repository is found.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::from_layout(discover::locate(start.as_ref())?)
    }

    /// Create a repository with a working tree at `path` (git dir at
    /// `path/.git`). Running init on an existing repository changes
    /// nothing and returns it opened.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::from_layout(init::create(path.as_ref(), false)?)
    }

    /// Create a bare repository occupying `path` itself.
    pub fn init_bare(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::from_layout(init::create(path.as_ref(), true)?)
    }

    fn from_layout(layout: Layout) -> Result<Self, RepoError> {
        let odb = ObjectDb::open(layout.common_dir.join("objects"))?;
        let refs = RefStore::new(&layout.common_dir);
        Ok(Self {
            control_dir: layout.control_dir,
            common_dir: layout.common_dir,
            work_tree: layout.work_tree,
            kind: layout.kind,
            odb,
            refs,
        })
    }

    /// The metadata dir this handle answers to: `.git` itself, or the
    /// private admin dir of a linked worktree.
    pub fn control_dir(&self) -> &Path {
        &self.control_dir
    }

    /// The shared metadata dir holding `objects/` and `refs/`. Equals
    /// [`control_dir`](Self::control_dir) except in linked worktrees.
    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }

    pub fn is_bare(&self) -> bool {
        self.kind == RepositoryKind::Bare
    }

    pub fn odb(&self) -> &ObjectDb {
        &self.odb
    }

    /// The shared reference store. `HEAD` lookups through it see the
    /// common dir's HEAD; use [`head`](Self::head) for this worktree's.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// This worktree's HEAD, unresolved.
    ///
    /// HEAD is the one ref that is per-worktree, so it is read from the
    /// control dir rather than the shared store.
    pub fn head(&self) -> Result<Option<Ref>, RepoError> {
        Ok(RefStore::new(&self.control_dir).find(&head_name())?)
    }

    /// The commit id HEAD lands on, following a symbolic HEAD through the
    /// shared refs. `None` for an unborn branch.
    pub fn head_id(&self) -> Result<Option<ObjectId>, RepoError> {
        match self.head()? {
            Some(Ref::Direct { oid, .. }) => Ok(Some(oid)),
            Some(Ref::Symbolic { target, .. }) => Ok(self.refs.resolve(&target)?),
            None => Ok(None),
        }
    }

    /// The branch HEAD is on, as its short name. `None` when detached.
    pub fn current_branch(&self) -> Result<Option<String>, RepoError> {
        match self.head()? {
            Some(Ref::Symbolic { target, .. }) => {
                Ok(Some(target.shorthand().to_string()))
            }
            _ => Ok(None),
        }
    }

    /// Create a linked worktree at `path`, checked out on `branch`.
    ///
    /// If `refs/heads/<branch>` does not exist yet it is created at the
    /// current HEAD commit; with no commits at all the new worktree just
    /// starts on the unborn branch.
    pub fn add_worktree(
        &self,
        path: impl AsRef<Path>,
        branch: &str,
    ) -> Result<Repository, RepoError> {
        worktree::add(self, path.as_ref(), branch)
    }

    /// The main working tree plus every linked worktree.
    pub fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>, RepoError> {
        worktree::list(self)
    }
}

pub(crate) fn head_name() -> RefName {
    // "HEAD" always passes validation.
    RefName::new("HEAD").unwrap_or_else(|_| unreachable!())
}
