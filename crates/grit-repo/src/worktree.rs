//! Linked worktrees: extra checkouts sharing one common dir.
//!
//! Each linked worktree owns a small admin dir at
//! `<common>/worktrees/<name>/` with three files: a private `HEAD`, a
//! `commondir` pointer back to the shared git dir, and a `gitdir` pointer
//! to the worktree's `.git` file. The worktree itself carries only that
//! `.git` redirect file.

use std::fs;
use std::path::{Path, PathBuf};

use grit_hash::ObjectId;
use grit_ref::{Ref, RefName, RefStore};

use crate::{head_name, RepoError, Repository};

/// One working tree as reported by [`Repository::list_worktrees`].
#[derive(Debug, Clone)]
pub struct WorktreeInfo {
    /// Root of the working tree; the git dir itself for a bare repo.
    pub path: PathBuf,
    /// Short branch name HEAD is on, `None` when detached or unborn.
    pub branch: Option<String>,
    /// The commit HEAD resolves to, `None` for an unborn branch.
    pub head_id: Option<ObjectId>,
    pub is_bare: bool,
}

pub(crate) fn add(repo: &Repository, path: &Path, branch: &str) -> Result<Repository, RepoError> {
    if path.exists() {
        return Err(RepoError::AlreadyExists(path.to_path_buf()));
    }
    let name = path
        .file_name()
        .ok_or_else(|| RepoError::InvalidGitDir {
            path: path.to_path_buf(),
            reason: "worktree path has no final component".into(),
        })?
        .to_string_lossy()
        .into_owned();

    let admin = repo.common_dir().join("worktrees").join(&name);
    if admin.exists() {
        return Err(RepoError::AlreadyExists(admin));
    }

    let branch_ref = RefName::new(format!("refs/heads/{branch}"))?;

    // A branch that does not exist yet starts at the current HEAD commit.
    // With no commits anywhere the worktree begins on the unborn branch.
    if repo.refs().resolve(&branch_ref)?.is_none() {
        if let Some(head) = repo.head_id()? {
            repo.refs().set_direct(&branch_ref, &head)?;
        }
    }

    fs::create_dir_all(&admin)?;
    fs::create_dir_all(path)?;
    let worktree = fs::canonicalize(path)?;

    fs::write(
        admin.join("commondir"),
        format!("{}\n", repo.common_dir().display()),
    )?;
    fs::write(
        admin.join("gitdir"),
        format!("{}\n", worktree.join(".git").display()),
    )?;
    fs::write(admin.join("HEAD"), format!("ref: {branch_ref}\n"))?;
    fs::write(
        worktree.join(".git"),
        format!("gitdir: {}\n", admin.display()),
    )?;

    Repository::open(&worktree)
}

pub(crate) fn list(repo: &Repository) -> Result<Vec<WorktreeInfo>, RepoError> {
    let common = repo.common_dir();
    let mut found = Vec::new();

    // The main entry: the common dir's own working tree, or the bare git
    // dir itself.
    let main_tree = common
        .file_name()
        .filter(|n| *n == ".git")
        .and_then(|_| common.parent());
    let (branch, head_id) = head_summary(common, repo.refs())?;
    found.push(WorktreeInfo {
        path: main_tree.unwrap_or(common).to_path_buf(),
        branch,
        head_id,
        is_bare: main_tree.is_none(),
    });

    let worktrees = common.join("worktrees");
    let mut admins: Vec<PathBuf> = match fs::read_dir(&worktrees) {
        Ok(entries) => entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    admins.sort();

    for admin in admins {
        let Ok(pointer) = fs::read_to_string(admin.join("gitdir")) else {
            // Stale admin dir; git would offer to prune it.
            continue;
        };
        let dot_git = PathBuf::from(pointer.trim());
        let path = dot_git
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(dot_git);
        let (branch, head_id) = head_summary(&admin, repo.refs())?;
        found.push(WorktreeInfo {
            path,
            branch,
            head_id,
            is_bare: false,
        });
    }

    Ok(found)
}

/// Read a control dir's HEAD and resolve it through the shared refs.
fn head_summary(
    control_dir: &Path,
    shared: &RefStore,
) -> Result<(Option<String>, Option<ObjectId>), RepoError> {
    match RefStore::new(control_dir).find(&head_name())? {
        Some(Ref::Symbolic { target, .. }) => Ok((
            Some(target.shorthand().to_string()),
            shared.resolve(&target)?,
        )),
        Some(Ref::Direct { oid, .. }) => Ok((None, Some(oid))),
        None => Ok((None, None)),
    }
}
