//! Finding the git dir behind a path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Layout, RepoError, RepositoryKind};

/// Does this directory hold the skeleton every git dir has?
pub(crate) fn is_git_dir(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
}

/// Resolve `path` without walking up: it must be a git dir, or contain a
/// `.git` directory or redirect file.
pub(crate) fn open_at(path: &Path) -> Result<Layout, RepoError> {
    let dot_git = path.join(".git");
    if dot_git.is_dir() || dot_git.is_file() {
        return layout_for(path, &dot_git);
    }
    if is_git_dir(path) {
        return git_dir_layout(path);
    }
    Err(RepoError::NotARepository(path.to_path_buf()))
}

/// Walk up from `start` until some ancestor holds a repository.
pub(crate) fn locate(start: &Path) -> Result<Layout, RepoError> {
    let start = fs::canonicalize(start)
        .map_err(|_| RepoError::NotARepository(start.to_path_buf()))?;

    let mut at = start.clone();
    loop {
        let dot_git = at.join(".git");
        if dot_git.is_dir() || dot_git.is_file() {
            return layout_for(&at, &dot_git);
        }
        if is_git_dir(&at) {
            return git_dir_layout(&at);
        }
        match at.parent() {
            Some(parent) => at = parent.to_path_buf(),
            None => return Err(RepoError::NotARepository(start)),
        }
    }
}

/// Build the layout for a working tree whose `.git` is `dot_git`.
fn layout_for(work_tree: &Path, dot_git: &Path) -> Result<Layout, RepoError> {
    let work_tree = fs::canonicalize(work_tree)
        .map_err(|_| RepoError::NotARepository(work_tree.to_path_buf()))?;

    if dot_git.is_dir() {
        let control_dir = fs::canonicalize(dot_git)
            .map_err(|_| RepoError::NotARepository(dot_git.to_path_buf()))?;
        return Ok(Layout {
            common_dir: common_dir_of(&control_dir),
            control_dir,
            work_tree: Some(work_tree),
            kind: RepositoryKind::Main,
        });
    }

    // `.git` is a redirect file. A target with a `commondir` back-pointer
    // is a linked worktree's control dir; anything else is just a
    // relocated git dir.
    let target = read_gitdir_file(dot_git)?;
    let target = if target.is_absolute() {
        target
    } else {
        work_tree.join(target)
    };
    let control_dir = fs::canonicalize(&target).map_err(|_| RepoError::InvalidGitDir {
        path: dot_git.to_path_buf(),
        reason: format!("gitdir target {} cannot be resolved", target.display()),
    })?;

    let kind = if control_dir.join("commondir").is_file() {
        RepositoryKind::LinkedWorktree
    } else if control_dir.join("HEAD").is_file() {
        RepositoryKind::Main
    } else {
        return Err(RepoError::InvalidGitDir {
            path: control_dir,
            reason: "gitdir target has no HEAD".into(),
        });
    };

    Ok(Layout {
        common_dir: common_dir_of(&control_dir),
        control_dir,
        work_tree: Some(work_tree),
        kind,
    })
}

/// Build the layout when `path` is the git dir itself.
fn git_dir_layout(path: &Path) -> Result<Layout, RepoError> {
    let control_dir =
        fs::canonicalize(path).map_err(|_| RepoError::NotARepository(path.to_path_buf()))?;
    let common_dir = common_dir_of(&control_dir);

    // A linked worktree's control dir opened directly still knows its
    // working tree through the `gitdir` back-pointer.
    if control_dir.join("commondir").is_file() {
        let work_tree = fs::read_to_string(control_dir.join("gitdir"))
            .ok()
            .and_then(|s| PathBuf::from(s.trim()).parent().map(Path::to_path_buf));
        return Ok(Layout {
            control_dir,
            common_dir,
            work_tree,
            kind: RepositoryKind::LinkedWorktree,
        });
    }

    // `<tree>/.git` opened by its inner path is still a main repository.
    if let Some(parent) = control_dir.parent() {
        if control_dir.file_name().is_some_and(|n| n == ".git") {
            return Ok(Layout {
                common_dir,
                control_dir: control_dir.clone(),
                work_tree: Some(parent.to_path_buf()),
                kind: RepositoryKind::Main,
            });
        }
    }

    Ok(Layout {
        control_dir,
        common_dir,
        work_tree: None,
        kind: RepositoryKind::Bare,
    })
}

/// Parse a `.git` redirect file: `gitdir: <path>`.
pub(crate) fn read_gitdir_file(path: &Path) -> Result<PathBuf, RepoError> {
    let contents = fs::read_to_string(path).map_err(|e| RepoError::InvalidGitDir {
        path: path.to_path_buf(),
        reason: format!("unreadable: {e}"),
    })?;
    let target = contents
        .trim()
        .strip_prefix("gitdir: ")
        .ok_or_else(|| RepoError::InvalidGitDir {
            path: path.to_path_buf(),
            reason: "expected a 'gitdir: <path>' line".into(),
        })?;
    Ok(PathBuf::from(target))
}

/// Follow the `commondir` file if present; otherwise the git dir is its
/// own common dir.
pub(crate) fn common_dir_of(control_dir: &Path) -> PathBuf {
    let pointer = control_dir.join("commondir");
    let Ok(contents) = fs::read_to_string(&pointer) else {
        return control_dir.to_path_buf();
    };
    let joined = control_dir.join(contents.trim());
    fs::canonicalize(&joined).unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Repository;

    #[test]
    fn open_accepts_worktree_root_and_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        Repository::init(&root).unwrap();

        let by_root = Repository::open(&root).unwrap();
        let by_git_dir = Repository::open(root.join(".git")).unwrap();
        assert_eq!(by_root.kind(), RepositoryKind::Main);
        assert_eq!(by_git_dir.kind(), RepositoryKind::Main);
        assert_eq!(by_root.common_dir(), by_git_dir.common_dir());
        assert!(by_git_dir.work_tree().is_some());
    }

    #[test]
    fn open_rejects_a_plain_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(RepoError::NotARepository(_))
        ));
    }

    #[test]
    fn discover_walks_up_to_the_root_of_the_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("proj");
        Repository::init(&root).unwrap();
        let nested = root.join("src/deep/inside");
        fs::create_dir_all(&nested).unwrap();

        let repo = Repository::discover(&nested).unwrap();
        assert_eq!(
            repo.work_tree().unwrap(),
            fs::canonicalize(&root).unwrap()
        );
    }

    #[test]
    fn discover_finds_a_bare_repository_directly() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("store.git");
        Repository::init_bare(&bare).unwrap();

        let repo = Repository::discover(&bare).unwrap();
        assert!(repo.is_bare());
    }

    #[test]
    fn discover_outside_any_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::discover(dir.path()),
            Err(RepoError::NotARepository(_))
        ));
    }

    #[test]
    fn gitdir_file_redirects_to_a_relocated_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        // A real git dir out of place, pointed at by a .git file.
        let stored = dir.path().join("elsewhere");
        Repository::init_bare(&stored).unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(&tree).unwrap();
        fs::write(
            tree.join(".git"),
            format!("gitdir: {}\n", stored.display()),
        )
        .unwrap();

        let repo = Repository::open(&tree).unwrap();
        assert_eq!(repo.kind(), RepositoryKind::Main);
        assert_eq!(repo.control_dir(), fs::canonicalize(&stored).unwrap());
    }

    #[test]
    fn malformed_gitdir_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(&tree).unwrap();
        fs::write(tree.join(".git"), "not a redirect\n").unwrap();
        assert!(matches!(
            Repository::open(&tree),
            Err(RepoError::InvalidGitDir { .. })
        ));
    }
}
