//! Creating the on-disk skeleton of a new repository.

use std::fs;
use std::path::Path;

use crate::{Layout, RepoError, RepositoryKind};

const DEFAULT_BRANCH: &str = "main";

const DESCRIPTION: &str =
    "Unnamed repository; edit this file 'description' to name the repository.\n";

/// Lay down a fresh git dir, or hand back the existing one untouched.
///
/// `bare` decides whether `path` is the git dir itself or gets a `.git`
/// subdirectory. Nothing here locks: init only ever creates files that do
/// not exist yet.
pub(crate) fn create(path: &Path, bare: bool) -> Result<Layout, RepoError> {
    let path = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };

    let (git_dir, work_tree) = if bare {
        (path.clone(), None)
    } else {
        (path.join(".git"), Some(path))
    };

    let kind = if bare {
        RepositoryKind::Bare
    } else {
        RepositoryKind::Main
    };

    // An existing HEAD means an existing repository; re-init must not
    // disturb it.
    if git_dir.join("HEAD").is_file() {
        return Ok(Layout {
            common_dir: git_dir.clone(),
            control_dir: git_dir,
            work_tree,
            kind,
        });
    }

    for sub in ["objects/info", "objects/pack", "refs/heads", "refs/tags"] {
        fs::create_dir_all(git_dir.join(sub))?;
    }

    fs::write(
        git_dir.join("HEAD"),
        format!("ref: refs/heads/{DEFAULT_BRANCH}\n"),
    )?;
    fs::write(
        git_dir.join("config"),
        format!(
            "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = {}\n",
            bare
        ),
    )?;
    fs::write(git_dir.join("description"), DESCRIPTION)?;

    Ok(Layout {
        common_dir: git_dir.clone(),
        control_dir: git_dir,
        work_tree,
        kind,
    })
}
