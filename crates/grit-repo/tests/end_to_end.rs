//! A repository exercised the way a porcelain would: objects written
//! through the odb, branches moved through the ref store, HEAD observed
//! through the repository.

use grit_object::{Blob, Commit, EntryMode, Ident, Object, Time, Tree, TreeEntry};
use grit_ref::RefName;
use grit_repo::Repository;

fn author() -> Ident {
    Ident::new("A Committer", "ac@example.com", Time::new(1_700_000_000, 120))
}

/// Store a blob, a tree holding it, and a commit of that tree; returns
/// the commit id.
fn commit_file(repo: &Repository, file: &str, contents: &[u8], message: &str) -> grit_hash::ObjectId {
    let blob_id = repo
        .odb()
        .write(&Object::Blob(Blob::from_bytes(contents)))
        .unwrap();

    let mut tree = Tree::new();
    tree.entries.push(TreeEntry {
        mode: EntryMode::File,
        name: file.into(),
        id: blob_id,
    });
    let tree_id = repo.odb().write(&Object::Tree(tree)).unwrap();

    let commit = Commit {
        tree: tree_id,
        parents: Vec::new(),
        author: author(),
        committer: author(),
        encoding: None,
        signature: None,
        extra_headers: Vec::new(),
        message: message.into(),
    };
    repo.odb().write(&Object::Commit(commit)).unwrap()
}

#[test]
fn head_tracks_the_branch_through_the_shared_store() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path().join("proj")).unwrap();
    let main = RefName::new("refs/heads/main").unwrap();

    assert_eq!(repo.head_id().unwrap(), None);

    let first = commit_file(&repo, "a.txt", b"one", "first");
    repo.refs().set_direct(&main, &first).unwrap();
    assert_eq!(repo.head_id().unwrap(), Some(first));

    let second = commit_file(&repo, "a.txt", b"two", "second");
    repo.refs().set_direct(&main, &second).unwrap();
    assert_eq!(repo.head_id().unwrap(), Some(second));

    // The commit reads back whole.
    match repo.odb().read_existing(&second).unwrap() {
        Object::Commit(c) => assert_eq!(c.summary(), "second"),
        other => panic!("expected a commit, got {:?}", other.kind()),
    }
}

#[test]
fn reopened_repository_sees_everything_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("proj");
    let tip = {
        let repo = Repository::init(&root).unwrap();
        let tip = commit_file(&repo, "f", b"data", "only");
        repo.refs()
            .set_direct(&RefName::new("refs/heads/main").unwrap(), &tip)
            .unwrap();
        tip
    };

    let reopened = Repository::open(&root).unwrap();
    assert_eq!(reopened.head_id().unwrap(), Some(tip));
    assert_eq!(
        reopened.current_branch().unwrap(),
        Some("main".to_string())
    );
    assert!(reopened.odb().contains(&tip));
}

#[test]
fn worktree_and_main_agree_on_refs_but_not_head() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path().join("proj")).unwrap();
    let main = RefName::new("refs/heads/main").unwrap();
    let tip = commit_file(&repo, "f", b"data", "base");
    repo.refs().set_direct(&main, &tip).unwrap();

    let wt = repo
        .add_worktree(dir.path().join("topic"), "topic")
        .unwrap();

    // A branch moved from the worktree side is the same branch.
    let next = commit_file(&wt, "f", b"more", "ahead");
    wt.refs()
        .set_direct(&RefName::new("refs/heads/topic").unwrap(), &next)
        .unwrap();
    assert_eq!(
        repo.refs()
            .resolve(&RefName::new("refs/heads/topic").unwrap())
            .unwrap(),
        Some(next)
    );

    assert_eq!(repo.head_id().unwrap(), Some(tip));
    assert_eq!(wt.head_id().unwrap(), Some(next));
    assert_eq!(repo.refs().names().unwrap(), wt.refs().names().unwrap());
}
