use bstr::BString;
use grit_hash::HashKind;
use grit_object::{Blob, Commit, EntryMode, Ident, Object, ObjectKind, Tag, Time, Tree, TreeEntry};

// Identities checked against `git hash-object -t <type>`.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
const EMPTY_BLOB: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

#[test]
fn well_known_ids() {
    let tree = Object::Tree(Tree::new());
    assert_eq!(tree.id(HashKind::Sha1).unwrap().to_hex(), EMPTY_TREE);

    let blob = Object::Blob(Blob::default());
    assert_eq!(blob.id(HashKind::Sha1).unwrap().to_hex(), EMPTY_BLOB);
}

#[test]
fn commit_chain_round_trips_through_wire_form() {
    let author = Ident::new("Dev", "dev@example.org", Time::new(1_700_000_000, 60));

    let blob = Object::Blob(Blob::from_bytes(b"fn main() {}\n".to_vec()));
    let blob_id = blob.id(HashKind::Sha1).unwrap();

    let tree = Tree {
        entries: vec![TreeEntry {
            mode: EntryMode::File,
            name: BString::from("main.rs"),
            id: blob_id,
        }],
    };
    let tree_obj = Object::Tree(tree);
    let tree_id = tree_obj.id(HashKind::Sha1).unwrap();

    let commit = Object::Commit(Commit {
        tree: tree_id,
        parents: vec![],
        author: author.clone(),
        committer: author.clone(),
        encoding: None,
        signature: None,
        extra_headers: vec![],
        message: BString::from("initial\n"),
    });
    let commit_id = commit.id(HashKind::Sha1).unwrap();

    let tag = Object::Tag(Tag {
        target: commit_id,
        target_kind: ObjectKind::Commit,
        name: BString::from("v0.1.0"),
        tagger: Some(author),
        message: BString::from("first release\n"),
        signature: None,
    });

    // Every object must survive encode -> decode with identity intact.
    for obj in [blob, tree_obj, commit, tag] {
        let wire = obj.encode();
        let back = Object::decode(&wire, HashKind::Sha1).unwrap();
        assert_eq!(back, obj);
        assert_eq!(
            back.id(HashKind::Sha1).unwrap(),
            obj.id(HashKind::Sha1).unwrap()
        );
    }
}

#[test]
fn any_content_change_changes_the_id() {
    let a = Object::Blob(Blob::from_bytes(b"state one".to_vec()));
    let b = Object::Blob(Blob::from_bytes(b"state two".to_vec()));
    assert_ne!(a.id(HashKind::Sha1).unwrap(), b.id(HashKind::Sha1).unwrap());
}

#[test]
fn tree_identity_is_order_independent() {
    let entry = |name: &str, mode| TreeEntry {
        mode,
        name: BString::from(name),
        id: Object::Blob(Blob::default()).id(HashKind::Sha1).unwrap(),
    };
    let forward = Tree {
        entries: vec![
            entry("a.txt", EntryMode::File),
            entry("lib", EntryMode::Directory),
        ],
    };
    let backward = Tree {
        entries: forward.entries.iter().rev().cloned().collect(),
    };
    assert_eq!(
        Object::Tree(forward).id(HashKind::Sha1).unwrap(),
        Object::Tree(backward).id(HashKind::Sha1).unwrap()
    );
}

#[test]
fn corrupt_payloads_are_rejected() {
    assert!(Object::decode(b"commit 4\0oops", HashKind::Sha1).is_err());
    assert!(Object::decode(b"tree 3\0xyz", HashKind::Sha1).is_err());
    assert!(Object::decode(b"bogus 1\0x", HashKind::Sha1).is_err());
}
