use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::index::Index;
use crate::object::{object_write, Commit, Object, Signature, Tree, TreeEntry};
use crate::refs::{resolve_symbolic, update_head};
use crate::repo::Repo;

/// a pending member of one directory's tree: a staged file, or a subtree
/// whose digest was computed in an earlier (deeper) round
enum Node {
    File(usize),
    Dir { name: String, hash: Hash },
}

/// convert the flat staging index into nested tree objects
///
/// entries are grouped by containing directory, with placeholder groups
/// for every ancestor so the hierarchy has no gaps. directories are then
/// processed deepest-first: by the time a parent is encoded, each child
/// tree has already been written and contributes only its digest. returns
/// the digest of the root tree.
pub fn write_tree_from_index(repo: &Repo, index: &Index) -> Result<Hash> {
    let mut groups: HashMap<String, Vec<Node>> = HashMap::new();
    groups.insert(String::new(), Vec::new());

    for (i, entry) in index.entries.iter().enumerate() {
        let dir = dirname(&entry.name).to_string();

        let mut ancestor = dir.clone();
        while !ancestor.is_empty() {
            groups.entry(ancestor.clone()).or_default();
            ancestor = dirname(&ancestor).to_string();
        }

        groups.entry(dir).or_default().push(Node::File(i));
    }

    // deepest paths first; a parent is always strictly shorter than its
    // children, so every subtree digest exists before it is referenced
    let mut paths: Vec<String> = groups.keys().cloned().collect();
    paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut root = None;
    for path in paths {
        let nodes = groups.remove(&path).unwrap_or_default();

        let mut tree = Tree::new();
        for node in nodes {
            match node {
                Node::File(i) => {
                    let entry = &index.entries[i];
                    tree.entries.push(TreeEntry::new(
                        entry.tree_mode(),
                        basename(&entry.name),
                        entry.hash,
                    ));
                }
                Node::Dir { name, hash } => {
                    tree.entries.push(TreeEntry::new("040000", name, hash));
                }
            }
        }

        let sha = object_write(repo, &Object::Tree(tree))?;

        if path.is_empty() {
            root = Some(sha);
        } else {
            groups
                .entry(dirname(&path).to_string())
                .or_default()
                .push(Node::Dir {
                    name: basename(&path).to_string(),
                    hash: sha,
                });
        }
    }

    root.ok_or_else(|| Error::CorruptIndex("tree build produced no root".into()))
}

/// write a commit object for an already-built tree
pub fn create_commit(
    repo: &Repo,
    tree: &Hash,
    parents: &[Hash],
    author: &Signature,
    message: &str,
) -> Result<Hash> {
    object_write(
        repo,
        &Object::Commit(Commit::build(tree, parents, author, message)),
    )
}

/// record the staging index as a new commit on the current branch
///
/// the parent is the current HEAD resolution (absent for a root commit).
/// the index is consumed as-is and left unchanged: it becomes the
/// baseline for the next status diff.
pub fn commit(repo: &Repo, message: &str, author: Option<Signature>) -> Result<Hash> {
    let index = Index::read(repo)?;
    let tree = write_tree_from_index(repo, &index)?;

    let parents: Vec<Hash> = resolve_symbolic(repo, "HEAD")?.into_iter().collect();

    let author = match author {
        Some(sig) => sig,
        None => Signature::now(repo.config().identity().ok_or(Error::MissingIdentity)?),
    };

    let hash = create_commit(repo, &tree, &parents, &author, message)?;
    update_head(repo, &hash)?;
    Ok(hash)
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}
