use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::os::unix::fs::MetadataExt;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::ignore::IgnoreRules;
use crate::index::{FileKind, Index, IndexEntry};
use crate::object::{hash_object, object_read, Object};
use crate::refs::{branch_get_active, resolve_symbolic};
use crate::repo::{Repo, DATA_DIR};

/// how a path differs between two states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// a single differing path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: String,
}

/// working tree status report
#[derive(Clone, Debug)]
pub struct Status {
    /// active branch name, None when HEAD is detached
    pub branch: Option<String>,
    /// current HEAD commit, None before the first commit
    pub head: Option<Hash>,
    /// index vs HEAD: changes that would be committed
    pub staged: Vec<Change>,
    /// worktree vs index: changes not yet staged
    pub unstaged: Vec<Change>,
    /// files present on disk but neither staged nor ignored
    pub untracked: Vec<String>,
}

/// compute the full three-way status: HEAD vs index vs worktree
pub fn status(repo: &Repo) -> Result<Status> {
    let index = Index::read(repo)?;
    let branch = branch_get_active(repo)?;
    let head = resolve_symbolic(repo, "HEAD")?;

    let staged = diff_head_index(repo, head.as_ref(), &index)?;
    let (unstaged, untracked) = diff_index_worktree(repo, &index)?;

    Ok(Status {
        branch,
        head,
        staged,
        unstaged,
        untracked,
    })
}

/// index vs the HEAD commit's flattened tree
fn diff_head_index(repo: &Repo, head: Option<&Hash>, index: &Index) -> Result<Vec<Change>> {
    let mut head_map = BTreeMap::new();
    if let Some(commit_hash) = head {
        let Object::Commit(commit) = object_read(repo, commit_hash)? else {
            return Err(Error::CorruptObject(format!(
                "HEAD {commit_hash} is not a commit"
            )));
        };
        flatten_tree(repo, &commit.tree()?, "", &mut head_map)?;
    }

    let mut changes = Vec::new();
    for entry in &index.entries {
        match head_map.remove(&entry.name) {
            Some(head_hash) => {
                if head_hash != entry.hash {
                    changes.push(Change {
                        kind: ChangeKind::Modified,
                        path: entry.name.clone(),
                    });
                }
            }
            None => changes.push(Change {
                kind: ChangeKind::Added,
                path: entry.name.clone(),
            }),
        }
    }
    for path in head_map.into_keys() {
        changes.push(Change {
            kind: ChangeKind::Deleted,
            path,
        });
    }
    Ok(changes)
}

/// worktree vs index, plus the untracked file list
fn diff_index_worktree(repo: &Repo, index: &Index) -> Result<(Vec<Change>, Vec<String>)> {
    let mut on_disk = BTreeSet::new();
    for entry in WalkDir::new(repo.worktree())
        .into_iter()
        .filter_entry(|e| e.file_name() != DATA_DIR)
    {
        let entry = entry.map_err(|e| Error::Io {
            path: repo.worktree().to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() && !entry.file_type().is_symlink() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(repo.worktree()) {
            on_disk.insert(rel.to_string_lossy().replace('\\', "/"));
        }
    }

    let mut unstaged = Vec::new();
    for entry in &index.entries {
        let full = repo.worktree().join(&entry.name);
        match fs::symlink_metadata(&full) {
            Err(_) => unstaged.push(Change {
                kind: ChangeKind::Deleted,
                path: entry.name.clone(),
            }),
            Ok(meta) => {
                // timestamps unchanged means content unchanged; otherwise
                // re-hash before declaring a modification
                let same_times = meta.ctime() as u32 == entry.ctime.0
                    && meta.ctime_nsec() as u32 == entry.ctime.1
                    && meta.mtime() as u32 == entry.mtime.0
                    && meta.mtime_nsec() as u32 == entry.mtime.1;
                if !same_times && rehash(&full, entry)? != entry.hash {
                    unstaged.push(Change {
                        kind: ChangeKind::Modified,
                        path: entry.name.clone(),
                    });
                }
            }
        }
        on_disk.remove(&entry.name);
    }

    let rules = IgnoreRules::load(repo)?;
    let untracked = on_disk
        .into_iter()
        .filter(|path| !rules.is_ignored(path))
        .collect();

    Ok((unstaged, untracked))
}

/// digest the current worktree content of a staged path, without writing
fn rehash(full: &std::path::Path, entry: &IndexEntry) -> Result<Hash> {
    let content = match entry.kind {
        FileKind::Symlink => fs::read_link(full)
            .map(|t| t.to_string_lossy().into_owned().into_bytes())
            .map_err(|e| Error::Io {
                path: full.to_path_buf(),
                source: e,
            })?,
        _ => fs::read(full).map_err(|e| Error::Io {
            path: full.to_path_buf(),
            source: e,
        })?,
    };
    Ok(hash_object(&Object::Blob(content)))
}

/// flatten a tree into path -> digest, recursing into subtrees
fn flatten_tree(
    repo: &Repo,
    tree: &Hash,
    prefix: &str,
    out: &mut BTreeMap<String, Hash>,
) -> Result<()> {
    let Object::Tree(tree) = object_read(repo, tree)? else {
        return Err(Error::CorruptObject(format!("{tree} is not a tree")));
    };

    for entry in &tree.entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", prefix, entry.name)
        };
        if entry.is_tree() {
            flatten_tree(repo, &entry.hash, &path, out)?;
        } else {
            out.insert(path, entry.hash);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let mut repo = Repo::init(&repo_path).unwrap();
        repo.config_mut().set_user("Tester", "tester@example.com");
        repo.save_config().unwrap();
        (dir, repo)
    }

    fn change(kind: ChangeKind, path: &str) -> Change {
        Change {
            kind,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_fresh_repo() {
        let (_dir, repo) = test_repo();

        let st = status(&repo).unwrap();
        assert_eq!(st.branch.as_deref(), Some("master"));
        assert!(st.head.is_none());
        assert!(st.staged.is_empty());
        assert!(st.unstaged.is_empty());
        assert!(st.untracked.is_empty());
    }

    #[test]
    fn test_staged_added() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree().join("new.txt"), "n").unwrap();
        ops::add(&repo, &[repo.worktree().join("new.txt")]).unwrap();

        let st = status(&repo).unwrap();
        assert_eq!(st.staged, vec![change(ChangeKind::Added, "new.txt")]);
        assert!(st.untracked.is_empty());
    }

    #[test]
    fn test_clean_after_commit() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree().join("f.txt"), "v1").unwrap();
        ops::add(&repo, &[repo.worktree().join("f.txt")]).unwrap();
        ops::commit(&repo, "c1", None).unwrap();

        let st = status(&repo).unwrap();
        assert!(st.head.is_some());
        assert!(st.staged.is_empty());
        assert!(st.unstaged.is_empty());
        assert!(st.untracked.is_empty());
    }

    #[test]
    fn test_staged_modified_and_deleted() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree().join("keep.txt"), "k").unwrap();
        fs::write(repo.worktree().join("gone.txt"), "g").unwrap();
        ops::add(&repo, &[repo.worktree().to_path_buf()]).unwrap();
        ops::commit(&repo, "base", None).unwrap();

        // restage keep.txt with new content, drop gone.txt from the index
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(repo.worktree().join("keep.txt"), "changed").unwrap();
        ops::add(&repo, &[repo.worktree().join("keep.txt")]).unwrap();
        ops::rm(&repo, &[repo.worktree().join("gone.txt")], true, false).unwrap();

        let st = status(&repo).unwrap();
        assert!(st.staged.contains(&change(ChangeKind::Modified, "keep.txt")));
        assert!(st.staged.contains(&change(ChangeKind::Deleted, "gone.txt")));
    }

    #[test]
    fn test_unstaged_modification() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree().join("f.txt"), "v1").unwrap();
        ops::add(&repo, &[repo.worktree().join("f.txt")]).unwrap();
        ops::commit(&repo, "c1", None).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(repo.worktree().join("f.txt"), "edited").unwrap();

        let st = status(&repo).unwrap();
        assert_eq!(st.unstaged, vec![change(ChangeKind::Modified, "f.txt")]);
    }

    #[test]
    fn test_touch_without_edit_is_clean() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree().join("f.txt"), "same").unwrap();
        ops::add(&repo, &[repo.worktree().join("f.txt")]).unwrap();

        // rewrite identical bytes: timestamps move, content hash does not
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(repo.worktree().join("f.txt"), "same").unwrap();

        let st = status(&repo).unwrap();
        assert!(st.unstaged.is_empty());
    }

    #[test]
    fn test_unstaged_deletion() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree().join("f.txt"), "x").unwrap();
        ops::add(&repo, &[repo.worktree().join("f.txt")]).unwrap();

        fs::remove_file(repo.worktree().join("f.txt")).unwrap();

        let st = status(&repo).unwrap();
        assert_eq!(st.unstaged, vec![change(ChangeKind::Deleted, "f.txt")]);
    }

    #[test]
    fn test_untracked_respects_ignore() {
        let (_dir, repo) = test_repo();
        fs::write(repo.gitdir().join("info/exclude"), "*.log\n").unwrap();
        fs::write(repo.worktree().join("visible.txt"), "v").unwrap();
        fs::write(repo.worktree().join("hidden.log"), "h").unwrap();

        let st = status(&repo).unwrap();
        assert_eq!(st.untracked, vec!["visible.txt".to_string()]);
    }

    #[test]
    fn test_detached_head() {
        let (_dir, repo) = test_repo();
        fs::write(repo.worktree().join("f.txt"), "x").unwrap();
        ops::add(&repo, &[repo.worktree().join("f.txt")]).unwrap();
        let hash = ops::commit(&repo, "c1", None).unwrap();

        fs::write(repo.gitdir().join("HEAD"), format!("{}\n", hash.to_hex())).unwrap();

        let st = status(&repo).unwrap();
        assert!(st.branch.is_none());
        assert_eq!(st.head, Some(hash));
    }
}
