use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{object_read, EntryTarget, Kind, Object};
use crate::resolve::object_find;
use crate::repo::Repo;

/// one listed tree entry with its full path from the listing root
#[derive(Clone, Debug)]
pub struct LsTreeRow {
    pub mode: String,
    pub target: EntryTarget,
    pub hash: Hash,
    pub path: String,
}

/// list the contents of a tree-ish name, optionally recursing into
/// subtrees
pub fn ls_tree(repo: &Repo, name: &str, recursive: bool) -> Result<Vec<LsTreeRow>> {
    let tree = object_find(repo, name, Some(Kind::Tree), true)?;
    let mut rows = Vec::new();
    walk(repo, &tree, "", recursive, &mut rows)?;
    Ok(rows)
}

fn walk(
    repo: &Repo,
    tree: &Hash,
    prefix: &str,
    recursive: bool,
    rows: &mut Vec<LsTreeRow>,
) -> Result<()> {
    let Object::Tree(tree) = object_read(repo, tree)? else {
        return Err(Error::CorruptObject(format!("{tree} is not a tree")));
    };

    for entry in &tree.entries {
        let target = entry.target()?;
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", prefix, entry.name)
        };

        if recursive && target == EntryTarget::Tree {
            walk(repo, &entry.hash, &path, recursive, rows)?;
        } else {
            rows.push(LsTreeRow {
                mode: entry.mode.clone(),
                target,
                hash: entry.hash,
                path,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;
    use std::fs;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let mut repo = Repo::init(&repo_path).unwrap();
        repo.config_mut().set_user("Tester", "tester@example.com");
        repo.save_config().unwrap();
        (dir, repo)
    }

    fn populated(repo: &Repo) {
        fs::create_dir_all(repo.worktree().join("dir")).unwrap();
        fs::write(repo.worktree().join("a.txt"), "a").unwrap();
        fs::write(repo.worktree().join("dir/b.txt"), "b").unwrap();
        ops::add(repo, &[repo.worktree().to_path_buf()]).unwrap();
        ops::commit(repo, "snapshot", None).unwrap();
    }

    #[test]
    fn test_ls_tree_flat() {
        let (_dir, repo) = test_repo();
        populated(&repo);

        let rows = ls_tree(&repo, "HEAD", false).unwrap();
        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "dir"]);
        assert_eq!(rows[1].target, EntryTarget::Tree);
        assert_eq!(rows[1].mode, "040000");
    }

    #[test]
    fn test_ls_tree_recursive() {
        let (_dir, repo) = test_repo();
        populated(&repo);

        let rows = ls_tree(&repo, "HEAD", true).unwrap();
        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "dir/b.txt"]);
        assert!(rows.iter().all(|r| r.target == EntryTarget::Blob));
    }
}
