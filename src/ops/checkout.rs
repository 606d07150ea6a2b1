use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{object_read, EntryTarget, Kind, Object};
use crate::resolve::object_find;
use crate::repo::Repo;

/// materialize a committish into an empty directory
///
/// the name may be a commit (dereferenced to its tree), a tag, a branch or
/// a tree digest. an existing destination must be an empty directory; a
/// missing one is created.
pub fn checkout(repo: &Repo, name: &str, dest: &Path) -> Result<()> {
    let tree = object_find(repo, name, Some(Kind::Tree), true)?;

    if dest.exists() {
        if !dest.is_dir() {
            return Err(Error::NotADirectory(dest.to_path_buf()));
        }
        let mut entries = fs::read_dir(dest).with_path(dest)?;
        if entries.next().is_some() {
            return Err(Error::TargetNotEmpty(dest.to_path_buf()));
        }
    } else {
        fs::create_dir_all(dest).with_path(dest)?;
    }

    materialize(repo, &tree, dest)
}

/// recursively write a tree's contents under a destination directory
pub fn materialize(repo: &Repo, tree: &Hash, dest: &Path) -> Result<()> {
    let Object::Tree(tree) = object_read(repo, tree)? else {
        return Err(Error::WrongKind {
            name: tree.to_hex(),
            expected: Kind::Tree,
        });
    };

    for entry in &tree.entries {
        validate_entry_name(&entry.name)?;
        let target_path = dest.join(&entry.name);

        match entry.target()? {
            EntryTarget::Tree => {
                fs::create_dir(&target_path).with_path(&target_path)?;
                materialize(repo, &entry.hash, &target_path)?;
            }
            EntryTarget::Blob => {
                let Object::Blob(data) = object_read(repo, &entry.hash)? else {
                    return Err(Error::CorruptObject(format!(
                        "tree entry {} does not reference a blob",
                        entry.name
                    )));
                };

                if entry.mode.starts_with("12") {
                    // symlink: blob content is the link target
                    let target = std::ffi::OsStr::from_bytes(&data);
                    std::os::unix::fs::symlink(target, &target_path).with_path(&target_path)?;
                } else {
                    fs::write(&target_path, &data).with_path(&target_path)?;
                    let perm_digits = entry.mode.get(2..).unwrap_or("");
                    if let Ok(perms) = u32::from_str_radix(perm_digits, 8) {
                        use std::os::unix::fs::PermissionsExt;
                        fs::set_permissions(
                            &target_path,
                            fs::Permissions::from_mode(perms & 0o777),
                        )
                        .with_path(&target_path)?;
                    }
                }
            }
            // nothing to write for a gitlink
            EntryTarget::Commit => {}
        }
    }

    Ok(())
}

/// a tree entry name must be a single path segment
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
    {
        return Err(Error::InvalidEntryName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{object_write, Tree, TreeEntry};
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

    /// stage and commit a worktree with a nested file, a symlink and an
    /// executable
    fn populated(repo: &Repo) -> crate::hash::Hash {
        use std::os::unix::fs::PermissionsExt;

        fs::create_dir_all(repo.worktree().join("src")).unwrap();
        fs::write(repo.worktree().join("top.txt"), "top").unwrap();
        fs::write(repo.worktree().join("src/lib.rs"), "pub fn x() {}").unwrap();
        fs::write(repo.worktree().join("run.sh"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(
            repo.worktree().join("run.sh"),
            fs::Permissions::from_mode(0o755),
        )
        .unwrap();
        std::os::unix::fs::symlink("top.txt", repo.worktree().join("alias")).unwrap();

        ops::add(repo, &[repo.worktree().to_path_buf()]).unwrap();
        ops::commit(repo, "snapshot", None).unwrap()
    }

    #[test]
    fn test_checkout_roundtrip() {
        let (dir, repo) = test_repo();
        populated(&repo);

        let dest = dir.path().join("out");
        checkout(&repo, "HEAD", &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(dest.join("src/lib.rs")).unwrap(),
            "pub fn x() {}"
        );
        assert_eq!(
            fs::read_link(dest.join("alias")).unwrap(),
            std::path::PathBuf::from("top.txt")
        );
    }

    #[test]
    fn test_checkout_preserves_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, repo) = test_repo();
        populated(&repo);

        let dest = dir.path().join("out");
        checkout(&repo, "HEAD", &dest).unwrap();

        let mode = fs::metadata(dest.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn test_checkout_by_branch_and_prefix() {
        let (dir, repo) = test_repo();
        let commit = populated(&repo);

        checkout(&repo, "master", &dir.path().join("by-branch")).unwrap();
        checkout(&repo, &commit.to_hex()[..10], &dir.path().join("by-prefix")).unwrap();
    }

    #[test]
    fn test_checkout_refuses_nonempty() {
        let (dir, repo) = test_repo();
        populated(&repo);

        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("occupied"), "x").unwrap();

        let result = checkout(&repo, "HEAD", &dest);
        assert!(matches!(result, Err(Error::TargetNotEmpty(_))));
    }

    #[test]
    fn test_checkout_refuses_file_destination() {
        let (dir, repo) = test_repo();
        populated(&repo);

        let dest = dir.path().join("a-file");
        fs::write(&dest, "x").unwrap();

        let result = checkout(&repo, "HEAD", &dest);
        assert!(matches!(result, Err(Error::NotADirectory(_))));
    }

    #[test]
    fn test_materialize_rejects_traversal_names() {
        let (dir, repo) = test_repo();

        // hand-build a tree whose entry name tries to escape
        let blob = object_write(&repo, &Object::Blob(b"evil".to_vec())).unwrap();
        let tree = object_write(
            &repo,
            &Object::Tree(Tree {
                entries: vec![TreeEntry::new("100644", "..", blob)],
            }),
        )
        .unwrap();

        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        let result = materialize(&repo, &tree, &dest);
        assert!(matches!(result, Err(Error::InvalidEntryName(_))));
    }

    #[test]
    fn test_checkout_unknown_name() {
        let (dir, repo) = test_repo();
        let result = checkout(&repo, "nonexistent", &dir.path().join("out"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
