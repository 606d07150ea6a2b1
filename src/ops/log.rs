use std::collections::HashSet;

use crate::error::Result;
use crate::hash::Hash;
use crate::object::{object_read, Commit, Kind, Object};
use crate::resolve::object_find;
use crate::repo::Repo;

/// commit with its digest for log output
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub hash: Hash,
    pub commit: Commit,
}

/// walk the commit graph depth-first from a starting name
///
/// the seen set terminates the walk when histories converge (merges make
/// the graph a DAG, not a list).
pub fn log(repo: &Repo, name: &str) -> Result<Vec<LogEntry>> {
    let start = object_find(repo, name, Some(Kind::Commit), true)?;

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![start];

    while let Some(hash) = stack.pop() {
        if !seen.insert(hash) {
            continue;
        }

        let Object::Commit(commit) = object_read(repo, &hash)? else {
            // parent chains only ever reference commits
            continue;
        };

        // push in reverse so the first parent is visited first
        for parent in commit.parents()?.into_iter().rev() {
            stack.push(parent);
        }

        entries.push(LogEntry { hash, commit });
    }

    Ok(entries)
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

    fn commit_file(repo: &Repo, content: &str, message: &str) -> Hash {
        fs::write(repo.worktree().join("f.txt"), content).unwrap();
        ops::add(repo, &[repo.worktree().join("f.txt")]).unwrap();
        ops::commit(repo, message, None).unwrap()
    }

    #[test]
    fn test_log_single_commit() {
        let (_dir, repo) = test_repo();
        let hash = commit_file(&repo, "v1", "first");

        let entries = log(&repo, "HEAD").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash, hash);
        assert_eq!(entries[0].commit.message(), b"first\n");
    }

    #[test]
    fn test_log_linear_history_newest_first() {
        let (_dir, repo) = test_repo();
        let c1 = commit_file(&repo, "v1", "one");
        let c2 = commit_file(&repo, "v2", "two");
        let c3 = commit_file(&repo, "v3", "three");

        let entries = log(&repo, "HEAD").unwrap();
        let hashes: Vec<_> = entries.iter().map(|e| e.hash).collect();
        assert_eq!(hashes, vec![c3, c2, c1]);
    }

    #[test]
    fn test_log_from_older_commit() {
        let (_dir, repo) = test_repo();
        let c1 = commit_file(&repo, "v1", "one");
        commit_file(&repo, "v2", "two");

        let entries = log(&repo, &c1.to_hex()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash, c1);
    }

    #[test]
    fn test_log_unknown_name() {
        let (_dir, repo) = test_repo();
        assert!(log(&repo, "HEAD").is_err());
    }
}
