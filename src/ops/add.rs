use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::ignore::IgnoreRules;
use crate::index::{FileKind, Index, IndexEntry};
use crate::object::{object_write, Object};
use crate::repo::{absolutize, Repo, DATA_DIR};

/// stage paths: read-modify-write convenience over add_to_index
pub fn add(repo: &Repo, paths: &[PathBuf]) -> Result<()> {
    let mut index = Index::read(repo)?;
    add_to_index(repo, &mut index, paths)?;
    index.write(repo)
}

/// unstage paths: read-modify-write convenience over remove_from_index
pub fn rm(repo: &Repo, paths: &[PathBuf], delete: bool, skip_missing: bool) -> Result<()> {
    let mut index = Index::read(repo)?;
    remove_from_index(repo, &mut index, paths, delete, skip_missing)?;
    index.write(repo)
}

/// stage the given paths into an explicit index value
///
/// file content is hashed into the object store first, then the entry is
/// created (replacing any previous entry for the path). directory
/// arguments recurse over the worktree, skipping the data directory and
/// ignored paths; explicitly named files are staged regardless of ignore
/// rules.
pub fn add_to_index(repo: &Repo, index: &mut Index, paths: &[PathBuf]) -> Result<()> {
    let rules = IgnoreRules::load(repo)?;

    // resolve every argument to (absolute, worktree-relative) before
    // touching the index, so a bad path leaves it unmodified
    let mut targets: BTreeSet<(PathBuf, String)> = BTreeSet::new();
    for path in paths {
        let abs = absolutize(path)?;
        let rel = worktree_relative(repo, &abs)?;

        if abs.is_dir() {
            for entry in WalkDir::new(&abs)
                .into_iter()
                .filter_entry(|e| e.file_name() != DATA_DIR)
            {
                let entry = entry.map_err(|e| Error::Io {
                    path: abs.clone(),
                    source: e.into(),
                })?;
                if !entry.file_type().is_file() && !entry.file_type().is_symlink() {
                    continue;
                }
                let file_abs = entry.path().to_path_buf();
                let file_rel = worktree_relative(repo, &file_abs)?;
                if rules.is_ignored(&file_rel) {
                    continue;
                }
                targets.insert((file_abs, file_rel));
            }
        } else {
            // stat errors (missing file) surface here
            fs::symlink_metadata(&abs).with_path(&abs)?;
            targets.insert((abs, rel));
        }
    }

    for (abs, rel) in targets {
        stage_file(repo, index, &abs, rel)?;
    }
    Ok(())
}

/// drop paths from an explicit index value
///
/// a path that is not staged is an error unless skip_missing; with delete
/// the worktree files are removed as well.
pub fn remove_from_index(
    repo: &Repo,
    index: &mut Index,
    paths: &[PathBuf],
    delete: bool,
    skip_missing: bool,
) -> Result<()> {
    let mut targets: BTreeSet<String> = BTreeSet::new();
    for path in paths {
        let abs = absolutize(path)?;
        targets.insert(worktree_relative(repo, &abs)?);
    }

    let mut removed = Vec::new();
    index.entries.retain(|entry| {
        if targets.remove(&entry.name) {
            removed.push(entry.name.clone());
            false
        } else {
            true
        }
    });

    if !skip_missing {
        if let Some(missing) = targets.iter().next() {
            return Err(Error::NotStaged(missing.clone()));
        }
    }

    if delete {
        for name in &removed {
            let path = repo.worktree().join(name);
            fs::remove_file(&path).with_path(&path)?;
        }
    }

    Ok(())
}

/// hash one file into the store and record its index entry
fn stage_file(repo: &Repo, index: &mut Index, abs: &Path, rel: String) -> Result<()> {
    let meta = fs::symlink_metadata(abs).with_path(abs)?;

    let (kind, perms, content) = if meta.file_type().is_symlink() {
        let target = fs::read_link(abs).with_path(abs)?;
        let bytes = target.to_string_lossy().into_owned().into_bytes();
        (FileKind::Symlink, 0u16, bytes)
    } else {
        let perms = if meta.mode() & 0o111 != 0 { 0o755 } else { 0o644 };
        (FileKind::Regular, perms, fs::read(abs).with_path(abs)?)
    };

    let size = content.len() as u32;
    let hash = object_write(repo, &Object::Blob(content))?;

    index.upsert(IndexEntry {
        ctime: (meta.ctime() as u32, meta.ctime_nsec() as u32),
        mtime: (meta.mtime() as u32, meta.mtime_nsec() as u32),
        dev: meta.dev() as u32,
        ino: meta.ino() as u32,
        kind,
        perms,
        uid: meta.uid(),
        gid: meta.gid(),
        size,
        hash,
        assume_valid: false,
        stage: 0,
        name: rel,
    });
    Ok(())
}

/// forward-slash worktree-relative form of an absolute path
fn worktree_relative(repo: &Repo, abs: &Path) -> Result<String> {
    let rel = abs
        .strip_prefix(repo.worktree())
        .map_err(|_| Error::NotInWorktree(abs.to_path_buf()))?;
    Ok(rel.to_string_lossy().replace('\\', "/"))
}
