use std::fs;
use std::path::Path;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::repo::{atomic_write, Repo};

/// resolve a reference to a digest, following symbolic indirections
///
/// a ref file holds either a digest or `ref: <other-ref>`; chains of any
/// depth are followed. a missing file resolves to None (dangling ref).
pub fn resolve_symbolic(repo: &Repo, ref_name: &str) -> Result<Option<Hash>> {
    let path = repo.gitdir_path(ref_name)?;
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).with_path(&path)?;
    let data = content.strip_suffix('\n').unwrap_or(&content);

    match data.strip_prefix("ref: ") {
        Some(target) => resolve_symbolic(repo, target),
        None => Ok(Some(Hash::from_hex(data)?)),
    }
}

/// create or update a ref under refs/, e.g. "heads/master" or "tags/v1"
pub fn ref_create(repo: &Repo, name: &str, hash: &Hash) -> Result<()> {
    validate_ref_name(name)?;
    let path = repo.gitdir_path(&format!("refs/{name}"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    atomic_write(&path, format!("{}\n", hash.to_hex()).as_bytes())
}

/// list every ref under refs/ with its resolved digest, sorted by name
pub fn ref_list(repo: &Repo) -> Result<Vec<(String, Option<Hash>)>> {
    let refs_dir = repo.gitdir().join("refs");
    let mut names = Vec::new();
    if refs_dir.is_dir() {
        collect_refs(repo.gitdir(), &refs_dir, &mut names)?;
    }
    names.sort();

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let resolved = resolve_symbolic(repo, &name)?;
        out.push((name, resolved));
    }
    Ok(out)
}

/// recursively collect ref names relative to the data directory
fn collect_refs(base: &Path, dir: &Path, names: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();
        if path.is_dir() {
            collect_refs(base, &path, names)?;
        } else if path.is_file() {
            if let Ok(rel) = path.strip_prefix(base) {
                names.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    Ok(())
}

/// validate a ref name before writing it
fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRef("empty ref name".to_string()));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot start or end with '/': {}",
            name
        )));
    }
    if name.contains("//") || name.contains('\0') {
        return Err(Error::InvalidRef(format!("malformed ref name: {}", name)));
    }
    for component in name.split('/') {
        if component == "." || component == ".." {
            return Err(Error::InvalidRef(format!(
                "ref name cannot contain '.' or '..': {}",
                name
            )));
        }
    }
    Ok(())
}

/// name of the branch HEAD points at, or None when detached
pub fn branch_get_active(repo: &Repo) -> Result<Option<String>> {
    let head_path = repo.gitdir().join("HEAD");
    let content = fs::read_to_string(&head_path).with_path(&head_path)?;

    Ok(content
        .strip_prefix("ref: refs/heads/")
        .map(|rest| rest.trim_end_matches('\n').to_string()))
}

/// advance HEAD to a new commit
///
/// moves the active branch ref when HEAD is symbolic; on a detached HEAD
/// the digest is written into HEAD itself.
pub fn update_head(repo: &Repo, hash: &Hash) -> Result<()> {
    match branch_get_active(repo)? {
        Some(branch) => ref_create(repo, &format!("heads/{branch}"), hash),
        None => atomic_write(
            &repo.gitdir().join("HEAD"),
            format!("{}\n", hash.to_hex()).as_bytes(),
        ),
    }
}
