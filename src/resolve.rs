use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{object_read, resolve_prefix, Kind, Object};
use crate::refs::resolve_symbolic;
use crate::repo::Repo;

/// collect every digest a name could mean
///
/// "HEAD" delegates to the symbolic resolver; a 4-40 char hex string is
/// treated as a possibly-abbreviated digest and matched against the store;
/// independently the name is tried as a literal tag, branch and remote
/// ref. all matches accumulate into one candidate set.
pub fn resolve_name(repo: &Repo, name: &str) -> Result<Vec<Hash>> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(Vec::new());
    }

    if name == "HEAD" {
        return Ok(resolve_symbolic(repo, "HEAD")?.into_iter().collect());
    }

    let mut candidates = Vec::new();

    let is_hex = name.len() >= 4 && name.len() <= 40 && name.bytes().all(|b| b.is_ascii_hexdigit());
    if is_hex {
        candidates.extend(resolve_prefix(repo, name)?);
    }

    for namespace in ["refs/tags/", "refs/heads/", "refs/remotes/"] {
        if let Some(hash) = resolve_symbolic(repo, &format!("{namespace}{name}"))? {
            candidates.push(hash);
        }
    }

    Ok(candidates)
}

/// resolve a name to exactly one digest of the requested kind
///
/// zero candidates is NotFound; several is AmbiguousReference carrying the
/// full list so the caller can disambiguate. with a kind filter the result
/// is dereferenced: a tag follows its object field, a commit yields its
/// tree when a tree is wanted. a chain that cannot reach the requested
/// kind fails (NotFound when not following, WrongKind otherwise).
pub fn object_find(
    repo: &Repo,
    name: &str,
    kind: Option<Kind>,
    follow: bool,
) -> Result<Hash> {
    let candidates = resolve_name(repo, name)?;

    let mut sha = match candidates.len() {
        0 => return Err(Error::NotFound(name.to_string())),
        1 => candidates[0],
        _ => {
            return Err(Error::AmbiguousReference {
                name: name.to_string(),
                candidates,
            })
        }
    };

    let Some(want) = kind else {
        return Ok(sha);
    };

    loop {
        let obj = object_read(repo, &sha)?;
        if obj.kind() == want {
            return Ok(sha);
        }
        if !follow {
            return Err(Error::NotFound(name.to_string()));
        }
        match obj {
            Object::Tag(tag) => sha = tag.object()?,
            Object::Commit(commit) if want == Kind::Tree => sha = commit.tree()?,
            _ => {
                return Err(Error::WrongKind {
                    name: name.to_string(),
                    expected: want,
                })
            }
        }
    }
}
