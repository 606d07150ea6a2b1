use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::{object_read, object_write, Object, Signature, Tag};
use crate::refs::ref_create;
use crate::resolve::object_find;
use crate::repo::Repo;

/// create a tag pointing at a resolvable name
///
/// a lightweight tag is just a ref to the target. an annotated tag writes
/// a tag object carrying the tagger and message, and the ref points at
/// that object instead.
pub fn tag_create(
    repo: &Repo,
    name: &str,
    target: &str,
    annotated: bool,
    tagger: Option<Signature>,
    message: &str,
) -> Result<Hash> {
    let target_hash = object_find(repo, target, None, true)?;

    let ref_target = if annotated {
        let tagger = match tagger {
            Some(sig) => sig,
            None => Signature::now(repo.config().identity().ok_or(Error::MissingIdentity)?),
        };
        let target_kind = object_read(repo, &target_hash)?.kind();
        let tag = Tag::build(&target_hash, target_kind.name(), name, &tagger, message);
        object_write(repo, &Object::Tag(tag))?
    } else {
        target_hash
    };

    ref_create(repo, &format!("tags/{name}"), &ref_target)?;
    Ok(ref_target)
}
