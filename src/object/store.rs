use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{hash_frame, Hash};
use crate::object::commit::{Commit, Tag};
use crate::object::kvlm::Kvlm;
use crate::object::tree::Tree;
use crate::repo::{atomic_write, Repo};

/// the four object kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl Kind {
    /// kind name as used in the object framing
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Blob => "blob",
            Kind::Tree => "tree",
            Kind::Commit => "commit",
            Kind::Tag => "tag",
        }
    }

    /// parse a kind name
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "blob" => Ok(Kind::Blob),
            "tree" => Ok(Kind::Tree),
            "commit" => Ok(Kind::Commit),
            "tag" => Ok(Kind::Tag),
            _ => Err(Error::InvalidObjectType(name.to_string())),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// an immutable content-addressed object
///
/// one tagged variant per kind with a single codec dispatch; identity is
/// the digest of the framed serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    pub fn kind(&self) -> Kind {
        match self {
            Object::Blob(_) => Kind::Blob,
            Object::Tree(_) => Kind::Tree,
            Object::Commit(_) => Kind::Commit,
            Object::Tag(_) => Kind::Tag,
        }
    }

    /// serialize the payload (without framing)
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Object::Blob(data) => data.clone(),
            Object::Tree(tree) => tree.serialize(),
            Object::Commit(commit) => commit.serialize(),
            Object::Tag(tag) => tag.serialize(),
        }
    }

    /// parse a payload for the given kind
    pub fn parse(kind: Kind, payload: &[u8]) -> Result<Self> {
        match kind {
            Kind::Blob => Ok(Object::Blob(payload.to_vec())),
            Kind::Tree => Ok(Object::Tree(Tree::parse(payload)?)),
            Kind::Commit => Ok(Object::Commit(Commit::from_kvlm(Kvlm::parse(payload)?))),
            Kind::Tag => Ok(Object::Tag(Tag::from_kvlm(Kvlm::parse(payload)?))),
        }
    }
}

/// frame a payload as `kind SP length NUL payload`
fn frame(kind: Kind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 16);
    out.extend_from_slice(kind.name().as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(0);
    out.extend_from_slice(payload);
    out
}

/// digest an object without touching the store
pub fn hash_object(obj: &Object) -> Hash {
    hash_frame(&frame(obj.kind(), &obj.serialize()))
}

/// filesystem path of an object: two hex chars of fan-out directory,
/// remaining 38 as the file name
pub fn object_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.objects_path().join(dir).join(file)
}

/// check whether an object is present
pub fn object_exists(repo: &Repo, hash: &Hash) -> bool {
    object_path(repo, hash).exists()
}

/// write an object to the store, returning its digest
///
/// writing identical content twice is a no-op: objects are immutable, so
/// an existing file under the digest's path already holds these bytes.
pub fn object_write(repo: &Repo, obj: &Object) -> Result<Hash> {
    let framed = frame(obj.kind(), &obj.serialize());
    let hash = hash_frame(&framed);

    let path = object_path(repo, &hash);
    if path.exists() {
        return Ok(hash);
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_path(dir)?;
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&framed).with_path(&path)?;
    let compressed = encoder.finish().with_path(&path)?;

    atomic_write(&path, &compressed)?;

    Ok(hash)
}

/// read an object from the store
pub fn object_read(repo: &Repo, hash: &Hash) -> Result<Object> {
    let path = object_path(repo, hash);

    let compressed = fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io { path: path.clone(), source: e }
        }
    })?;

    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|_| Error::CorruptObject(format!("{hash}: bad compression stream")))?;

    let spc = raw
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::CorruptObject(format!("{hash}: missing kind")))?;
    let kind_name = std::str::from_utf8(&raw[..spc])
        .map_err(|_| Error::CorruptObject(format!("{hash}: non-ascii kind")))?;
    let kind = Kind::from_name(kind_name)
        .map_err(|_| Error::CorruptObject(format!("{hash}: unknown kind {kind_name}")))?;

    let nul = raw[spc..]
        .iter()
        .position(|&b| b == 0)
        .map(|i| spc + i)
        .ok_or_else(|| Error::CorruptObject(format!("{hash}: missing length terminator")))?;
    let size: usize = std::str::from_utf8(&raw[spc + 1..nul])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::CorruptObject(format!("{hash}: bad length field")))?;

    let payload = &raw[nul + 1..];
    if size != payload.len() {
        return Err(Error::CorruptObject(format!(
            "{hash}: length field says {size}, payload is {}",
            payload.len()
        )));
    }

    Object::parse(kind, payload)
}

/// all stored digests starting with a 4-40 char hex prefix
pub fn resolve_prefix(repo: &Repo, prefix: &str) -> Result<Vec<Hash>> {
    let prefix = prefix.to_ascii_lowercase();
    if prefix.len() < 4 || prefix.len() > 40 || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(Vec::new());
    }

    let dir = repo.objects_path().join(&prefix[..2]);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let rest = &prefix[2..];
    let mut candidates = Vec::new();
    for entry in fs::read_dir(&dir).with_path(&dir)? {
        let entry = entry.with_path(&dir)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(rest) {
            if let Ok(hash) = Hash::from_hex(&format!("{}{}", &prefix[..2], name)) {
                candidates.push(hash);
            }
        }
    }

    candidates.sort();
    Ok(candidates)
}
