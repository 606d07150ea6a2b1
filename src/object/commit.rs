use std::fmt;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::object::kvlm::Kvlm;

/// author/committer identity with timestamp and timezone offset
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// "Name <email>"
    pub identity: String,
    /// unix seconds
    pub when: i64,
    /// offset from UTC in seconds
    pub tz_offset_secs: i32,
}

impl Signature {
    pub fn new(identity: impl Into<String>, when: i64, tz_offset_secs: i32) -> Self {
        Self {
            identity: identity.into(),
            when,
            tz_offset_secs,
        }
    }

    /// signature for the current instant in the local timezone
    pub fn now(identity: impl Into<String>) -> Self {
        let now = chrono::Local::now();
        Self {
            identity: identity.into(),
            when: now.timestamp(),
            tz_offset_secs: now.offset().local_minus_utc(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.tz_offset_secs < 0 { '-' } else { '+' };
        let offset = self.tz_offset_secs.unsigned_abs();
        let hours = offset / 3600;
        let minutes = (offset % 3600) / 60;
        write!(
            f,
            "{} {} {}{:02}{:02}",
            self.identity, self.when, sign, hours, minutes
        )
    }
}

/// a commit: a tree digest, parent digest(s), identities and a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    kvlm: Kvlm,
}

impl Commit {
    /// view an already-parsed record as a commit
    pub fn from_kvlm(kvlm: Kvlm) -> Self {
        Self { kvlm }
    }

    /// build a commit record
    ///
    /// the message is normalized to end in exactly one newline, since the
    /// serialization (and therefore the digest) depends on it.
    pub fn build(tree: &Hash, parents: &[Hash], author: &Signature, message: &str) -> Self {
        let mut kvlm = Kvlm::new();
        kvlm.set("tree", tree.to_hex().into_bytes());
        for parent in parents {
            kvlm.append("parent", parent.to_hex().into_bytes());
        }
        let sig = author.to_string().into_bytes();
        kvlm.set("author", sig.clone());
        kvlm.set("committer", sig);
        kvlm.set_message(format!("{}\n", message.trim_end()).into_bytes());
        Self { kvlm }
    }

    pub fn kvlm(&self) -> &Kvlm {
        &self.kvlm
    }

    /// digest of the root tree
    pub fn tree(&self) -> Result<Hash> {
        let raw = self
            .kvlm
            .get("tree")
            .ok_or_else(|| Error::CorruptObject("commit without tree field".into()))?;
        parse_hash_field(raw)
    }

    /// parent digests: empty for a root commit, several for a merge
    pub fn parents(&self) -> Result<Vec<Hash>> {
        self.kvlm
            .get_all("parent")
            .iter()
            .map(|raw| parse_hash_field(raw))
            .collect()
    }

    pub fn author(&self) -> Option<&[u8]> {
        self.kvlm.get("author")
    }

    pub fn committer(&self) -> Option<&[u8]> {
        self.kvlm.get("committer")
    }

    pub fn message(&self) -> &[u8] {
        self.kvlm.message()
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.kvlm.serialize()
    }
}

/// a tag object: same record format as a commit plus object/type fields
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    kvlm: Kvlm,
}

impl Tag {
    pub fn from_kvlm(kvlm: Kvlm) -> Self {
        Self { kvlm }
    }

    /// build an annotated tag record
    pub fn build(
        object: &Hash,
        target_type: &str,
        name: &str,
        tagger: &Signature,
        message: &str,
    ) -> Self {
        let mut kvlm = Kvlm::new();
        kvlm.set("object", object.to_hex().into_bytes());
        kvlm.set("type", target_type.as_bytes().to_vec());
        kvlm.set("tag", name.as_bytes().to_vec());
        kvlm.set("tagger", tagger.to_string().into_bytes());
        kvlm.set_message(format!("{}\n", message.trim_end()).into_bytes());
        Self { kvlm }
    }

    pub fn kvlm(&self) -> &Kvlm {
        &self.kvlm
    }

    /// digest of the tagged object
    pub fn object(&self) -> Result<Hash> {
        let raw = self
            .kvlm
            .get("object")
            .ok_or_else(|| Error::CorruptObject("tag without object field".into()))?;
        parse_hash_field(raw)
    }

    /// kind name of the tagged object
    pub fn target_type(&self) -> Option<&[u8]> {
        self.kvlm.get("type")
    }

    pub fn name(&self) -> Option<&[u8]> {
        self.kvlm.get("tag")
    }

    pub fn message(&self) -> &[u8] {
        self.kvlm.message()
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.kvlm.serialize()
    }
}

fn parse_hash_field(raw: &[u8]) -> Result<Hash> {
    let s = std::str::from_utf8(raw)
        .map_err(|_| Error::CorruptObject("non-ascii digest field".into()))?;
    Hash::from_hex(s.trim()).map_err(|_| Error::CorruptObject(format!("bad digest field {s:?}")))
}
