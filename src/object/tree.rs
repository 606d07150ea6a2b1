use crate::error::{Error, Result};
use crate::hash::Hash;

/// object kind a tree entry points at, derived from its mode prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryTarget {
    Tree,
    Blob,
    Commit,
}

impl EntryTarget {
    pub fn name(&self) -> &'static str {
        match self {
            EntryTarget::Tree => "tree",
            EntryTarget::Blob => "blob",
            EntryTarget::Commit => "commit",
        }
    }
}

/// a single entry in a tree: mode, path segment, target digest
///
/// the mode is six ASCII octal digits: two for the object kind and four
/// for the permission bits (e.g. "100644", "040000", "120000").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: String,
    pub name: String,
    pub hash: Hash,
}

impl TreeEntry {
    pub fn new(mode: impl Into<String>, name: impl Into<String>, hash: Hash) -> Self {
        Self {
            mode: mode.into(),
            name: name.into(),
            hash,
        }
    }

    /// does this entry reference a subtree
    pub fn is_tree(&self) -> bool {
        self.mode.starts_with("04")
    }

    /// object kind this entry points at
    pub fn target(&self) -> Result<EntryTarget> {
        match self.mode.get(..2) {
            Some("04") => Ok(EntryTarget::Tree),
            Some("10") | Some("12") => Ok(EntryTarget::Blob),
            Some("16") => Ok(EntryTarget::Commit),
            _ => Err(Error::CorruptObject(format!(
                "unknown tree entry mode {}",
                self.mode
            ))),
        }
    }

    /// sort key for canonical encoding: non-blob entries compare as if
    /// their name had a trailing slash, so a directory `foo` orders after
    /// a file `foo.txt`
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if !self.mode.starts_with("10") {
            key.push(b'/');
        }
        key
    }
}

/// one directory level of a snapshot: an ordered set of entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// look up an entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// decode the binary tree format
    ///
    /// per entry: space-terminated octal mode (five-digit modes are
    /// normalized by left-padding a zero), NUL-terminated name, then the
    /// raw 20-byte big-endian digest. repeats until input is exhausted.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < raw.len() {
            let spc = raw[pos..]
                .iter()
                .position(|&b| b == b' ')
                .map(|i| pos + i)
                .ok_or_else(|| Error::CorruptObject("tree entry missing mode".into()))?;

            let mode_len = spc - pos;
            if mode_len != 5 && mode_len != 6 {
                return Err(Error::CorruptObject(format!(
                    "tree entry mode has {} bytes",
                    mode_len
                )));
            }
            let mut mode = std::str::from_utf8(&raw[pos..spc])
                .map_err(|_| Error::CorruptObject("non-ascii tree mode".into()))?
                .to_string();
            if !mode.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::CorruptObject(format!("non-octal tree mode {mode}")));
            }
            if mode.len() == 5 {
                mode.insert(0, '0');
            }

            let nul = raw[spc..]
                .iter()
                .position(|&b| b == 0)
                .map(|i| spc + i)
                .ok_or_else(|| Error::CorruptObject("tree entry name unterminated".into()))?;
            let name = std::str::from_utf8(&raw[spc + 1..nul])
                .map_err(|_| Error::CorruptObject("non-utf8 tree entry name".into()))?
                .to_string();

            let sha_end = nul + 21;
            if raw.len() < sha_end {
                return Err(Error::CorruptObject("tree entry digest truncated".into()));
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&raw[nul + 1..sha_end]);
            let hash = Hash::from_bytes(bytes);

            entries.push(TreeEntry { mode, name, hash });
            pos = sha_end;
        }

        Ok(Self { entries })
    }

    /// encode to the canonical binary form
    ///
    /// entries are sorted by the trailing-slash key first so identical
    /// directory contents always produce identical bytes and therefore an
    /// identical digest.
    pub fn serialize(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.hash.as_bytes());
        }
        out
    }
}
