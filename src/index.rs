use std::fs;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::{atomic_write, Repo};

const MAGIC: &[u8; 4] = b"DIRC";
const SUPPORTED_VERSION: u32 = 2;

/// length field saturates here; longer names are recovered by NUL scan
const NAME_LEN_SENTINEL: u16 = 0xFFF;

/// object kind bits packed into the top nibble of an entry's mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Symlink,
    Gitlink,
}

impl FileKind {
    pub fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0b1000 => Some(FileKind::Regular),
            0b1010 => Some(FileKind::Symlink),
            0b1110 => Some(FileKind::Gitlink),
            _ => None,
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            FileKind::Regular => 0b1000,
            FileKind::Symlink => 0b1010,
            FileKind::Gitlink => 0b1110,
        }
    }
}

/// one staged path with its filesystem metadata and content digest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// change time as (seconds, nanoseconds)
    pub ctime: (u32, u32),
    /// modification time as (seconds, nanoseconds)
    pub mtime: (u32, u32),
    pub dev: u32,
    pub ino: u32,
    pub kind: FileKind,
    /// low 9 permission bits
    pub perms: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub hash: Hash,
    pub assume_valid: bool,
    /// 2-bit stage/conflict marker
    pub stage: u8,
    /// worktree-relative path, forward-slash separated
    pub name: String,
}

impl IndexEntry {
    /// tree entry mode for this staged path, e.g. "100644"
    pub fn tree_mode(&self) -> String {
        format!("{:02o}{:04o}", self.kind.bits(), self.perms)
    }
}

/// the staging area: an ordered, path-keyed set of entries
///
/// an explicit value read and written as a whole; callers own the
/// read-modify-write cycle (see Index::read / Index::write).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Index {
    pub version: u32,
    pub entries: Vec<IndexEntry>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            entries: Vec::new(),
        }
    }
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// read the staging index; an absent file is an empty index
    pub fn read(repo: &Repo) -> Result<Self> {
        let path = repo.index_path();
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = fs::read(&path).map_err(|e| Error::Io {
            path: path.clone(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    /// write the staging index atomically
    pub fn write(&self, repo: &Repo) -> Result<()> {
        atomic_write(&repo.index_path(), &self.serialize())
    }

    /// look up an entry by path
    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// add or replace the entry for a path
    pub fn upsert(&mut self, entry: IndexEntry) {
        self.entries.retain(|e| e.name != entry.name);
        self.entries.push(entry);
    }

    /// drop the entry for a path, reporting whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    /// parse the binary index format
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < 12 {
            return Err(Error::CorruptIndex("truncated header".into()));
        }
        if &raw[0..4] != MAGIC {
            return Err(Error::CorruptIndex("bad magic".into()));
        }
        let version = read_u32(raw, 4);
        if version != SUPPORTED_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let count = read_u32(raw, 8) as usize;

        let content = &raw[12..];
        let mut entries = Vec::with_capacity(count);
        let mut idx = 0usize;

        for i in 0..count {
            if content.len() < idx + 62 {
                return Err(Error::CorruptIndex(format!("truncated entry {i}")));
            }

            let ctime = (read_u32(content, idx), read_u32(content, idx + 4));
            let mtime = (read_u32(content, idx + 8), read_u32(content, idx + 12));
            let dev = read_u32(content, idx + 16);
            let ino = read_u32(content, idx + 20);

            let reserved = read_u16(content, idx + 24);
            if reserved != 0 {
                return Err(Error::CorruptIndex(format!(
                    "entry {i} has nonzero reserved bytes"
                )));
            }

            let mode = read_u16(content, idx + 26);
            let kind = FileKind::from_bits(mode >> 12).ok_or_else(|| {
                Error::CorruptIndex(format!("entry {i} has invalid mode kind {:#06b}", mode >> 12))
            })?;
            let perms = mode & 0o777;

            let uid = read_u32(content, idx + 28);
            let gid = read_u32(content, idx + 32);
            let size = read_u32(content, idx + 36);

            let mut sha = [0u8; 20];
            sha.copy_from_slice(&content[idx + 40..idx + 60]);
            let hash = Hash::from_bytes(sha);

            let flags = read_u16(content, idx + 60);
            let assume_valid = flags & 0x8000 != 0;
            if flags & 0x4000 != 0 {
                return Err(Error::UnsupportedExtension(format!("entry {i}")));
            }
            let stage = ((flags >> 12) & 0x3) as u8;
            let name_len = flags & NAME_LEN_SENTINEL;

            idx += 62;

            let name_bytes = if name_len < NAME_LEN_SENTINEL {
                let len = name_len as usize;
                if content.get(idx + len) != Some(&0) {
                    return Err(Error::CorruptIndex(format!(
                        "entry {i} name not NUL-terminated"
                    )));
                }
                let bytes = &content[idx..idx + len];
                idx += len + 1;
                bytes
            } else {
                // saturated length field: the real name is at least 4095
                // bytes, scan for the terminating NUL instead
                let start = idx;
                let nul = content[start + NAME_LEN_SENTINEL as usize..]
                    .iter()
                    .position(|&b| b == 0)
                    .map(|p| start + NAME_LEN_SENTINEL as usize + p)
                    .ok_or_else(|| {
                        Error::CorruptIndex(format!("entry {i} long name unterminated"))
                    })?;
                let bytes = &content[start..nul];
                idx = nul + 1;
                bytes
            };

            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| Error::CorruptIndex(format!("entry {i} name is not utf-8")))?
                .to_string();

            // each entry record is zero-padded to the next 8-byte boundary
            idx = (idx + 7) & !7;

            entries.push(IndexEntry {
                ctime,
                mtime,
                dev,
                ino,
                kind,
                perms,
                uid,
                gid,
                size,
                hash,
                assume_valid,
                stage,
                name,
            });
        }

        // bytes past the last entry (e.g. a checksum footer) are ignored

        Ok(Self { version, entries })
    }

    /// serialize to the binary index format
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        let mut body = Vec::new();
        for entry in &self.entries {
            body.extend_from_slice(&entry.ctime.0.to_be_bytes());
            body.extend_from_slice(&entry.ctime.1.to_be_bytes());
            body.extend_from_slice(&entry.mtime.0.to_be_bytes());
            body.extend_from_slice(&entry.mtime.1.to_be_bytes());
            body.extend_from_slice(&entry.dev.to_be_bytes());
            body.extend_from_slice(&entry.ino.to_be_bytes());

            let mode = ((entry.kind.bits() as u32) << 12) | (entry.perms & 0o777) as u32;
            body.extend_from_slice(&mode.to_be_bytes());

            body.extend_from_slice(&entry.uid.to_be_bytes());
            body.extend_from_slice(&entry.gid.to_be_bytes());
            body.extend_from_slice(&entry.size.to_be_bytes());
            body.extend_from_slice(entry.hash.as_bytes());

            let name_bytes = entry.name.as_bytes();
            let name_len = (name_bytes.len() as u64).min(NAME_LEN_SENTINEL as u64) as u16;
            let mut flags = name_len;
            if entry.assume_valid {
                flags |= 0x8000;
            }
            flags |= ((entry.stage & 0x3) as u16) << 12;
            body.extend_from_slice(&flags.to_be_bytes());

            body.extend_from_slice(name_bytes);
            body.push(0);

            while body.len() % 8 != 0 {
                body.push(0);
            }
        }

        out.extend_from_slice(&body);
        out
    }
}

fn read_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn read_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([raw[at], raw[at + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> IndexEntry {
        IndexEntry {
            ctime: (1700000000, 123456789),
            mtime: (1700000001, 987654321),
            dev: 2049,
            ino: 131072,
            kind: FileKind::Regular,
            perms: 0o644,
            uid: 1000,
            gid: 1000,
            size: 42,
            hash: Hash::from_bytes([7; 20]),
            assume_valid: false,
            stage: 0,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_empty_roundtrip() {
        let index = Index::new();
        let parsed = Index::parse(&index.serialize()).unwrap();
        assert_eq!(parsed, index);
    }

    #[test]
    fn test_single_entry_roundtrip() {
        let mut index = Index::new();
        index.upsert(entry("hello.txt"));

        let parsed = Index::parse(&index.serialize()).unwrap();
        assert_eq!(parsed, index);
    }

    #[test]
    fn test_many_entries_roundtrip() {
        let mut index = Index::new();
        index.upsert(entry("a"));
        index.upsert(entry("dir/b.txt"));
        index.upsert({
            let mut e = entry("link");
            e.kind = FileKind::Symlink;
            e.perms = 0;
            e
        });
        index.upsert({
            let mut e = entry("flagged");
            e.assume_valid = true;
            e.stage = 2;
            e
        });

        let parsed = Index::parse(&index.serialize()).unwrap();
        assert_eq!(parsed, index);
    }

    #[test]
    fn test_long_name_uses_sentinel() {
        let long_name = "d/".repeat(2500) + "f"; // 5001 bytes
        let mut index = Index::new();
        index.upsert(entry(&long_name));

        let bytes = index.serialize();

        // flags field of the first entry carries the saturated length
        let flags = u16::from_be_bytes([bytes[72], bytes[73]]);
        assert_eq!(flags & 0xFFF, 0xFFF);

        let parsed = Index::parse(&bytes).unwrap();
        assert_eq!(parsed.entries[0].name, long_name);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut index = Index::new();
        index.upsert(entry("a.txt"));

        let mut bytes = index.serialize();
        bytes.extend_from_slice(&[0xAB; 20]); // checksum-like footer

        let parsed = Index::parse(&bytes).unwrap();
        assert_eq!(parsed, index);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = Index::new().serialize();
        bytes[0] = b'X';
        assert!(matches!(
            Index::parse(&bytes),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = Index::new().serialize();
        bytes[7] = 3;
        assert!(matches!(
            Index::parse(&bytes),
            Err(Error::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_nonzero_reserved_bytes() {
        let mut index = Index::new();
        index.upsert(entry("a.txt"));
        let mut bytes = index.serialize();

        // reserved bytes sit at offset 24 within the 62-byte entry header
        bytes[12 + 24] = 1;
        assert!(matches!(
            Index::parse(&bytes),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_extended_flag_rejected() {
        let mut index = Index::new();
        index.upsert(entry("a.txt"));
        let mut bytes = index.serialize();

        // flags field is at offset 60 within the entry header
        bytes[12 + 60] |= 0x40;
        assert!(matches!(
            Index::parse(&bytes),
            Err(Error::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_invalid_mode_kind() {
        let mut index = Index::new();
        index.upsert(entry("a.txt"));
        let mut bytes = index.serialize();

        // mode field is at offset 26; keep a permission bit, zero the kind
        bytes[12 + 26] = 0x01;
        assert!(matches!(
            Index::parse(&bytes),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_truncated_entry() {
        let mut index = Index::new();
        index.upsert(entry("a.txt"));
        let bytes = index.serialize();

        assert!(matches!(
            Index::parse(&bytes[..30]),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_upsert_replaces() {
        let mut index = Index::new();
        index.upsert(entry("a.txt"));

        let mut changed = entry("a.txt");
        changed.hash = Hash::from_bytes([9; 20]);
        index.upsert(changed);

        assert_eq!(index.entries.len(), 1);
        assert_eq!(index.get("a.txt").unwrap().hash, Hash::from_bytes([9; 20]));
    }

    #[test]
    fn test_remove() {
        let mut index = Index::new();
        index.upsert(entry("a.txt"));

        assert!(index.remove("a.txt"));
        assert!(!index.remove("a.txt"));
        assert!(index.entries.is_empty());
    }

    #[test]
    fn test_tree_mode() {
        let mut e = entry("f");
        assert_eq!(e.tree_mode(), "100644");

        e.perms = 0o755;
        assert_eq!(e.tree_mode(), "100755");

        e.kind = FileKind::Symlink;
        e.perms = 0;
        assert_eq!(e.tree_mode(), "120000");

        e.kind = FileKind::Gitlink;
        assert_eq!(e.tree_mode(), "160000");
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        use crate::repo::Repo;
        let dir = tempfile::tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();

        let index = Index::read(&repo).unwrap();
        assert_eq!(index.version, 2);
        assert!(index.entries.is_empty());
    }

    #[test]
    fn test_write_read_through_repo() {
        use crate::repo::Repo;
        let dir = tempfile::tempdir().unwrap();
        let repo = Repo::init(&dir.path().join("repo")).unwrap();

        let mut index = Index::new();
        index.upsert(entry("x/y/z.txt"));
        index.write(&repo).unwrap();

        let reread = Index::read(&repo).unwrap();
        assert_eq!(reread, index);
    }
}
