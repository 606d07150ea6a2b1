use std::path::PathBuf;

use crate::hash::Hash;
use crate::object::Kind;

/// error type for twig operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a twig repository (or any parent): {0}")]
    NoRepo(PathBuf),

    #[error("repository already exists at {0}")]
    RepoExists(PathBuf),

    #[error("no such reference: {0}")]
    NotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(Hash),

    #[error(
        "ambiguous reference {name}: candidates are {}",
        .candidates.iter().map(|h| h.to_hex()).collect::<Vec<_>>().join(", ")
    )]
    AmbiguousReference { name: String, candidates: Vec<Hash> },

    #[error("cannot resolve {name} to a {expected}")]
    WrongKind { name: String, expected: Kind },

    #[error("corrupt object: {0}")]
    CorruptObject(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    #[error("unsupported index extension on entry {0}")]
    UnsupportedExtension(String),

    #[error("path escapes repository data directory: {0}")]
    PathTraversal(PathBuf),

    #[error("invalid ref name: {0}")]
    InvalidRef(String),

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("invalid tree entry name: {0}")]
    InvalidEntryName(String),

    #[error("invalid object type: {0}")]
    InvalidObjectType(String),

    #[error("invalid ignore pattern: {0}")]
    InvalidPattern(String),

    #[error("path is outside the worktree: {0}")]
    NotInWorktree(PathBuf),

    #[error("path is not in the index: {0}")]
    NotStaged(String),

    #[error("user identity not configured; set [user] name and email")]
    MissingIdentity,

    #[error("checkout target not empty: {0}")]
    TargetNotEmpty(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("lock contention on repository")]
    LockContention,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
