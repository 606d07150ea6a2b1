//! twig - content-addressed version control storage
//!
//! an object store, staging index and tree builder with git-like
//! semantics: immutable objects keyed by the digest of their contents, a
//! byte-exact binary staging area, and commits built bottom-up from
//! staged paths.
//!
//! # Core concepts
//!
//! - **Blob**: raw file content, stored compressed under its digest
//! - **Tree**: one directory level as sorted (mode, name, digest) entries
//! - **Commit**: a tree digest plus parents, identities and a message
//! - **Tag**: a named pointer object in the same record format
//! - **Index**: the binary staging area mapping paths to blob digests
//! - **Ref**: a text file naming a digest, or pointing at another ref
//!
//! # Example usage
//!
//! ```no_run
//! use std::path::Path;
//! use twig::{ops, Repo};
//!
//! // initialize a repository and stage a file
//! let repo = Repo::init(Path::new("/path/to/project")).unwrap();
//! ops::add(&repo, &["/path/to/project/notes.txt".into()]).unwrap();
//!
//! // commit the staging index
//! let hash = ops::commit(&repo, "initial commit", None).unwrap();
//! println!("committed {hash}");
//! ```

mod config;
mod error;
mod hash;
mod index;
mod object;
mod refs;
mod repo;
mod resolve;

pub mod ignore;
pub mod ops;

pub use config::{Config, CoreConfig, UserConfig};
pub use error::{Error, Result};
pub use hash::Hash;
pub use index::{FileKind, Index, IndexEntry};
pub use object::{
    hash_object, object_exists, object_read, object_write, resolve_prefix, Commit, EntryTarget,
    Kind, Kvlm, Object, Signature, Tag, Tree, TreeEntry,
};
pub use refs::{branch_get_active, ref_create, ref_list, resolve_symbolic, update_head};
pub use repo::{Repo, RepoLock, DATA_DIR};
pub use resolve::{object_find, resolve_name};
