mod commit;
mod kvlm;
mod store;
mod tree;

pub use commit::{Commit, Signature, Tag};
pub use kvlm::Kvlm;
pub use store::{
    hash_object, object_exists, object_path, object_read, object_write, resolve_prefix, Kind,
    Object,
};
pub use tree::{EntryTarget, Tree, TreeEntry};
