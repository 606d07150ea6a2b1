mod add;
mod checkout;
mod commit;
mod log;
mod ls_tree;
mod status;
mod tag;

pub use add::{add, add_to_index, remove_from_index, rm};
pub use checkout::{checkout, materialize};
pub use commit::{commit, create_commit, write_tree_from_index};
pub use log::{log, LogEntry};
pub use ls_tree::{ls_tree, LsTreeRow};
pub use status::{status, Change, ChangeKind, Status};
pub use tag::tag_create;
