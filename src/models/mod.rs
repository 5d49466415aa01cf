pub mod account;
pub mod annotation;
pub mod blob;
pub mod index_task;
pub mod latest_annotation;
pub mod mirror;
pub mod named_commit;
pub mod project;
pub mod repo_url;
pub mod symbol_entry;
pub mod tree;

pub use account::*;
pub use annotation::*;
pub use blob::*;
pub use index_task::*;
pub use latest_annotation::*;
pub use mirror::*;
pub use named_commit::*;
pub use project::*;
pub use repo_url::*;
pub use symbol_entry::*;
pub use tree::*;
