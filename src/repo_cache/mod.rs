pub mod cache;
pub mod error;
pub mod syncer;

pub use cache::{CacheOutcome, RepoCache, RepoCacheRead};
pub use error::SyncError;
pub use syncer::{RepoCacheStore, Syncer};
