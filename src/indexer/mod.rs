pub mod commander;
pub mod error;
pub mod liner;
pub mod service;

pub use error::IndexerError;
pub use service::{Indexer, SymbolStore};
