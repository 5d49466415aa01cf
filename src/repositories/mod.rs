pub mod account_repository;
pub mod index_repository;
pub mod project_repository;
pub mod repo_cache_repository;

pub use account_repository::AccountRepository;
pub use index_repository::IndexRepository;
pub use project_repository::ProjectRepository;
pub use repo_cache_repository::RepoCacheRepository;
