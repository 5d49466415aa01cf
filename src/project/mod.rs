pub mod error;
pub mod service;

pub use error::ProjectError;
pub use service::{IndexRequester, ProjectInfo, ProjectService, ProjectStore};
